use std::env;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pnet::datalink;

mod capture;
mod config;
mod engine;
mod error;
mod features;
mod model_predictor;
mod pipeline;
mod sink;
mod window;
#[cfg(test)]
mod tests;

use capture::{CaptureMode, CaptureSource};
use config::ModeConfig;
use engine::{ClassificationEngine, ClassificationEvent, Label};
use error::{IdsError, Result};
use model_predictor::ModelPredictor;
use pipeline::SessionOutcome;
use sink::{CsvSink, Fanout, ResultSink};
use window::SnapshotCell;

const MODEL_PATH: &str = "model/ids_model_randomforest.pkl";
const RESULTS_CSV: &str = "classification_results.csv";
const UPLOAD_PATH: &str = "temp_capture.pcap";
const USAGE: &str = "usage: ids_ai replay <capture-file|-> | ids_ai live [interface]";

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    println!("Loading trained model...");
    let predictor = ModelPredictor::load(MODEL_PATH)?;
    println!("Model loaded successfully!");

    let (config, source) = match args.first().map(String::as_str) {
        Some("replay") => {
            let arg = args
                .get(1)
                .ok_or_else(|| IdsError::ConfigError(USAGE.to_string()))?;
            // "-" takes the capture payload on stdin; it must be fully
            // persisted before tshark may open it.
            let file = if arg == "-" {
                let mut payload = Vec::new();
                io::stdin().read_to_end(&mut payload)?;
                let dest = PathBuf::from(UPLOAD_PATH);
                capture::persist_upload(&payload, &dest)?;
                dest
            } else {
                PathBuf::from(arg)
            };
            (ModeConfig::replay(), CaptureSource::open_replay(&file)?)
        }
        Some("live") => {
            let interface = match args.get(1) {
                Some(name) => name.clone(),
                None => prompt_interface()?,
            };
            (ModeConfig::live(), CaptureSource::open_live(&interface)?)
        }
        _ => return Err(IdsError::ConfigError(USAGE.to_string())),
    };

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            println!("\nCtrl+C received, stopping capture...");
            cancel.store(true, Ordering::SeqCst);
        })?;
    }

    match config.mode {
        CaptureMode::Replay => println!("Analyzing capture file..."),
        CaptureMode::Live => println!("Capturing... Press Ctrl+C to stop"),
    }

    let engine = ClassificationEngine::new(&predictor, &config);
    let table = SnapshotCell::new();
    let mut sink = Fanout::new(vec![
        Box::new(ConsoleSink),
        Box::new(CsvSink::create(Path::new(RESULTS_CSV))?),
        Box::new(table.clone()),
    ]);

    let rx = pipeline::spawn_capture(source, cancel.clone());
    let report = pipeline::run_session(rx, &engine, &config, &cancel, &mut sink);
    log::debug!("final published table: {} rows", table.latest().len());

    match report.outcome {
        SessionOutcome::Exhausted => {
            if report.records == 0 {
                println!("No IPv4 packets found in this capture.");
            } else {
                println!("Analysis complete: {} packets classified.", report.records);
            }
        }
        SessionOutcome::Cancelled => {
            println!("Capture stopped: {} packets classified.", report.records)
        }
        SessionOutcome::Failed => println!(
            "Capture source ended unexpectedly after {} packets.",
            report.records
        ),
    }
    if report.classification_errors > 0 {
        println!(
            "Warning: {} packets skipped on classifier errors.",
            report.classification_errors
        );
    }
    println!("Results written to {}", RESULTS_CSV);
    Ok(())
}

/// List interfaces with their IPv4 addresses and ask for an index, the same
/// way the replay/live choice is made interactively in a terminal session.
fn prompt_interface() -> Result<String> {
    let interfaces = datalink::interfaces();
    println!("Available Network Interfaces:");
    for (i, iface) in interfaces.iter().enumerate() {
        let ips = capture::interface_ipv4s(iface);
        if ips.is_empty() {
            println!("[{}] {} - No IPv4 assigned", i, iface.name);
        } else {
            println!("[{}] {} - IPs: {}", i, iface.name, ips.join(", "));
        }
    }

    print!("Enter interface index to capture on: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let index: usize = input
        .trim()
        .parse()
        .map_err(|_| IdsError::ConfigError("interface index must be a number".to_string()))?;
    let iface = interfaces.get(index).ok_or_else(|| {
        IdsError::ConfigError(format!("interface index {} out of range", index))
    })?;
    Ok(iface.name.clone())
}

/// Terminal rendering: one colored status line per packet, a plain table on
/// every publish.
struct ConsoleSink;

impl ResultSink for ConsoleSink {
    fn on_event(&mut self, event: &ClassificationEvent) {
        let color = match event.label {
            Label::Attack => "\x1b[31m",
            Label::Normal => "\x1b[32m",
        };
        println!(
            "Status: {}{}\x1b[0m (Prob: {:.2})  {} -> {}  [{} bytes]",
            color, event.label, event.attack_prob, event.src_ip, event.dst_ip, event.length
        );
    }

    fn on_snapshot(&mut self, snapshot: &[ClassificationEvent]) {
        println!("\n--- Recent traffic ({} rows) ---", snapshot.len());
        println!(
            "{:<14} {:<18} {:<18} {:>8} {:>6}  Status",
            "Time", "Source IP", "Dst IP", "Length", "Prob"
        );
        for event in snapshot {
            println!(
                "{:<14} {:<18} {:<18} {:>8} {:>6.2}  {}",
                event.timestamp.format("%H:%M:%S%.3f"),
                event.src_ip,
                event.dst_ip,
                event.length,
                event.attack_prob,
                event.label
            );
        }
        println!();
    }
}
