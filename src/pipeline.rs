use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver};
use log::{debug, info, warn};

use crate::capture::{CaptureMode, CaptureSource, RawPacketRecord};
use crate::config::ModeConfig;
use crate::engine::ClassificationEngine;
use crate::sink::ResultSink;
use crate::window::{PublishPolicy, ResultWindow};

/// A full channel blocks the capture thread; records are never dropped.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Replay stream read to the end.
    Exhausted,
    /// Cancel signal observed; live sessions end this way.
    Cancelled,
    /// A live stream ended without being cancelled: the capture process
    /// died underneath us.
    Failed,
}

#[derive(Debug)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    /// Records classified into events.
    pub records: u64,
    /// Records skipped because the classifier failed on them.
    pub classification_errors: u64,
}

/// Bridge the capture subprocess onto a bounded single-producer channel.
/// The thread closes the subprocess on every exit path: cancellation,
/// stream end, or the consumer going away.
pub fn spawn_capture(
    mut source: CaptureSource,
    cancel: Arc<AtomicBool>,
) -> Receiver<RawPacketRecord> {
    let (tx, rx) = bounded(CHANNEL_CAPACITY);
    thread::spawn(move || {
        while !cancel.load(Ordering::SeqCst) {
            match source.next_record() {
                Some(record) => {
                    if tx.send(record).is_err() {
                        break;
                    }
                }
                None => break,
            }
        }
        source.close();
        debug!("capture thread finished");
    });
    rx
}

/// Classification loop: strict arrival order, one event per usable record.
/// The cancel flag is checked before each record is classified, so nothing
/// is scored after cancellation is observed. Classifier failures skip the
/// record, count it, and keep the stream alive.
pub fn run_session<I>(
    records: I,
    engine: &ClassificationEngine,
    config: &ModeConfig,
    cancel: &AtomicBool,
    sink: &mut dyn ResultSink,
) -> SessionReport
where
    I: IntoIterator<Item = RawPacketRecord>,
{
    let mut window = ResultWindow::new(config.window_size);
    let policy = PublishPolicy::every(config.publish_every);
    let mut records_classified: u64 = 0;
    let mut classification_errors: u64 = 0;
    let mut outcome = None;

    for record in records {
        if cancel.load(Ordering::SeqCst) {
            outcome = Some(SessionOutcome::Cancelled);
            break;
        }
        match engine.classify(&record) {
            Ok(event) => {
                records_classified += 1;
                sink.on_event(&event);
                window.append(event);
                if policy.should_publish(records_classified) {
                    sink.on_snapshot(&window.snapshot());
                    debug!(
                        "published table at {}/{} rows",
                        window.len(),
                        window.capacity()
                    );
                }
            }
            Err(e) => {
                classification_errors += 1;
                warn!(
                    "record {} -> {} skipped: {}",
                    record.src_ip, record.dst_ip, e
                );
            }
        }
    }

    // The table a viewer is left with must reflect everything classified,
    // whichever way the stream ended.
    sink.on_snapshot(&window.snapshot());

    let outcome = outcome.unwrap_or_else(|| {
        if cancel.load(Ordering::SeqCst) {
            SessionOutcome::Cancelled
        } else if config.mode == CaptureMode::Live {
            SessionOutcome::Failed
        } else {
            SessionOutcome::Exhausted
        }
    });
    info!(
        "session over: {:?}, {} classified, {} classifier errors",
        outcome, records_classified, classification_errors
    );
    SessionReport {
        outcome,
        records: records_classified,
        classification_errors,
    }
}
