use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use log::{debug, info, warn};
use pnet::datalink;

use crate::error::{IdsError, Result};

/// Fallback when tshark is installed but not on PATH (default Wireshark
/// install location on Windows).
const TSHARK_WINDOWS_FALLBACK: &str = r"C:\Program Files\Wireshark\tshark.exe";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Read a saved capture file; the stream ends when the file is exhausted.
    Replay,
    /// Read an active interface; the stream ends only on cancellation.
    Live,
}

/// One captured packet, as far as the pipeline cares: addresses and frame
/// length. Everything else tshark knows about the packet is dropped here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacketRecord {
    pub src_ip: String,
    pub dst_ip: String,
    pub length: u64,
}

/// Parse one tab-separated tshark output line (ip.src, ip.dst, frame.len).
/// Lines with missing or empty address fields or a non-numeric length are
/// not errors, just packets the pipeline cannot use; extra fields are
/// ignored.
pub fn parse_record_line(line: &str) -> Option<RawPacketRecord> {
    let mut parts = line.trim_end_matches(['\r', '\n']).split('\t');
    let src = parts.next()?.trim();
    let dst = parts.next()?.trim();
    let len = parts.next()?.trim();
    if src.is_empty() || dst.is_empty() {
        return None;
    }
    let length: u64 = len.parse().ok()?;
    Some(RawPacketRecord {
        src_ip: src.to_string(),
        dst_ip: dst.to_string(),
        length,
    })
}

/// Locate the tshark executable via PATH, with the Windows install dir as a
/// fallback.
pub fn locate_tshark() -> Result<PathBuf> {
    if let Some(found) = search_path("tshark") {
        return Ok(found);
    }
    if cfg!(windows) {
        let fallback = Path::new(TSHARK_WINDOWS_FALLBACK);
        if fallback.is_file() {
            return Ok(fallback.to_path_buf());
        }
    }
    Err(IdsError::SourceUnavailable(
        "tshark not found on PATH; install Wireshark/tshark".to_string(),
    ))
}

fn search_path(name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let candidate = dir.join(format!("{}.exe", name));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Persist an uploaded capture payload. The file is fully written and synced
/// before this returns; the adapter must never be opened on a path that has
/// not been through here (tshark behaviour on a half-written file is
/// undefined).
pub fn persist_upload(payload: &[u8], dest: &Path) -> Result<()> {
    let mut file = File::create(dest)?;
    file.write_all(payload)?;
    file.sync_all()?;
    info!("capture upload persisted to {}", dest.display());
    Ok(())
}

/// Interface names known to the OS, for listing and validation.
pub fn interface_names() -> Vec<String> {
    datalink::interfaces().into_iter().map(|i| i.name).collect()
}

/// IPv4 addresses assigned to an interface, for the selection listing.
pub fn interface_ipv4s(iface: &datalink::NetworkInterface) -> Vec<String> {
    iface
        .ips
        .iter()
        .filter(|ip| ip.is_ipv4())
        .map(|ip| ip.ip().to_string())
        .collect()
}

pub fn validate_interface(name: &str) -> Result<()> {
    let known = interface_names();
    if known.iter().any(|n| n == name) {
        Ok(())
    } else {
        Err(IdsError::SourceOpen(format!(
            "no such interface '{}' (available: {})",
            name,
            known.join(", ")
        )))
    }
}

/// Owns the capture-tool subprocess and presents its output as a lazy
/// sequence of records. Replay streams are finite; live streams end only
/// when the source is closed.
pub struct CaptureSource {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    done: bool,
}

impl CaptureSource {
    pub fn open_replay(capture_file: &Path) -> Result<Self> {
        if !capture_file.is_file() {
            return Err(IdsError::SourceOpen(format!(
                "capture file not found: {}",
                capture_file.display()
            )));
        }
        let target = capture_file.to_string_lossy();
        Self::spawn(&["-r", target.as_ref()])
    }

    pub fn open_live(interface: &str) -> Result<Self> {
        validate_interface(interface)?;
        Self::spawn(&["-i", interface])
    }

    fn spawn(select: &[&str]) -> Result<Self> {
        let tool = locate_tshark()?;
        let mut child = Command::new(&tool)
            .args(select)
            .args(["-T", "fields", "-e", "ip.src", "-e", "ip.dst", "-e", "frame.len"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                IdsError::SourceOpen(format!("failed to start {}: {}", tool.display(), e))
            })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            IdsError::SourceOpen("capture process has no stdout pipe".to_string())
        })?;
        info!("capture started: {} {}", tool.display(), select.join(" "));
        Ok(CaptureSource {
            child,
            lines: BufReader::new(stdout).lines(),
            done: false,
        })
    }

    /// Next usable record, or None at end of stream. Malformed lines are
    /// skipped here and never surface as errors.
    pub fn next_record(&mut self) -> Option<RawPacketRecord> {
        while !self.done {
            match self.lines.next() {
                Some(Ok(line)) => match parse_record_line(&line) {
                    Some(record) => return Some(record),
                    None => debug!("skipping unusable capture line: {:?}", line),
                },
                Some(Err(e)) => {
                    warn!("capture pipe read failed: {}", e);
                    self.done = true;
                }
                None => self.done = true,
            }
        }
        None
    }

    /// Terminate the capture process and reap it, releasing the pipe.
    pub fn close(&mut self) {
        self.done = true;
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Iterator for CaptureSource {
    type Item = RawPacketRecord;

    fn next(&mut self) -> Option<RawPacketRecord> {
        self.next_record()
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.close();
    }
}
