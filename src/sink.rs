use std::path::Path;

use log::warn;

use crate::engine::ClassificationEvent;
use crate::error::Result;
use crate::window::SnapshotCell;

/// Presentation boundary. The pipeline emits two signals: the latest
/// classification (`on_event`) and a refreshed table (`on_snapshot`).
/// Rendering, persistence, and pacing past the publish cadence are the
/// implementor's business.
pub trait ResultSink {
    fn on_event(&mut self, event: &ClassificationEvent);
    fn on_snapshot(&mut self, snapshot: &[ClassificationEvent]);
}

/// A renderer thread reads `latest()` from its clone of the cell; the
/// pipeline never waits on it beyond the swap.
impl ResultSink for SnapshotCell {
    fn on_event(&mut self, _event: &ClassificationEvent) {}

    fn on_snapshot(&mut self, snapshot: &[ClassificationEvent]) {
        self.publish(snapshot.to_vec());
    }
}

/// Appends every classification event to a CSV file, flushed per row so the
/// file is usable while the session is still running. Write failures are
/// logged, not fatal; losing the export must not stop the stream.
pub struct CsvSink {
    writer: csv::Writer<std::fs::File>,
}

impl CsvSink {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(CsvSink {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

impl ResultSink for CsvSink {
    fn on_event(&mut self, event: &ClassificationEvent) {
        if let Err(e) = self.writer.serialize(event) {
            warn!("csv export failed: {}", e);
            return;
        }
        if let Err(e) = self.writer.flush() {
            warn!("csv flush failed: {}", e);
        }
    }

    fn on_snapshot(&mut self, _snapshot: &[ClassificationEvent]) {}
}

/// Delivers every signal to each attached sink, in order.
pub struct Fanout {
    sinks: Vec<Box<dyn ResultSink>>,
}

impl Fanout {
    pub fn new(sinks: Vec<Box<dyn ResultSink>>) -> Self {
        Fanout { sinks }
    }
}

impl ResultSink for Fanout {
    fn on_event(&mut self, event: &ClassificationEvent) {
        for sink in &mut self.sinks {
            sink.on_event(event);
        }
    }

    fn on_snapshot(&mut self, snapshot: &[ClassificationEvent]) {
        for sink in &mut self.sinks {
            sink.on_snapshot(snapshot);
        }
    }
}
