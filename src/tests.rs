use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;

use crate::capture::{parse_record_line, persist_upload, CaptureMode, RawPacketRecord};
use crate::config::ModeConfig;
use crate::engine::{ClassificationEngine, ClassificationEvent, Label};
use crate::error::{IdsError, Result};
use crate::features::{self, FeatureVector};
use crate::model_predictor::Classifier;
use crate::pipeline::{run_session, SessionOutcome};
use crate::sink::ResultSink;
use crate::window::{PublishPolicy, ResultWindow, SnapshotCell};

struct ScriptedClassifier {
    outcomes: RefCell<VecDeque<Result<f64>>>,
    calls: Cell<usize>,
}

impl ScriptedClassifier {
    fn returning(probs: &[f64]) -> Self {
        ScriptedClassifier {
            outcomes: RefCell::new(probs.iter().map(|&p| Ok(p)).collect()),
            calls: Cell::new(0),
        }
    }

    fn scripted(outcomes: Vec<Result<f64>>) -> Self {
        ScriptedClassifier {
            outcomes: RefCell::new(outcomes.into()),
            calls: Cell::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Classifier for ScriptedClassifier {
    fn predict_probability(&self, _features: &FeatureVector) -> Result<f64> {
        self.calls.set(self.calls.get() + 1);
        self.outcomes.borrow_mut().pop_front().unwrap_or(Ok(0.0))
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Vec<ClassificationEvent>,
    snapshots: Vec<Vec<ClassificationEvent>>,
}

impl ResultSink for RecordingSink {
    fn on_event(&mut self, event: &ClassificationEvent) {
        self.events.push(event.clone());
    }

    fn on_snapshot(&mut self, snapshot: &[ClassificationEvent]) {
        self.snapshots.push(snapshot.to_vec());
    }
}

fn record(n: u64) -> RawPacketRecord {
    RawPacketRecord {
        src_ip: format!("10.0.0.{}", n),
        dst_ip: "192.168.1.1".to_string(),
        length: n,
    }
}

fn event(n: u64) -> ClassificationEvent {
    ClassificationEvent {
        timestamp: Local::now(),
        src_ip: format!("10.0.0.{}", n),
        dst_ip: "192.168.1.1".to_string(),
        length: n,
        attack_prob: 0.5,
        label: Label::Normal,
    }
}

#[test]
fn test_feature_vector_passthrough() {
    let rec = RawPacketRecord {
        src_ip: "10.0.0.1".to_string(),
        dst_ip: "10.0.0.2".to_string(),
        length: 50,
    };
    assert_eq!(
        features::extract(&rec, 0.1),
        FeatureVector([0.1, 50.0, 50.0, 1.0, 1.0])
    );
    assert_eq!(
        features::extract(&rec, 1.0),
        FeatureVector([1.0, 50.0, 50.0, 1.0, 1.0])
    );
}

#[test]
fn test_label_threshold_is_strict() {
    assert_eq!(Label::from_probability(0.7, 0.7), Label::Normal);
    assert_eq!(Label::from_probability(0.71, 0.7), Label::Attack);
    assert_eq!(Label::from_probability(0.5, 0.5), Label::Normal);
    assert_eq!(Label::from_probability(0.0, 0.5), Label::Normal);
    assert_eq!(Label::from_probability(1.0, 0.7), Label::Attack);
}

#[test]
fn test_engine_applies_profile_threshold() {
    let classifier = ScriptedClassifier::returning(&[0.6, 0.6]);
    let replay = ClassificationEngine::new(&classifier, &ModeConfig::replay());
    let live_config = ModeConfig::live();
    let live = ClassificationEngine::new(&classifier, &live_config);

    let first = replay.classify(&record(1)).unwrap();
    assert_eq!(first.label, Label::Normal); // 0.6 <= 0.7
    let second = live.classify(&record(1)).unwrap();
    assert_eq!(second.label, Label::Attack); // 0.6 > 0.5
}

#[test]
fn test_window_bound_and_order() {
    let mut window = ResultWindow::new(15);
    assert!(window.is_empty());
    assert_eq!(window.capacity(), 15);
    for n in 1..=25 {
        window.append(event(n));
    }
    assert_eq!(window.len(), 15);
    let snapshot = window.snapshot();
    assert_eq!(snapshot.first().map(|e| e.length), Some(11));
    assert_eq!(snapshot.last().map(|e| e.length), Some(25));
    let lengths: Vec<u64> = snapshot.iter().map(|e| e.length).collect();
    assert_eq!(lengths, (11..=25).collect::<Vec<u64>>());
}

#[test]
fn test_malformed_lines_are_skipped() {
    // only two fields
    assert_eq!(parse_record_line("10.0.0.1\t10.0.0.2"), None);
    // non-numeric length
    assert_eq!(parse_record_line("10.0.0.1\t10.0.0.2\tabc"), None);
    // negative length
    assert_eq!(parse_record_line("10.0.0.1\t10.0.0.2\t-5"), None);
    // non-IP frame: tshark emits empty address fields
    assert_eq!(parse_record_line("\t\t60"), None);
    assert_eq!(parse_record_line(""), None);

    assert_eq!(
        parse_record_line("10.0.0.1\t10.0.0.2\t1500"),
        Some(RawPacketRecord {
            src_ip: "10.0.0.1".to_string(),
            dst_ip: "10.0.0.2".to_string(),
            length: 1500,
        })
    );
    // trailing fields beyond the three requested are ignored
    assert_eq!(
        parse_record_line("10.0.0.1\t10.0.0.2\t1500\textra").map(|r| r.length),
        Some(1500)
    );
    // carriage return from a Windows-built tshark
    assert_eq!(
        parse_record_line("10.0.0.1\t10.0.0.2\t42\r").map(|r| r.length),
        Some(42)
    );
}

#[test]
fn test_replay_scenario_end_to_end() {
    let classifier = ScriptedClassifier::returning(&[0.1, 0.8, 0.95]);
    let config = ModeConfig::replay();
    let engine = ClassificationEngine::new(&classifier, &config);
    let cancel = AtomicBool::new(false);
    let mut sink = RecordingSink::default();

    let records = vec![record(50), record(1500), record(9000)];
    let report = run_session(records, &engine, &config, &cancel, &mut sink);

    assert_eq!(report.outcome, SessionOutcome::Exhausted);
    assert_eq!(report.records, 3);
    assert_eq!(report.classification_errors, 0);

    let labels: Vec<Label> = sink.events.iter().map(|e| e.label).collect();
    assert_eq!(labels, vec![Label::Normal, Label::Attack, Label::Attack]);

    // fewer than publish_every records: only the unconditional final table
    assert_eq!(sink.snapshots.len(), 1);
    let lengths: Vec<u64> = sink.snapshots[0].iter().map(|e| e.length).collect();
    assert_eq!(lengths, vec![50, 1500, 9000]);
}

#[test]
fn test_cancel_classifies_nothing_further() {
    let classifier = ScriptedClassifier::returning(&[0.2; 10]);
    let config = ModeConfig::live();
    let engine = ClassificationEngine::new(&classifier, &config);
    let cancel = Arc::new(AtomicBool::new(false));
    let mut sink = RecordingSink::default();

    // the cancel signal lands while the third record is being read
    let trigger = cancel.clone();
    let records = (1..=10u64).map(move |n| {
        if n == 3 {
            trigger.store(true, Ordering::SeqCst);
        }
        record(n)
    });

    let report = run_session(records, &engine, &config, &cancel, &mut sink);

    assert_eq!(report.outcome, SessionOutcome::Cancelled);
    assert_eq!(report.records, 2);
    assert_eq!(classifier.calls(), 2);
    assert_eq!(sink.events.len(), 2);
}

#[test]
fn test_replay_publish_cadence() {
    let classifier = ScriptedClassifier::returning(&[0.2; 25]);
    let config = ModeConfig::replay();
    let engine = ClassificationEngine::new(&classifier, &config);
    let cancel = AtomicBool::new(false);
    let mut sink = RecordingSink::default();

    let records: Vec<RawPacketRecord> = (1..=25).map(record).collect();
    let report = run_session(records, &engine, &config, &cancel, &mut sink);

    assert_eq!(report.records, 25);
    // after records 10 and 20, plus once at stream end
    assert_eq!(sink.snapshots.len(), 3);
    assert_eq!(sink.snapshots[0].len(), 10);
    // the window bound (15) has kicked in by record 20
    assert_eq!(sink.snapshots[1].len(), 15);
    assert_eq!(sink.snapshots[2].len(), 15);
    assert_eq!(sink.snapshots[2].last().map(|e| e.length), Some(25));
}

#[test]
fn test_publish_policy() {
    let every_tenth = PublishPolicy::every(10);
    assert!(!every_tenth.should_publish(5));
    assert!(every_tenth.should_publish(10));
    assert!(!every_tenth.should_publish(19));
    assert!(every_tenth.should_publish(20));

    let each = PublishPolicy::every(1);
    assert!(each.should_publish(1));
    assert!(each.should_publish(2));
}

#[test]
fn test_live_publishes_every_event() {
    let classifier = ScriptedClassifier::returning(&[0.2; 3]);
    let config = ModeConfig::live();
    let engine = ClassificationEngine::new(&classifier, &config);
    let cancel = AtomicBool::new(false);
    let mut sink = RecordingSink::default();

    let records: Vec<RawPacketRecord> = (1..=3).map(record).collect();
    run_session(records, &engine, &config, &cancel, &mut sink);

    // one per event plus the final table
    assert_eq!(sink.snapshots.len(), 4);
    assert_eq!(sink.snapshots[0].len(), 1);
    assert_eq!(sink.snapshots[2].len(), 3);
}

#[test]
fn test_classifier_error_skips_and_counts() {
    let classifier = ScriptedClassifier::scripted(vec![
        Ok(0.1),
        Err(IdsError::Classification("shape mismatch".to_string())),
        Ok(0.9),
    ]);
    let config = ModeConfig::live();
    let engine = ClassificationEngine::new(&classifier, &config);
    let cancel = AtomicBool::new(false);
    let mut sink = RecordingSink::default();

    let records: Vec<RawPacketRecord> = (1..=3).map(record).collect();
    let report = run_session(records, &engine, &config, &cancel, &mut sink);

    assert_eq!(report.records, 2);
    assert_eq!(report.classification_errors, 1);
    let labels: Vec<Label> = sink.events.iter().map(|e| e.label).collect();
    assert_eq!(labels, vec![Label::Normal, Label::Attack]);
}

#[test]
fn test_live_stream_death_reports_failed() {
    let classifier = ScriptedClassifier::returning(&[0.2; 2]);
    let config = ModeConfig::live();
    let engine = ClassificationEngine::new(&classifier, &config);
    let cancel = AtomicBool::new(false);
    let mut sink = RecordingSink::default();

    let records: Vec<RawPacketRecord> = (1..=2).map(record).collect();
    let report = run_session(records, &engine, &config, &cancel, &mut sink);

    assert_eq!(report.outcome, SessionOutcome::Failed);
    assert_eq!(report.records, 2);
}

#[test]
fn test_empty_replay_still_publishes_final_table() {
    let classifier = ScriptedClassifier::returning(&[]);
    let config = ModeConfig::replay();
    let engine = ClassificationEngine::new(&classifier, &config);
    let cancel = AtomicBool::new(false);
    let mut sink = RecordingSink::default();

    let report = run_session(Vec::new(), &engine, &config, &cancel, &mut sink);

    assert_eq!(report.outcome, SessionOutcome::Exhausted);
    assert_eq!(report.records, 0);
    assert_eq!(sink.snapshots.len(), 1);
    assert!(sink.snapshots[0].is_empty());
}

#[test]
fn test_snapshot_cell_publish_and_read() {
    let cell = SnapshotCell::new();
    assert!(cell.latest().is_empty());

    let reader = cell.clone();
    let mut sink: Box<dyn ResultSink> = Box::new(cell);
    sink.on_snapshot(&[event(1), event(2)]);

    let latest = reader.latest();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[1].length, 2);

    sink.on_snapshot(&[event(3)]);
    assert_eq!(reader.latest().len(), 1);
}

#[test]
fn test_persist_upload_is_fully_written() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("upload.pcap");
    let payload = vec![0xd4u8, 0xc3, 0xb2, 0xa1, 0x02, 0x00];

    persist_upload(&payload, &dest).unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), payload);
}

#[test]
fn test_mode_config_presets() {
    let replay = ModeConfig::replay();
    assert_eq!(replay.mode, CaptureMode::Replay);
    assert_eq!(replay.duration_hint, 0.1);
    assert_eq!(replay.threshold, 0.7);
    assert_eq!(replay.window_size, 15);
    assert_eq!(replay.publish_every, 10);

    let live = ModeConfig::live();
    assert_eq!(live.mode, CaptureMode::Live);
    assert_eq!(live.duration_hint, 1.0);
    assert_eq!(live.threshold, 0.5);
    assert_eq!(live.window_size, 20);
    assert_eq!(live.publish_every, 1);

    assert_eq!(ModeConfig::for_mode(CaptureMode::Live).threshold, 0.5);
}

#[test]
fn test_error_types() {
    let unavailable = IdsError::SourceUnavailable("tshark not found".to_string());
    let open = IdsError::SourceOpen("missing file".to_string());
    let model = IdsError::Model("artifact missing".to_string());
    let classification = IdsError::Classification("bad shape".to_string());

    assert!(format!("{}", unavailable).contains("Capture tool unavailable"));
    assert!(format!("{}", open).contains("Cannot open capture source"));
    assert!(format!("{}", model).contains("Model error"));
    assert!(format!("{}", classification).contains("Classification error"));
}
