use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::capture::RawPacketRecord;
use crate::config::ModeConfig;
use crate::error::Result;
use crate::features;
use crate::model_predictor::Classifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    Normal,
    Attack,
}

impl Label {
    /// Attack strictly above the threshold; equality stays Normal.
    pub fn from_probability(attack_prob: f64, threshold: f64) -> Label {
        if attack_prob > threshold {
            Label::Attack
        } else {
            Label::Normal
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Normal => write!(f, "Normal"),
            Label::Attack => write!(f, "Attack"),
        }
    }
}

/// One classified packet, as retained by the result window and written by
/// the export sink.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationEvent {
    pub timestamp: DateTime<Local>,
    pub src_ip: String,
    pub dst_ip: String,
    pub length: u64,
    pub attack_prob: f64,
    pub label: Label,
}

/// Turns one raw record into one classification event: extract features,
/// score, apply the profile threshold. Stateless; every call stands alone.
pub struct ClassificationEngine<'a> {
    classifier: &'a dyn Classifier,
    duration_hint: f64,
    threshold: f64,
}

impl<'a> ClassificationEngine<'a> {
    pub fn new(classifier: &'a dyn Classifier, config: &ModeConfig) -> Self {
        ClassificationEngine {
            classifier,
            duration_hint: config.duration_hint,
            threshold: config.threshold,
        }
    }

    pub fn classify(&self, record: &RawPacketRecord) -> Result<ClassificationEvent> {
        let vector = features::extract(record, self.duration_hint);
        let attack_prob = self.classifier.predict_probability(&vector)?;
        Ok(ClassificationEvent {
            timestamp: Local::now(),
            src_ip: record.src_ip.clone(),
            dst_ip: record.dst_ip.clone(),
            length: record.length,
            attack_prob,
            label: Label::from_probability(attack_prob, self.threshold),
        })
    }
}
