use crate::capture::RawPacketRecord;

pub const FEATURE_COUNT: usize = 5;

/// Model input, in the column order the classifier was trained with:
/// duration, src_bytes, dst_bytes, src_packets, dst_packets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Single-packet stand-in for the flow features the model was trained on:
/// the frame length counts for both directions and each record is one
/// packet. No flow aggregation or directional split happens here.
pub fn extract(record: &RawPacketRecord, duration_hint: f64) -> FeatureVector {
    let bytes = record.length as f64;
    FeatureVector([duration_hint, bytes, bytes, 1.0, 1.0])
}
