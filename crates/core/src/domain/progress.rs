// Progress values and the batch percentage mapper

use serde::{Deserialize, Serialize};

/// One progress update as reported by a unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub percent: u8,
    pub message: String,
    /// Unix millis
    pub at: i64,
}

impl ProgressEvent {
    /// Builds an event, clamping `percent` into 0..=100
    pub fn new(percent: i64, message: impl Into<String>, at: i64) -> Self {
        Self {
            percent: clamp_percent(percent),
            message: message.into(),
            at,
        }
    }
}

pub fn clamp_percent(percent: i64) -> u8 {
    percent.clamp(0, 100) as u8
}

/// Maps one unit's local percent into the overall range of a batch.
///
/// `floor((unit_index * 100 + local) / unit_count)`, clamped to 0..=100.
/// A zero `unit_count` degenerates to the local percent.
pub fn batch_percent(unit_index: usize, unit_count: usize, local_percent: u8) -> u8 {
    if unit_count == 0 {
        return local_percent.min(100);
    }
    let local = u64::from(local_percent.min(100));
    let overall = (unit_index as u64)
        .saturating_mul(100)
        .saturating_add(local)
        / unit_count as u64;
    overall.min(100) as u8
}
