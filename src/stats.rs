//! Adjustment counters, status snapshots and sample timing.
//!
//! Tracks how often the controller changed scale or tier, for logs and the
//! replay host's summary.

use crate::tier::QualityTier;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Samples at or above this many milliseconds are logged.
const SLOW_SAMPLE_MS: u64 = 1000;

/// Counts of every adjustment made since construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityStats {
    /// Cooldown pulses that led to an evaluation
    pub decision_cycles: u64,
    pub scale_downs: u64,
    pub scale_ups: u64,
    pub tier_downs: u64,
    pub tier_ups: u64,
    /// Decrease wanted but scale and tier were both at their floors
    pub saturated_decreases: u64,
    pub manual_changes: u64,
}

impl QualityStats {
    /// Total automatic adjustments in either direction.
    pub fn total_adjustments(&self) -> u64 {
        self.scale_downs + self.scale_ups + self.tier_downs + self.tier_ups
    }
}

/// Point-in-time view of the controller, for overlays and logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityStatus {
    pub dynamic_active: bool,
    pub tier: QualityTier,
    pub scale: f32,
    pub scale_step: i32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub average_fps: i32,
    pub target_framerate: u32,
    pub stats: QualityStats,
}

/// Nested named wall-clock samples.
///
/// Ending a sample with none open is tolerated: it logs a warning and
/// reports zero elapsed time.
#[derive(Debug, Default)]
pub struct SampleTimer {
    open: Vec<(String, Instant)>,
}

impl SampleTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a named sample.
    pub fn begin(&mut self, name: impl Into<String>) {
        self.open.push((name.into(), Instant::now()));
    }

    /// Close the innermost sample and return its duration in milliseconds.
    pub fn end(&mut self) -> u64 {
        let Some((name, started)) = self.open.pop() else {
            warn!("Sample timer underflow: end() without a matching begin()");
            return 0;
        };

        let ms = started.elapsed().as_millis() as u64;
        if ms >= SLOW_SAMPLE_MS {
            info!("Sample '{}' took {} ms", name, ms);
        }
        ms
    }

    /// Number of samples still open.
    pub fn depth(&self) -> usize {
        self.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_adjustments() {
        let stats = QualityStats {
            decision_cycles: 10,
            scale_downs: 3,
            scale_ups: 1,
            tier_downs: 2,
            tier_ups: 1,
            saturated_decreases: 4,
            manual_changes: 5,
        };
        assert_eq!(stats.total_adjustments(), 7);
    }

    #[test]
    fn test_status_serializes() {
        let status = QualityStatus {
            dynamic_active: true,
            tier: QualityTier::High,
            scale: 0.8,
            scale_step: 1,
            min_scale: 0.7,
            max_scale: 1.0,
            average_fps: 58,
            target_framerate: 60,
            stats: QualityStats::default(),
        };

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"tier\":\"high\""));
        let parsed: QualityStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn test_sample_timer_nesting() {
        let mut timer = SampleTimer::new();
        timer.begin("outer");
        timer.begin("inner");
        assert_eq!(timer.depth(), 2);

        timer.end();
        timer.end();
        assert_eq!(timer.depth(), 0);
    }

    #[test]
    fn test_sample_timer_underflow_is_not_fatal() {
        let mut timer = SampleTimer::new();
        assert_eq!(timer.end(), 0);
        assert_eq!(timer.depth(), 0);
    }
}
