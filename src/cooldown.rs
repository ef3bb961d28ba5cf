//! Cooldown gate rate-limiting decision cycles.

use std::time::Duration;
use tracing::debug;

/// Emits one "ready" pulse per cooldown interval.
///
/// Readiness is queried and cleared in two steps: `tick` only raises the
/// flag, `consume` lowers it and restarts the interval. A pulse raised while
/// nobody consumes it is kept rather than lost.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    interval: f32,
    elapsed: f32,
    ready: bool,
    underflows: u64,
}

impl CooldownGate {
    pub fn new(interval: Duration) -> Self {
        Self::from_secs(interval.as_secs_f32())
    }

    pub fn from_secs(interval_secs: f32) -> Self {
        Self {
            interval: interval_secs,
            elapsed: 0.0,
            ready: false,
            underflows: 0,
        }
    }

    /// Advance the gate by `delta_secs`. No-op while a pulse is pending.
    pub fn tick(&mut self, delta_secs: f32) {
        if self.ready {
            return;
        }
        if delta_secs.is_finite() && delta_secs > 0.0 {
            self.elapsed += delta_secs;
        }
        if self.elapsed >= self.interval {
            self.ready = true;
        }
    }

    /// Take the pending pulse, if any, and restart the interval.
    pub fn consume(&mut self) -> bool {
        if !self.ready {
            self.underflows += 1;
            debug!(
                "Cooldown consumed with no pulse pending ({:.3}s of {:.3}s elapsed)",
                self.elapsed, self.interval
            );
            return false;
        }
        self.ready = false;
        self.elapsed = 0.0;
        true
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed
    }

    pub fn interval_secs(&self) -> f32 {
        self.interval
    }

    /// How many times `consume` was called with nothing pending.
    pub fn underflows(&self) -> u64 {
        self.underflows
    }

    /// Clear any pending pulse and elapsed time.
    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.ready = false;
    }
}
