//! Rolling frame-rate sampler.
//!
//! Keeps the most recent per-frame rate samples in a fixed-capacity
//! circular buffer and computes their average on demand.

/// Default sample capacity (300 frames, five seconds at 60 fps).
pub const DEFAULT_SAMPLE_CAPACITY: usize = 300;

/// Circular buffer of instantaneous frame-rate samples.
///
/// Zero entries mean "not written since the last reset" or "invalid frame
/// time" and are left out of the average entirely.
#[derive(Debug, Clone)]
pub struct MetricSampler {
    samples: Vec<i32>,
    cursor: usize,
    count: usize,
}

impl MetricSampler {
    /// Create a sampler with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SAMPLE_CAPACITY)
    }

    /// Create a sampler with a specific capacity (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: vec![0; capacity.max(1)],
            cursor: 0,
            count: 0,
        }
    }

    /// Write a sample at the cursor, overwriting the oldest once full.
    pub fn record(&mut self, sample: i32) {
        self.samples[self.cursor] = sample;
        self.cursor = (self.cursor + 1) % self.samples.len();
        if self.count < self.samples.len() {
            self.count += 1;
        }
    }

    /// Truncated mean of the non-zero samples, or 0 if there are none.
    pub fn average(&self) -> i32 {
        let (sum, valid) = self
            .samples
            .iter()
            .filter(|&&s| s != 0)
            .fold((0i64, 0i64), |(sum, n), &s| (sum + s as i64, n + 1));

        if valid == 0 {
            return 0;
        }
        (sum / valid) as i32
    }

    /// Drop every sample and rewind the cursor.
    pub fn reset(&mut self) {
        self.samples.iter_mut().for_each(|s| *s = 0);
        self.cursor = 0;
        self.count = 0;
    }

    /// Number of samples written since the last reset, saturating at capacity.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }
}

impl Default for MetricSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a frame delta to a whole frame rate.
///
/// Returns 0 (an excluded sample) for non-positive or non-finite deltas.
pub fn rate_from_delta(delta_secs: f32) -> i32 {
    if !(delta_secs.is_finite() && delta_secs > 0.0) {
        return 0;
    }

    let rate = (1.0 / delta_secs).round();
    if !rate.is_finite() || rate > i32::MAX as f32 {
        return 0;
    }
    rate as i32
}
