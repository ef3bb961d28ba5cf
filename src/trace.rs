//! Frame-time traces for offline replay.
//!
//! A trace is plain text with one frame time in milliseconds per line.
//! Blank lines and lines starting with `#` are skipped.

use crate::error::TraceError;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Recorded frame times, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTrace {
    frames: Vec<f32>,
}

impl FrameTrace {
    /// Parse a trace from text.
    ///
    /// Values must be finite and non-negative; a zero frame time is kept so
    /// replays can exercise the invalid-sample path.
    pub fn parse(text: &str) -> Result<Self, TraceError> {
        let mut frames = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let ms: f32 = line.parse().map_err(|_| TraceError::InvalidFrameTime {
                line: index + 1,
                value: line.to_string(),
            })?;
            if !ms.is_finite() || ms < 0.0 {
                return Err(TraceError::InvalidFrameTime {
                    line: index + 1,
                    value: line.to_string(),
                });
            }

            frames.push(ms / 1000.0);
        }

        if frames.is_empty() {
            return Err(TraceError::Empty);
        }

        Ok(Self { frames })
    }

    /// Read and parse a trace file.
    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let text = fs::read_to_string(path)?;
        let trace = Self::parse(&text)?;
        debug!(
            "Loaded {} frames ({:.1}s) from {}",
            trace.len(),
            trace.duration_secs(),
            path.display()
        );
        Ok(trace)
    }

    /// Frame deltas in seconds.
    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total wall time covered by one pass over the trace.
    pub fn duration_secs(&self) -> f32 {
        self.frames.iter().sum()
    }
}
