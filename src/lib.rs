//! Adaptive quality controller.
//!
//! Watches a rolling frame-rate average and trades render scale, then
//! quality tier, to keep it near the platform's target framerate. Settings
//! the controller converges on are persisted across sessions.

pub mod config;
pub mod controller;
pub mod cooldown;
pub mod error;
pub mod events;
pub mod logging;
pub mod pipeline;
pub mod platform;
pub mod prefs;
pub mod render_scale;
pub mod sampler;
pub mod stats;
pub mod tier;
pub mod trace;

pub use config::{ConfigFile, ControllerTuning, QualityConfig};
pub use controller::{Adjustment, ControllerState, Decision, QualityController};
pub use error::{ConfigError, LoggingError, PrefsError, QualityError, TraceError};
pub use events::{AudioQuality, QualityListener, SpeakerMode};
pub use pipeline::{RenderPipeline, RenderTargetId, RenderTargetRequest};
pub use platform::{Platform, PlatformInfo};
pub use prefs::{JsonPreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use stats::{QualityStats, QualityStatus};
pub use tier::QualityTier;
