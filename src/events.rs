//! Change notifications fanned out by the controller.

use crate::config::QualityConfig;
use crate::error::ConfigError;
use crate::tier::QualityTier;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

/// Receiver of quality changes (camera managers, audio mixers, overlays).
///
/// All methods default to doing nothing.
pub trait QualityListener {
    fn on_tier_changed(&mut self, _tier: QualityTier) {}

    fn on_scale_changed(&mut self, _scale: f32) {}

    fn on_quality_management_begin(&mut self) {}

    fn on_quality_management_end(&mut self) {}
}

/// One notification, as captured by [`EventLog`].
#[derive(Debug, Clone, PartialEq)]
pub enum QualityEvent {
    TierChanged(QualityTier),
    ScaleChanged(f32),
    ManagementBegin,
    ManagementEnd,
}

/// Listener that appends every notification to a shared list.
///
/// Clones share the same list, so a host can keep one clone and hand the
/// other to the controller.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<QualityEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<QualityEvent> {
        self.events.borrow().clone()
    }

    pub fn tier_changes(&self) -> Vec<QualityTier> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                QualityEvent::TierChanged(t) => Some(*t),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl QualityListener for EventLog {
    fn on_tier_changed(&mut self, tier: QualityTier) {
        self.events.borrow_mut().push(QualityEvent::TierChanged(tier));
    }

    fn on_scale_changed(&mut self, scale: f32) {
        self.events.borrow_mut().push(QualityEvent::ScaleChanged(scale));
    }

    fn on_quality_management_begin(&mut self) {
        self.events.borrow_mut().push(QualityEvent::ManagementBegin);
    }

    fn on_quality_management_end(&mut self) {
        self.events.borrow_mut().push(QualityEvent::ManagementEnd);
    }
}

/// Audio output channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerMode {
    Mono,
    Stereo,
}

/// Speaker mode the config asks for at a tier.
pub fn speaker_mode_for(config: &QualityConfig, tier: QualityTier) -> Result<SpeakerMode, ConfigError> {
    Ok(if config.force_mono(tier)? {
        SpeakerMode::Mono
    } else {
        SpeakerMode::Stereo
    })
}

/// Switches audio between mono and stereo as the tier changes.
///
/// `apply` is called with the initial mode on construction and again
/// whenever a tier change flips the mode.
pub struct AudioQuality<F: FnMut(SpeakerMode)> {
    force_mono_by_tier: Vec<bool>,
    mode: SpeakerMode,
    apply: F,
}

impl<F: FnMut(SpeakerMode)> AudioQuality<F> {
    pub fn new(config: &QualityConfig, tier: QualityTier, mut apply: F) -> Result<Self, ConfigError> {
        let mode = speaker_mode_for(config, tier)?;
        apply(mode);
        Ok(Self {
            force_mono_by_tier: config.force_mono_by_tier.clone(),
            mode,
            apply,
        })
    }

    pub fn mode(&self) -> SpeakerMode {
        self.mode
    }
}

impl<F: FnMut(SpeakerMode)> QualityListener for AudioQuality<F> {
    fn on_tier_changed(&mut self, tier: QualityTier) {
        // Bounds were validated with the config; an unknown tier keeps the mode
        let Some(&mono) = self.force_mono_by_tier.get(tier.index()) else {
            return;
        };
        let mode = if mono { SpeakerMode::Mono } else { SpeakerMode::Stereo };
        if mode != self.mode {
            info!("Audio switched to {:?} for tier {}", mode, tier);
            self.mode = mode;
            (self.apply)(mode);
        }
    }
}
