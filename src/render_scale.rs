//! Render scale stepping.
//!
//! The render scale moves between a DPI-derived maximum and a tier-derived
//! minimum in a fixed number of discrete steps. Step 0 is the maximum scale,
//! step [`SCALE_STEPS`] the minimum.

use crate::config::QualityConfig;
use crate::error::ConfigError;
use crate::tier::QualityTier;

/// Number of steps between the max and min render scale.
pub const SCALE_STEPS: i32 = 3;

/// Upper bound of the render scale for a display density.
///
/// Screens denser than `max_dpi` are rendered at `max_dpi / dpi`. An unknown
/// density (`dpi <= 0`) or a disabled cap (`max_dpi <= 0`) gives 1.0.
pub fn max_scale_for_dpi(dpi: i32, max_dpi: i32) -> f32 {
    if dpi <= 0 || max_dpi <= 0 {
        return 1.0;
    }
    if dpi > max_dpi {
        max_dpi as f32 / dpi as f32
    } else {
        1.0
    }
}

/// Bounded step counter mapped onto a continuous render scale.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleStepper {
    step: i32,
    max_scale: f32,
    min_scale: f32,
}

impl ScaleStepper {
    /// Set up the stepper for the startup tier.
    ///
    /// A persisted step wins (clamped into range). Without one, the lowest
    /// tier starts at the minimum scale and every other tier at the maximum.
    pub fn initialize(
        tier: QualityTier,
        persisted_step: Option<i32>,
        dpi: i32,
        config: &QualityConfig,
    ) -> Result<Self, ConfigError> {
        let max_scale = max_scale_for_dpi(dpi, config.max_dpi);
        let min_scale = max_scale * config.min_render_scale(tier)?;

        let step = match persisted_step {
            Some(step) => step.clamp(0, SCALE_STEPS),
            None if tier == QualityTier::Lowest => SCALE_STEPS,
            None => 0,
        };

        Ok(Self {
            step,
            max_scale,
            min_scale,
        })
    }

    /// Recompute the minimum scale for a new tier. The step is kept and
    /// re-applied against the new bounds.
    pub fn on_tier_changed(
        &mut self,
        tier: QualityTier,
        config: &QualityConfig,
    ) -> Result<(), ConfigError> {
        self.min_scale = self.max_scale * config.min_render_scale(tier)?;
        Ok(())
    }

    /// Raise the scale by one step. Returns whether the step changed.
    pub fn increase(&mut self) -> bool {
        let previous = self.step;
        self.step = (self.step - 1).max(0);
        self.step != previous
    }

    /// Lower the scale by one step. Returns whether the step changed.
    pub fn decrease(&mut self) -> bool {
        let previous = self.step;
        self.step = (self.step + 1).min(SCALE_STEPS);
        self.step != previous
    }

    pub fn is_at_minimum(&self) -> bool {
        self.step == SCALE_STEPS
    }

    pub fn is_at_maximum(&self) -> bool {
        self.step == 0
    }

    pub fn step(&self) -> i32 {
        self.step
    }

    pub fn min_scale(&self) -> f32 {
        self.min_scale
    }

    pub fn max_scale(&self) -> f32 {
        self.max_scale
    }

    /// Effective render scale at the current step.
    pub fn scale(&self) -> f32 {
        self.scale_at(self.step)
    }

    /// Effective render scale at an arbitrary step (clamped into range).
    pub fn scale_at(&self, step: i32) -> f32 {
        let step = step.clamp(0, SCALE_STEPS);
        if step == SCALE_STEPS {
            return self.min_scale;
        }
        let step_size = (self.max_scale - self.min_scale) / SCALE_STEPS as f32;
        self.max_scale - step_size * step as f32
    }
}
