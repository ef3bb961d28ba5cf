//! Configuration module for per-platform quality settings.
//!
//! This module handles the built-in platform presets, loading overrides
//! from disk, and validating everything before the controller sees it.

use crate::error::ConfigError;
use crate::pipeline::{AntialiasingMode, AntialiasingQuality};
use crate::platform::Platform;
use crate::tier::QualityTier;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Antialiasing preset applied to cameras while a given tier is active.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AntialiasingSetting {
    pub tier: QualityTier,
    pub mode: AntialiasingMode,
    pub quality: AntialiasingQuality,
}

/// Immutable per-platform quality configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityConfig {
    pub enable_dynamic_management: bool,
    pub max_framerate: u32,
    pub min_quality_tier: QualityTier,
    pub default_quality_tier: QualityTier,
    pub max_quality_tier: QualityTier,
    /// DPI cap for render scale; 0 disables the cap.
    pub max_dpi: i32,
    /// Minimum render scale per tier, as a fraction of the max scale.
    pub min_render_scale_by_tier: Vec<f32>,
    pub force_mono_by_tier: Vec<bool>,
    #[serde(default)]
    pub use_render_scale_for_render_targets: bool,
    #[serde(default)]
    pub enable_antialiasing: bool,
    #[serde(default)]
    pub antialiasing: Vec<AntialiasingSetting>,
    #[serde(default)]
    pub enable_vsync: bool,
}

impl QualityConfig {
    /// Built-in preset for desktop players.
    pub fn desktop() -> Self {
        Self {
            enable_dynamic_management: true,
            max_framerate: 60,
            min_quality_tier: QualityTier::Low,
            default_quality_tier: QualityTier::Normal,
            max_quality_tier: QualityTier::Ultra,
            max_dpi: 0,
            min_render_scale_by_tier: vec![0.5, 0.6, 0.7, 0.8, 0.85],
            force_mono_by_tier: vec![false; 5],
            use_render_scale_for_render_targets: true,
            enable_antialiasing: true,
            antialiasing: vec![
                AntialiasingSetting {
                    tier: QualityTier::High,
                    mode: AntialiasingMode::Fxaa,
                    quality: AntialiasingQuality::Medium,
                },
                AntialiasingSetting {
                    tier: QualityTier::Ultra,
                    mode: AntialiasingMode::Smaa,
                    quality: AntialiasingQuality::High,
                },
            ],
            enable_vsync: true,
        }
    }

    /// Built-in preset for Android devices.
    pub fn android() -> Self {
        Self {
            enable_dynamic_management: true,
            max_framerate: 60,
            min_quality_tier: QualityTier::Lowest,
            default_quality_tier: QualityTier::Normal,
            max_quality_tier: QualityTier::High,
            max_dpi: 320,
            min_render_scale_by_tier: vec![0.5, 0.55, 0.6, 0.7, 0.8],
            force_mono_by_tier: vec![true, true, false, false, false],
            use_render_scale_for_render_targets: true,
            enable_antialiasing: false,
            antialiasing: Vec::new(),
            enable_vsync: false,
        }
    }

    /// Built-in preset for iOS devices.
    pub fn ios() -> Self {
        Self {
            enable_dynamic_management: true,
            max_framerate: 60,
            min_quality_tier: QualityTier::Low,
            default_quality_tier: QualityTier::Normal,
            max_quality_tier: QualityTier::Ultra,
            max_dpi: 326,
            min_render_scale_by_tier: vec![0.5, 0.6, 0.65, 0.75, 0.85],
            force_mono_by_tier: vec![true, false, false, false, false],
            use_render_scale_for_render_targets: true,
            enable_antialiasing: false,
            antialiasing: Vec::new(),
            enable_vsync: false,
        }
    }

    /// Built-in preset for a platform.
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Desktop => Self::desktop(),
            Platform::Android => Self::android(),
            Platform::Ios => Self::ios(),
        }
    }

    /// Validate configuration values.
    ///
    /// Every per-tier table must cover every tier the platform can reach,
    /// since a missing entry would only surface mid-session otherwise.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_quality_tier.is_automatic() || self.max_quality_tier.is_automatic() {
            return Err(ConfigError::ValidationError(
                "min_quality_tier and max_quality_tier must be operating tiers".to_string(),
            ));
        }

        if self.min_quality_tier > self.max_quality_tier {
            return Err(ConfigError::ValidationError(format!(
                "min_quality_tier ({}) cannot be greater than max_quality_tier ({})",
                self.min_quality_tier, self.max_quality_tier
            )));
        }

        if self.max_framerate == 0 || self.max_framerate > i32::MAX as u32 {
            return Err(ConfigError::ValidationError(format!(
                "max_framerate must be in 1..={}, got {}",
                i32::MAX,
                self.max_framerate
            )));
        }

        if self.max_dpi < 0 {
            return Err(ConfigError::ValidationError(format!(
                "max_dpi ({}) must not be negative",
                self.max_dpi
            )));
        }

        for tier in QualityTier::RANKED
            .into_iter()
            .filter(|t| *t >= self.min_quality_tier && *t <= self.max_quality_tier)
        {
            let scale = self.min_render_scale(tier)?;
            if !(scale > 0.0 && scale <= 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "min render scale for tier {} must be in (0, 1], got {}",
                    tier, scale
                )));
            }
            self.force_mono(tier)?;
        }

        Ok(())
    }

    /// Minimum render scale factor for a tier.
    pub fn min_render_scale(&self, tier: QualityTier) -> Result<f32, ConfigError> {
        self.min_render_scale_by_tier
            .get(tier.index())
            .copied()
            .ok_or(ConfigError::MissingTierEntry {
                table: "min_render_scale_by_tier",
                tier,
                len: self.min_render_scale_by_tier.len(),
            })
    }

    /// Whether audio is forced to mono for a tier.
    pub fn force_mono(&self, tier: QualityTier) -> Result<bool, ConfigError> {
        self.force_mono_by_tier
            .get(tier.index())
            .copied()
            .ok_or(ConfigError::MissingTierEntry {
                table: "force_mono_by_tier",
                tier,
                len: self.force_mono_by_tier.len(),
            })
    }

    /// Antialiasing preset for a tier; the last matching entry wins.
    pub fn antialiasing_for(&self, tier: QualityTier) -> Option<&AntialiasingSetting> {
        self.antialiasing.iter().rev().find(|s| s.tier == tier)
    }
}

/// Constants of the control loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControllerTuning {
    /// Average below `target - tolerance_down` triggers a decrease.
    pub tolerance_down: i32,
    /// Average at or above `target - tolerance_up` counts as a ceiling check.
    pub tolerance_up: i32,
    pub sample_capacity: usize,
    /// Consecutive ceiling checks needed before an increase.
    pub required_consecutive: u32,
    /// Seconds between decision cycles.
    pub cooldown_secs: f32,
}

impl Default for ControllerTuning {
    fn default() -> Self {
        Self {
            tolerance_down: 5,
            tolerance_up: 3,
            sample_capacity: 300,
            required_consecutive: 3,
            cooldown_secs: 5.0,
        }
    }
}

impl ControllerTuning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tolerance_up < 0 || self.tolerance_up >= self.tolerance_down {
            return Err(ConfigError::ValidationError(format!(
                "tolerance_up ({}) must be non-negative and smaller than tolerance_down ({})",
                self.tolerance_up, self.tolerance_down
            )));
        }

        if self.sample_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "sample_capacity must be greater than 0".to_string(),
            ));
        }

        if self.required_consecutive == 0 {
            return Err(ConfigError::ValidationError(
                "required_consecutive must be greater than 0".to_string(),
            ));
        }

        if !(self.cooldown_secs.is_finite() && self.cooldown_secs > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "cooldown_secs ({}) must be a positive number",
                self.cooldown_secs
            )));
        }

        Ok(())
    }
}

/// On-disk configuration: one preset per platform plus loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConfigFile {
    pub desktop: QualityConfig,
    pub android: QualityConfig,
    pub ios: QualityConfig,
    pub tuning: ControllerTuning,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            desktop: QualityConfig::desktop(),
            android: QualityConfig::android(),
            ios: QualityConfig::ios(),
            tuning: ControllerTuning::default(),
        }
    }
}

impl ConfigFile {
    /// Load configuration from file or use the built-in presets.
    /// If the file doesn't exist, returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::ParseError(format!("Failed to read config file: {}", e)))?;

        let file: ConfigFile = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("Invalid JSON: {}", e)))?;

        file.validate()?;
        Ok(file)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.desktop.validate()?;
        self.android.validate()?;
        self.ios.validate()?;
        self.tuning.validate()
    }

    /// Save configuration to file using atomic write.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {}", e)))?;

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Preset selected for a platform.
    pub fn for_platform(&self, platform: Platform) -> &QualityConfig {
        match platform {
            Platform::Desktop => &self.desktop,
            Platform::Android => &self.android,
            Platform::Ios => &self.ios,
        }
    }

    /// Default config path (`<config dir>/adaptive-quality/quality.json`).
    pub fn default_path() -> PathBuf {
        config_dir().join("quality.json")
    }
}

/// Directory holding this crate's config and preference files.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("adaptive-quality"))
        .unwrap_or_else(|| PathBuf::from("/tmp/adaptive-quality"))
}
