//! Platform identification and one-shot capability queries.
//!
//! These are only consulted while resolving the startup tier and the render
//! scale ceiling, never from the per-frame loop.

use crate::config::QualityConfig;
use crate::prefs::{PreferenceStore, PP_QUALITY_TIER};
use crate::tier::QualityTier;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Target platform family; selects the config preset and the default-tier
/// heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Desktop,
    Android,
    Ios,
}

impl Platform {
    /// Platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Platform::Android
        } else if cfg!(target_os = "ios") {
            Platform::Ios
        } else {
            Platform::Desktop
        }
    }

    /// Desktop builds only change quality automatically after the user opted
    /// in, and do not start dynamic management on their own.
    pub fn requires_automatic_opt_in(self) -> bool {
        self == Platform::Desktop
    }
}

/// Capability queries answered by the host platform.
pub trait PlatformInfo {
    /// Display density, or 0 when unknown.
    fn current_dpi(&self) -> i32;

    /// Installed physical memory in MiB, or 0 when unknown.
    fn physical_memory_mb(&self) -> i64;
}

/// Fixed answers, for hosts that already know them and for tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedPlatform {
    pub dpi: i32,
    pub memory_mb: i64,
}

impl PlatformInfo for FixedPlatform {
    fn current_dpi(&self) -> i32 {
        self.dpi
    }

    fn physical_memory_mb(&self) -> i64 {
        self.memory_mb
    }
}

/// Queries the running system. Density is not exposed by the OS here, so it
/// is reported as unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPlatform;

impl PlatformInfo for SystemPlatform {
    fn current_dpi(&self) -> i32 {
        0
    }

    #[cfg(unix)]
    fn physical_memory_mb(&self) -> i64 {
        // SAFETY: sysconf has no preconditions and only reads system values.
        let pages = unsafe { libc::sysconf(libc::_SC_PHYS_PAGES) };
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if pages <= 0 || page_size <= 0 {
            return 0;
        }
        (pages as i64).saturating_mul(page_size as i64) / (1024 * 1024)
    }

    #[cfg(not(unix))]
    fn physical_memory_mb(&self) -> i64 {
        0
    }
}

/// Default tier for a device before any user preference is applied.
///
/// Android picks by installed memory; desktop defers to `Automatic`, which
/// the later clamp turns into the platform's max tier.
pub fn resolve_default_tier(
    platform: Platform,
    config: &QualityConfig,
    info: &dyn PlatformInfo,
) -> QualityTier {
    match platform {
        Platform::Desktop => QualityTier::Automatic,
        Platform::Ios => config.default_quality_tier,
        Platform::Android => {
            let memory_mb = info.physical_memory_mb();
            debug!("Resolving default tier from {} MiB of memory", memory_mb);
            match memory_mb {
                m if m <= 0 => config.default_quality_tier,
                m if m <= 2560 => QualityTier::Lowest,
                m if m <= 3072 => QualityTier::Low,
                m if m <= 6144 => QualityTier::Normal,
                _ => QualityTier::High,
            }
        }
    }
}

/// Tier to start the session with: the persisted tier if there is one,
/// otherwise the resolved default, clamped to the platform bounds.
pub fn resolve_startup_tier(
    platform: Platform,
    config: &QualityConfig,
    info: &dyn PlatformInfo,
    prefs: &dyn PreferenceStore,
) -> QualityTier {
    let default_tier = resolve_default_tier(platform, config, info);
    let stored = prefs.get_int(PP_QUALITY_TIER, default_tier.index() as i32);
    let tier = QualityTier::from_index(stored).unwrap_or(default_tier);
    let (min, max) = if config.min_quality_tier > config.max_quality_tier {
        (config.max_quality_tier, config.min_quality_tier)
    } else {
        (config.min_quality_tier, config.max_quality_tier)
    };
    tier.clamp(min, max)
}
