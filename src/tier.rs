//! Quality tiers and the bounded tier stepper.

use serde::{Deserialize, Serialize};

/// Overall quality preset, ranked from cheapest to most expensive.
///
/// `Automatic` is only meaningful while resolving the startup default;
/// it is never an operating tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Lowest = 0,
    Low = 1,
    #[default]
    Normal = 2,
    High = 3,
    Ultra = 4,
    Automatic = 5,
}

impl QualityTier {
    /// All operating tiers in ascending order.
    pub const RANKED: [QualityTier; 5] = [
        QualityTier::Lowest,
        QualityTier::Low,
        QualityTier::Normal,
        QualityTier::High,
        QualityTier::Ultra,
    ];

    /// Position of the tier in per-tier tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`QualityTier::index`], used when reading persisted values.
    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(QualityTier::Lowest),
            1 => Some(QualityTier::Low),
            2 => Some(QualityTier::Normal),
            3 => Some(QualityTier::High),
            4 => Some(QualityTier::Ultra),
            5 => Some(QualityTier::Automatic),
            _ => None,
        }
    }

    pub fn is_automatic(self) -> bool {
        self == QualityTier::Automatic
    }

    /// Next operating tier up, if any.
    pub fn up(self) -> Option<Self> {
        match self {
            QualityTier::Lowest => Some(QualityTier::Low),
            QualityTier::Low => Some(QualityTier::Normal),
            QualityTier::Normal => Some(QualityTier::High),
            QualityTier::High => Some(QualityTier::Ultra),
            QualityTier::Ultra | QualityTier::Automatic => None,
        }
    }

    /// Next operating tier down, if any.
    pub fn down(self) -> Option<Self> {
        match self {
            QualityTier::Lowest | QualityTier::Automatic => None,
            QualityTier::Low => Some(QualityTier::Lowest),
            QualityTier::Normal => Some(QualityTier::Low),
            QualityTier::High => Some(QualityTier::Normal),
            QualityTier::Ultra => Some(QualityTier::High),
        }
    }

    /// Lowercase name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            QualityTier::Lowest => "lowest",
            QualityTier::Low => "low",
            QualityTier::Normal => "normal",
            QualityTier::High => "high",
            QualityTier::Ultra => "ultra",
            QualityTier::Automatic => "automatic",
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns the current tier and keeps it inside the platform bounds.
///
/// Stepping past either bound is a silent no-op: sitting at a bound is the
/// normal steady state of the control loop, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct TierStepper {
    current: QualityTier,
    min: QualityTier,
    max: QualityTier,
}

impl TierStepper {
    /// Create a stepper; `initial` is clamped into `[min, max]`.
    pub fn new(initial: QualityTier, min: QualityTier, max: QualityTier) -> Self {
        let (min, max) = if min > max { (max, min) } else { (min, max) };
        Self {
            current: initial.clamp(min, max),
            min,
            max,
        }
    }

    pub fn current(&self) -> QualityTier {
        self.current
    }

    pub fn min(&self) -> QualityTier {
        self.min
    }

    pub fn max(&self) -> QualityTier {
        self.max
    }

    pub fn is_at_floor(&self) -> bool {
        self.current == self.min
    }

    pub fn is_at_ceiling(&self) -> bool {
        self.current == self.max
    }

    /// Move one tier up. Returns whether the tier changed.
    pub fn increase(&mut self) -> bool {
        if self.is_at_ceiling() {
            return false;
        }
        match self.current.up() {
            Some(next) => {
                self.current = next;
                true
            }
            None => false,
        }
    }

    /// Move one tier down. Returns whether the tier changed.
    pub fn decrease(&mut self) -> bool {
        if self.is_at_floor() {
            return false;
        }
        match self.current.down() {
            Some(next) => {
                self.current = next;
                true
            }
            None => false,
        }
    }

    /// Set the tier directly (manual override). The result is clamped to the
    /// platform bounds and returned.
    pub fn set_tier(&mut self, tier: QualityTier) -> QualityTier {
        self.current = tier.clamp(self.min, self.max);
        self.current
    }
}
