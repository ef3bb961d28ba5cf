//! Persisted scalar preferences.
//!
//! Quality state that survives a restart is a flat set of integer entries:
//! the current tier, the automatic-mode opt-in and the render scale step.

use crate::error::PrefsError;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Current quality tier, stored as the tier index.
pub const PP_QUALITY_TIER: &str = "CurrentQualityTier";
/// Non-zero when the user opted in to automatic quality changes.
pub const PP_QUALITY_AUTOMATIC: &str = "CurrentQualityChangeAutomatic";
/// Render scale step saved when dynamic management stops.
pub const PP_RENDER_SCALE_STEP: &str = "CurrentRenderScaleStep";
/// Zero when the user turned antialiasing off.
pub const PP_ANTI_ALIASING_ENABLED: &str = "AAEnabled";
/// VSync count chosen by the user; overrides the config default of 1.
pub const PP_VSYNC_STATE: &str = "VSyncTurnedOn";

/// Integer key/value store backing persisted quality settings.
///
/// Writes must be visible to subsequent reads as soon as `set_int` returns.
pub trait PreferenceStore {
    fn get_int(&self, key: &str, default: i32) -> i32;

    fn set_int(&mut self, key: &str, value: i32);

    fn has_key(&self, key: &str) -> bool;
}

/// Store that lives only as long as the process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryPreferenceStore {
    values: BTreeMap<String, i32>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> &BTreeMap<String, i32> {
        &self.values
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get_int(&self, key: &str, default: i32) -> i32 {
        self.values.get(key).copied().unwrap_or(default)
    }

    fn set_int(&mut self, key: &str, value: i32) {
        self.values.insert(key.to_string(), value);
    }

    fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

/// Store persisted as a flat JSON object, rewritten atomically on every
/// change.
#[derive(Debug)]
pub struct JsonPreferenceStore {
    values: BTreeMap<String, i32>,
    path: PathBuf,
}

impl JsonPreferenceStore {
    /// Load preferences from file, or start empty if it doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self, PrefsError> {
        let values = if path.exists() {
            let contents = fs::read_to_string(path).map_err(|e| PrefsError::ReadFailed {
                path: path.display().to_string(),
                source: e,
            })?;
            serde_json::from_str(&contents)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            values,
            path: path.to_path_buf(),
        })
    }

    /// Write all entries to disk using a temp file and rename.
    pub fn save(&self) -> Result<(), PrefsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(PrefsError::WriteFailed)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&self.values)?;

        {
            let mut file = fs::File::create(&temp_path).map_err(PrefsError::WriteFailed)?;
            file.write_all(json.as_bytes())
                .map_err(PrefsError::WriteFailed)?;
            file.sync_all().map_err(PrefsError::WriteFailed)?;
        }

        fs::rename(&temp_path, &self.path).map_err(PrefsError::WriteFailed)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Default preferences path (`<config dir>/adaptive-quality/prefs.json`).
    pub fn default_path() -> PathBuf {
        crate::config::config_dir().join("prefs.json")
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn get_int(&self, key: &str, default: i32) -> i32 {
        self.values.get(key).copied().unwrap_or(default)
    }

    fn set_int(&mut self, key: &str, value: i32) {
        if self.values.get(key) == Some(&value) && self.path.exists() {
            return;
        }

        self.values.insert(key.to_string(), value);
        match self.save() {
            Ok(()) => debug!("Persisted {} = {}", key, value),
            // The in-memory value stays authoritative for this session
            Err(e) => warn!("Failed to persist {} = {}: {}", key, value, e),
        }
    }

    fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}
