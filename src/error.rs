//! Error types for the adaptive quality controller.
//!
//! This module defines custom error enums for each component,
//! providing descriptive error messages with context information.

use crate::tier::QualityTier;
use thiserror::Error;

/// Errors related to quality configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Configuration has no '{table}' entry for tier {tier:?} (table holds {len} entries)")]
    MissingTierEntry {
        table: &'static str,
        tier: QualityTier,
        len: usize,
    },

    #[error("Failed to write configuration: {0}")]
    WriteError(#[from] std::io::Error),
}

/// Errors related to the persisted preference store.
#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("Failed to read preferences from '{path}': {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid preferences file: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Failed to write preferences: {0}")]
    WriteFailed(std::io::Error),
}

/// Errors related to reading frame-time traces.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Failed to read trace: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame time on line {line}: '{value}'")]
    InvalidFrameTime { line: usize, value: String },

    #[error("Trace contains no frame times")]
    Empty,
}

/// Errors related to logging initialization.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Could not determine a log directory (HOME or USERPROFILE not set)")]
    HomeDirectoryNotFound,

    #[error("Failed to create log directory '{path}': {source}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create log file appender: {0}")]
    AppenderCreationFailed(String),
}

/// Top-level errors.
#[derive(Error, Debug)]
pub enum QualityError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Preference store error: {0}")]
    Prefs(#[from] PrefsError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}
