//! Error types for audiobox

use std::path::PathBuf;
use thiserror::Error;

/// Failures building or driving an audio engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// Source file could not be opened or decoded
    #[error("Failed to open audio source {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    /// Recording could not be written
    #[error("Failed to write recording {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    /// Device stream could not be started
    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures loading or saving settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}
