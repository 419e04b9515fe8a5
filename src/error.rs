use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TrackerError {
    #[error("\"{0}\" doesn't look like a Fimfiction story URL or ID")]
    #[diagnostic(help("use a numeric ID or a URL like https://www.fimfiction.net/story/1234"))]
    InvalidStoryId(String),

    #[error("conflicting flags: {0}")]
    ConflictingFlags(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse config file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("invalid value for {key} in {path}: {message}")]
    InvalidSetting {
        key: String,
        path: PathBuf,
        message: String,
    },

    #[error("unknown placeholder ${name} in download command; valid placeholders: {valid}")]
    UnknownPlaceholder { name: String, valid: String },

    #[error("invalid download command template: {0}")]
    InvalidTemplate(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response from Fimfiction: {0}")]
    Fetch(String),

    #[error("download command failed: {0}")]
    Command(String),

    #[error("registry error: {0}")]
    Storage(String),

    #[error("terminal error: {0}")]
    Terminal(String),

    #[error("there is no story of ID {0} on the tracked list")]
    NotTracked(String),
}

impl TrackerError {
    /// Validation problems detected before any network or disk work.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TrackerError::InvalidStoryId(_)
                | TrackerError::ConflictingFlags(_)
                | TrackerError::ConfigRead(_)
                | TrackerError::ConfigParse { .. }
                | TrackerError::InvalidSetting { .. }
                | TrackerError::UnknownPlaceholder { .. }
                | TrackerError::InvalidTemplate(_)
        )
    }

    pub fn is_request(&self) -> bool {
        matches!(
            self,
            TrackerError::Request(_) | TrackerError::Status { .. } | TrackerError::Fetch(_)
        )
    }
}

