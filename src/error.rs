//! Harvester error types

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the harvesting engine.
///
/// "Found zero reviews" is never an error: extraction returns an empty
/// collection for that case so callers can tell it apart from a session
/// that could not run at all.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Timeouts and missing elements during a known-volatile load. Retryable.
    #[error("Transient page error: {0}")]
    TransientPage(String),

    /// Host-level denial (rate limit, access-denied page). Recoverable by
    /// rotating to a fresh identity.
    #[error("Host blocked the current identity: {0}")]
    Blocked(String),

    /// CAPTCHA challenge stayed unresolved for the whole wait window.
    #[error("CAPTCHA not resolved within {waited:?}")]
    CaptchaUnresolved { waited: Duration },

    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid policy or config values. Fatal, never retried.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classes used for retry-policy membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Launch,
    Transient,
    Blocked,
    Captcha,
    Timeout,
    Configuration,
    Io,
}

impl HarvestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LaunchFailed(_) => ErrorKind::Launch,
            Self::TransientPage(_) => ErrorKind::Transient,
            Self::Blocked(_) => ErrorKind::Blocked,
            Self::CaptchaUnresolved { .. } => ErrorKind::Captcha,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<HarvestError> for String {
    fn from(err: HarvestError) -> String {
        err.to_string()
    }
}
