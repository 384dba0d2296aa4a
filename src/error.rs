use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// Quote or option chain could not be fetched; the cycle is abandoned.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("No OI sample for {instrument}: {reason}")]
    InstrumentDataMissing { instrument: String, reason: String },

    #[error("No tradable expiry for {0}")]
    NoExpiry(String),

    /// Only ever raised while loading config at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TrackerError {
    pub fn source_unavailable(what: &str, err: impl std::fmt::Display) -> Self {
        TrackerError::SourceUnavailable(format!("{}: {}", what, err))
    }
}
