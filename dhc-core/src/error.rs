//! Error handling for keymap loading, settings changes and presets.

use thiserror::Error;

/// Convenient result alias for fallible DHC operations.
pub type Result<T> = std::result::Result<T, DhcError>;

/// Errors surfaced to the caller. Anomalies during note processing are not
/// errors; they come back as [`dhc_types::Notice`] values.
#[derive(Debug, Error)]
pub enum DhcError {
    /// A keymap line did not hold exactly three integers.
    #[error("keymap line {line}: {reason} ({content:?})")]
    MalformedKeymapLine {
        /// 1-based line number.
        line: usize,
        content: String,
        reason: String,
    },
    /// Settings would produce non-finite or non-positive tones.
    #[error("invalid tuning parameter: {0}")]
    InvalidTuningParameter(String),
    #[error("invalid frequency: {0} Hz")]
    InvalidFrequency(f64),
    /// Extension point that has no implementation yet.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
