use thiserror::Error;

/// Application-level errors.
///
/// Only the outer surfaces (configuration, report files, the CLI) can fail.
/// The evidence pipeline itself is total: data-quality problems are
/// substituted and logged, never raised.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid configuration value.
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong with the configuration.
        message: String,
    },

    /// Filesystem error while reading inputs or writing reports.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error on an input or report file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a single fetch/parse step inside the record retry loop.
///
/// These never escape the `records` module: after the retry budget is spent
/// the loop falls through to sanitized defaults.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecordError {
    /// The external record source failed to produce any text.
    #[error("Record source failed on attempt {attempt}: {message}")]
    Source {
        /// 1-based attempt number.
        attempt: u32,
        /// Error details.
        message: String,
    },

    /// The text could not be parsed as JSON, even after structural repair.
    #[error("Unparseable record text: {message}")]
    Unparseable {
        /// Parser message or a preview of the text.
        message: String,
    },
}

/// Result type alias for application errors.
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for record fetch/parse steps.
pub type RecordResult<T> = Result<T, RecordError>;
