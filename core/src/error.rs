//! Error types for the client library.
//!
//! # Design
//! Transport failures are never errors here: they come back as responses with
//! a 5xx status and a diagnostic body, the same way a blocking client reports
//! them. `Error` only covers the few places where the caller hands us
//! something unusable before any request is made.

/// Errors returned by constructors and parsers in this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request method that is not a valid HTTP token.
    #[error("invalid method token: {0:?}")]
    InvalidMethod(String),

    /// Client settings could not be decoded.
    #[error("invalid client settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),

    /// A timeout that is negative or not a finite number of seconds.
    #[error("invalid timeout: {0} seconds")]
    InvalidTimeout(f64),

    /// The runtime backing a blocking client could not be started.
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
