//! Session Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A session error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The content descriptor could not be obtained. The message is the
    /// failure text served by the proxy (or the transport error), verbatim.
    #[display("{_0}")]
    Descriptor(#[error(not(source))] String),
    /// The view could not be mounted for the selected mode.
    #[display("failed to mount reader: {_0}")]
    Mount(#[error(not(source))] String),
    /// Reading or writing persisted positions failed.
    #[display("position store error: {_0}")]
    Store(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Descriptor(_) | Self::Store(_))
    }
}
