//! Generation Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A generation error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for manifest and resource generation.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested path does not exist inside the archive.
    #[display("resource not found: {_0}")]
    ResourceNotFound(#[error(not(source))] String),
    /// The archive holds nothing a reading engine could display.
    #[display("no readable content in {_0}")]
    NoReadableContent(#[error(not(source))] String),
    /// A generator-specific failure. The message is passed through verbatim.
    #[display("{_0}")]
    Generator(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
