//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Every variant carries its message as owned data (no borrowed sources) so
//! that a single failed load can be cloned out to every caller waiting on it.

use derive_more::{Display, Error};

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The locator string could not be understood (empty, bad URL, escapes
    /// the library root, unsupported scheme...).
    #[display("invalid locator: {_0}")]
    InvalidLocator(#[error(not(source))] String),
    /// No loader is configured for the locator's origin.
    #[display("no loader configured for locator: {_0}")]
    UnsupportedOrigin(#[error(not(source))] String),
    /// The book does not exist at its origin.
    #[display("book not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// Fetching the book failed. The message is passed through verbatim.
    #[display("{_0}")]
    Network(#[error(not(source))] String),
    /// The fetched bytes are not a readable container.
    #[display("invalid archive: {_0}")]
    InvalidArchive(#[error(not(source))] String),
    /// Local I/O failed.
    #[display("I/O error: {_0}")]
    Io(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Network("network error".to_string()).to_string(), "network error");
        assert_eq!(ErrorKind::NotFound("books/a.cbz".to_string()).to_string(), "book not found: books/a.cbz");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Network("timeout".to_string()).is_retryable());
        assert!(!ErrorKind::InvalidArchive("a.cbz".to_string()).is_retryable());
        assert!(!ErrorKind::InvalidLocator(String::new()).is_retryable());
    }
}
