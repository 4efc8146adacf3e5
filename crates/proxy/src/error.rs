//! Proxy Error Types
//!
//! These never leave the crate as errors: the synthesizer turns every one of
//! them into a `500` response whose body is the error's message.

use derive_more::{Display, Error};
use folio_cache::error::{Error as CacheError, ErrorKind as CacheErrorKind};
use folio_manifest::error::{Error as GenerationError, ErrorKind as GenerationErrorKind};

/// A proxy error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for proxy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The archive could not be obtained.
    #[display("{_0}")]
    Archive(CacheErrorKind),
    /// The archive loaded, but the manifest or resource could not be produced.
    #[display("{_0}")]
    Generation(GenerationErrorKind),
    #[display("failed to serialize manifest")]
    Serialize,
}
impl ErrorKind {
    /// Wrap a cache error, keeping its `Exn` frame as a child.
    #[track_caller]
    pub fn archive(err: CacheError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Archive(inner))
    }

    /// Wrap a generation error, keeping its `Exn` frame as a child.
    #[track_caller]
    pub fn generation(err: GenerationError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Generation(inner))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Archive(inner) => inner.is_retryable(),
            Self::Generation(inner) => inner.is_retryable(),
            Self::Serialize => false,
        }
    }
}
