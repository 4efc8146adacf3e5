//! Archive loader trait and implementations.
//!
//! A loader turns a [`Locator`] into an inflated [`Archive`]. Loaders do no
//! caching of their own; deduplication across concurrent requests is the
//! cache's job.

mod http;
mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::http::HttpLoader;
pub use self::local::LocalLoader;
#[cfg(feature = "mock")]
pub use self::mock::{Gate, MockLoader};
use crate::error::{ErrorKind, Result};
use crate::{Archive, Locator, Origin};
use async_trait::async_trait;
use std::sync::Arc;

/// Shared, type-erased loader.
pub type LoaderHandle = Arc<dyn ArchiveLoader + Send + Sync>;

/// Obtains and inflates the raw container named by a locator.
///
/// # Examples
///
/// ```
/// use folio_archive::{ArchiveLoader, Locator, error::Result};
///
/// async fn entry_count(loader: &dyn ArchiveLoader, raw: &str) -> Result<usize> {
///     let locator = Locator::parse(raw)?;
///     Ok(loader.load(&locator).await?.len())
/// }
/// ```
#[async_trait]
pub trait ArchiveLoader: Send + Sync {
    /// Name of the loader, for logging only.
    fn name(&self) -> &str;

    /// Fetch and inflate the container. May fail with any
    /// [`ErrorKind`](crate::error::ErrorKind).
    async fn load(&self, locator: &Locator) -> Result<Archive>;
}

/// Dispatches to a remote or library loader depending on the locator's
/// [`Origin`]. Origins without a configured loader fail with
/// [`UnsupportedOrigin`](ErrorKind::UnsupportedOrigin).
#[derive(Clone, Default)]
pub struct OriginLoader {
    remote: Option<HttpLoader>,
    library: Option<LocalLoader>,
}
impl OriginLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote(mut self, remote: HttpLoader) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_library(mut self, library: LocalLoader) -> Self {
        self.library = Some(library);
        self
    }
}

#[async_trait]
impl ArchiveLoader for OriginLoader {
    fn name(&self) -> &str {
        "origin"
    }

    async fn load(&self, locator: &Locator) -> Result<Archive> {
        match (locator.origin(), &self.remote, &self.library) {
            (Origin::Remote(_), Some(remote), _) => remote.load(locator).await,
            (Origin::Library(_), _, Some(library)) => library.load(locator).await,
            _ => exn::bail!(ErrorKind::UnsupportedOrigin(locator.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_origin() {
        let loader = OriginLoader::new();
        let locator = Locator::parse("https://example.com/book.epub").unwrap();
        let err = loader.load(&locator).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedOrigin(_)));
    }

    #[tokio::test]
    async fn test_library_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = crate::archive::tests::zip_bytes(&[("001.png", b"png")]);
        std::fs::write(dir.path().join("issue-1.cbz"), bytes).unwrap();
        let loader = OriginLoader::new().with_library(LocalLoader::new(dir.path()).unwrap());
        let archive = loader.load(&Locator::parse("issue-1.cbz").unwrap()).await.unwrap();
        assert!(archive.contains("001.png"));
        // Remote locators still have nowhere to go.
        let remote = Locator::parse("https://example.com/book.epub").unwrap();
        assert!(loader.load(&remote).await.is_err());
    }
}
