//! Library (local filesystem) archive loader.

use crate::error::{ErrorKind, Result};
use crate::{Archive, ArchiveLoader, Locator};
use async_trait::async_trait;
use exn::ResultExt;
use std::path::{Path, PathBuf};

/// Reads library locators relative to a root directory.
///
/// # Examples
///
/// ```no_run
/// use folio_archive::LocalLoader;
///
/// # fn example() -> folio_archive::error::Result<()> {
/// let loader = LocalLoader::new("/srv/books")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalLoader {
    root: PathBuf,
}
impl LocalLoader {
    /// Create a loader for an existing, absolute library directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || !root.is_dir() {
            exn::bail!(ErrorKind::Io(format!("library root is not an absolute directory: {}", root.display())));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArchiveLoader for LocalLoader {
    fn name(&self) -> &str {
        "library"
    }

    async fn load(&self, locator: &Locator) -> Result<Archive> {
        let Some(relative) = locator.library_path() else {
            exn::bail!(ErrorKind::UnsupportedOrigin(locator.to_string()));
        };
        let absolute = self.root.join(relative);
        let bytes = match tokio::fs::read(&absolute).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                exn::bail!(ErrorKind::NotFound(locator.to_string()))
            },
            Err(e) => Err(e).or_raise(|| ErrorKind::Io(format!("failed to read {}", absolute.display())))?,
        };
        tracing::debug!(path = %absolute.display(), bytes = bytes.len(), "Read library archive");
        Archive::inflate(locator.clone(), bytes).await
    }
}
