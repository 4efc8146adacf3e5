//! In-memory archive loader for testing.

use crate::error::{ErrorKind, Result};
use crate::{Archive, ArchiveLoader, Locator};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{RwLock, watch};

type Entries = Vec<(String, Vec<u8>)>;

/// Holds every load until [`open`](Self::open) is called. Lets tests pile up
/// concurrent callers on a single in-flight load.
#[derive(Clone)]
pub struct Gate {
    tx: Arc<watch::Sender<bool>>,
}
impl Gate {
    pub fn open(&self) {
        self.tx.send_replace(true);
    }
}

/// In-memory archive loader for testing.
///
/// Books are registered either as a list of entries or as a failure message.
/// Every call to [`load`](ArchiveLoader::load) is counted, which is what the
/// cache tests assert on.
///
/// # Examples
///
/// ```
/// use folio_archive::{ArchiveLoader, Locator, MockLoader, error::ErrorKind};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let loader = MockLoader::default()
///     .with_book("comics/a.cbz", [("001.png", b"png".to_vec())])
///     .with_failure("comics/b.cbz", "network error");
/// let archive = loader.load(&Locator::parse("comics/a.cbz").unwrap()).await.unwrap();
/// assert_eq!(archive.len(), 1);
/// let err = loader.load(&Locator::parse("comics/b.cbz").unwrap()).await.unwrap_err();
/// assert!(matches!(&*err, ErrorKind::Network(message) if message == "network error"));
/// assert_eq!(loader.loads(), 2);
/// # }
/// ```
#[derive(Default)]
pub struct MockLoader {
    books: RwLock<HashMap<String, std::result::Result<Entries, String>>>,
    loads: AtomicUsize,
    gate: Option<watch::Receiver<bool>>,
}
impl MockLoader {
    /// Register a book. Replaces any previous registration for the locator.
    pub fn with_book(
        mut self,
        locator: impl Into<String>,
        entries: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>,
    ) -> Self {
        let entries = entries.into_iter().map(|(path, data)| (path.into(), data.into())).collect();
        self.books.get_mut().insert(locator.into(), Ok(entries));
        self
    }

    /// Register a locator whose load fails with a [`Network`](ErrorKind::Network)
    /// error carrying `message`.
    pub fn with_failure(mut self, locator: impl Into<String>, message: impl Into<String>) -> Self {
        self.books.get_mut().insert(locator.into(), Err(message.into()));
        self
    }

    /// Hold all loads until the returned [`Gate`] is opened.
    pub fn gated(mut self) -> (Self, Gate) {
        let (tx, rx) = watch::channel(false);
        self.gate = Some(rx);
        (self, Gate { tx: Arc::new(tx) })
    }

    /// Replace a registration while the loader is in use.
    pub async fn set_book(
        &self,
        locator: impl Into<String>,
        entries: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>,
    ) {
        let entries = entries.into_iter().map(|(path, data)| (path.into(), data.into())).collect();
        self.books.write().await.insert(locator.into(), Ok(entries));
    }

    /// Number of times [`load`](ArchiveLoader::load) has been called.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveLoader for MockLoader {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load(&self, locator: &Locator) -> Result<Archive> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            // A dropped sender means the test is over; let the load through.
            let _ = gate.wait_for(|open| *open).await;
        }
        let registered = self.books.read().await.get(locator.as_str()).cloned();
        match registered {
            Some(Ok(entries)) => Ok(Archive::new(locator.clone(), entries)),
            Some(Err(message)) => exn::bail!(ErrorKind::Network(message)),
            None => exn::bail!(ErrorKind::NotFound(locator.to_string())),
        }
    }
}
