//! Moving between books.

use crate::bridge::SessionBridge;
use crate::engine::{LoadOptions, ReaderOptions, SessionHandle};
use crate::error::Result;
use crate::mode::{Mode, SourceHandle, select_mode};
use crate::state::ExternalState;
use crate::store::{CFI_KEY, StoreHandle};
use async_trait::async_trait;
use folio_archive::Locator;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

pub type ViewHandle = Arc<dyn ViewFactory>;

/// Builds a reading engine for a selected mode.
///
/// Only ever called with [`Mode::Paginated`] or [`Mode::Continuous`]; the
/// descriptor inside the mode is the one to render.
#[async_trait]
pub trait ViewFactory: Send + Sync {
    async fn mount(&self, mode: &Mode, load: LoadOptions, options: ReaderOptions) -> Result<SessionHandle>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum Navigation {
    /// A view is mounted and attached in this mode.
    Mounted(Mode),
    /// Nothing is mounted: the descriptor or the view failed.
    Failed { locator: Locator, failure: String },
    /// A later navigation (or [`close`](Navigator::close)) started before this
    /// one finished. Its outcome was discarded.
    Superseded,
}

/// Owns the mounted view and keeps the bridge pointed at it.
pub struct Navigator {
    source: SourceHandle,
    views: ViewHandle,
    store: StoreHandle,
    bridge: SessionBridge,
    generation: AtomicU64,
    mounted: Mutex<Option<SessionHandle>>,
}
impl Navigator {
    pub fn new(source: SourceHandle, views: ViewHandle, state: Arc<ExternalState>, store: StoreHandle) -> Self {
        Self {
            source,
            views,
            bridge: SessionBridge::new(state, store.clone()),
            store,
            generation: AtomicU64::new(0),
            mounted: Mutex::default(),
        }
    }

    pub fn state(&self) -> &Arc<ExternalState> {
        self.bridge.state()
    }

    pub fn bridge(&self) -> &SessionBridge {
        &self.bridge
    }

    /// Open `locator`. `query` is the navigation's query string, which
    /// carries the presentation flags.
    ///
    /// The previous session is torn down before the new descriptor is even
    /// requested.
    pub async fn navigate(&self, locator: &Locator, query: &str) -> Navigation {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.dispose(&mut *self.mounted.lock().await).await;
        tracing::info!(%locator, generation, "Navigating");

        let mode = select_mode(self.source.as_ref(), locator).await;
        if self.is_superseded(generation) {
            return Navigation::Superseded;
        }
        if let Mode::Error { locator, failure } = mode {
            return Navigation::Failed { locator, failure };
        }

        let cfi = match self.store.get(CFI_KEY).await {
            Ok(cfi) => cfi,
            Err(err) => {
                tracing::warn!(error = ?err, "Failed to read reading position; starting from the beginning");
                None
            },
        };
        let handle = match self.views.mount(&mode, LoadOptions::at(cfi), ReaderOptions::from_query(query)).await {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(%locator, error = ?err, "Failed to mount reader");
                return Navigation::Failed { locator: locator.clone(), failure: (*err).to_string() };
            },
        };

        let mut mounted = self.mounted.lock().await;
        if self.is_superseded(generation) {
            handle.destroy();
            return Navigation::Superseded;
        }
        self.state().set_manifest(mode.manifest().cloned());
        *mounted = Some(handle.clone());
        self.bridge.attach(Some(handle)).await;
        tracing::debug!(%locator, mode = mode.name(), "Reader mounted");
        Navigation::Mounted(mode)
    }

    /// Tear the current session down, cancelling any navigation in flight.
    pub async fn close(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.dispose(&mut *self.mounted.lock().await).await;
    }

    fn is_superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    async fn dispose(&self, mounted: &mut Option<SessionHandle>) {
        self.bridge.attach(None).await;
        if let Some(handle) = mounted.take() {
            handle.destroy();
        }
        self.state().reset();
    }
}
