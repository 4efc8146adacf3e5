use crate::engine::{PaginationInfo, ReaderState};
use folio_manifest::Manifest;
use tokio::sync::watch;

/// Observable mirrors of the active session, for whatever renders the shell
/// around the reader.
///
/// Every field is last-write-wins. The bridge is the only writer of
/// `reader_state`, `zooming` and `pagination`; the navigator is the only
/// writer of `manifest`.
#[derive(Debug)]
pub struct ExternalState {
    reader_state: watch::Sender<ReaderState>,
    zooming: watch::Sender<bool>,
    pagination: watch::Sender<Option<PaginationInfo>>,
    manifest: watch::Sender<Option<Manifest>>,
}
impl Default for ExternalState {
    fn default() -> Self {
        Self {
            reader_state: watch::Sender::new(ReaderState::Idle),
            zooming: watch::Sender::new(false),
            pagination: watch::Sender::new(None),
            manifest: watch::Sender::new(None),
        }
    }
}
impl ExternalState {
    pub fn reader_state(&self) -> ReaderState {
        *self.reader_state.borrow()
    }

    pub fn zooming(&self) -> bool {
        *self.zooming.borrow()
    }

    pub fn pagination(&self) -> Option<PaginationInfo> {
        self.pagination.borrow().clone()
    }

    pub fn manifest(&self) -> Option<Manifest> {
        self.manifest.borrow().clone()
    }

    pub fn set_reader_state(&self, state: ReaderState) {
        self.reader_state.send_replace(state);
    }

    pub fn set_zooming(&self, zooming: bool) {
        self.zooming.send_replace(zooming);
    }

    pub fn set_pagination(&self, pagination: Option<PaginationInfo>) {
        self.pagination.send_replace(pagination);
    }

    pub fn set_manifest(&self, manifest: Option<Manifest>) {
        self.manifest.send_replace(manifest);
    }

    pub fn subscribe_reader_state(&self) -> watch::Receiver<ReaderState> {
        self.reader_state.subscribe()
    }

    pub fn subscribe_zooming(&self) -> watch::Receiver<bool> {
        self.zooming.subscribe()
    }

    pub fn subscribe_pagination(&self) -> watch::Receiver<Option<PaginationInfo>> {
        self.pagination.subscribe()
    }

    pub fn subscribe_manifest(&self) -> watch::Receiver<Option<Manifest>> {
        self.manifest.subscribe()
    }

    /// Back to what an empty shell shows. Called between sessions.
    pub fn reset(&self) {
        self.set_reader_state(ReaderState::Idle);
        self.set_zooming(false);
        self.set_pagination(None);
        self.set_manifest(None);
    }
}
