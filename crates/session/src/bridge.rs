//! Republishes the active engine's events into [`ExternalState`].

use crate::engine::{PaginationInfo, ReaderEngine, ReaderState, SessionHandle};
use crate::state::ExternalState;
use crate::store::{CFI_KEY, StoreHandle};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Shared with every forwarder task.
struct Sink {
    state: Arc<ExternalState>,
    store: StoreHandle,
    /// Bumped by every handle change. A forwarder only writes while holding
    /// this for reading and only if it still matches the generation it was
    /// spawned for.
    generation: RwLock<u64>,
}

#[derive(Default)]
struct Attached {
    handle: Option<Weak<dyn ReaderEngine>>,
    tasks: Vec<JoinHandle<()>>,
}
impl Attached {
    fn is(&self, handle: Option<&SessionHandle>) -> bool {
        match (&self.handle, handle) {
            (None, None) => true,
            (Some(current), Some(handle)) => std::ptr::addr_eq(current.as_ptr(), Arc::as_ptr(handle)),
            _ => false,
        }
    }

    fn abort(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.handle = None;
    }
}

/// Binds at most one live [`ReaderEngine`] to the external state.
///
/// The bridge never keeps its engine alive: it holds a [`Weak`] reference and
/// subscriptions that end with the engine. Changing the handle tears every
/// subscription of the previous one down before anything else happens, and
/// once [`attach`](Self::attach) returns, nothing from the previous handle
/// will be written, even if it keeps emitting.
pub struct SessionBridge {
    sink: Arc<Sink>,
    attached: Mutex<Attached>,
}
impl SessionBridge {
    pub fn new(state: Arc<ExternalState>, store: StoreHandle) -> Self {
        let sink = Sink { state, store, generation: RwLock::new(0) };
        Self { sink: Arc::new(sink), attached: Mutex::default() }
    }

    pub fn state(&self) -> &Arc<ExternalState> {
        &self.sink.state
    }

    /// The attached engine, if one is attached and still alive.
    pub async fn current(&self) -> Option<SessionHandle> {
        self.attached.lock().await.handle.as_ref().and_then(Weak::upgrade)
    }

    /// Make `handle` the active session. `None` detaches.
    ///
    /// Re-attaching the current handle (or detaching when nothing is
    /// attached) does nothing.
    pub async fn attach(&self, handle: Option<SessionHandle>) {
        let mut attached = self.attached.lock().await;
        if attached.is(handle.as_ref()) {
            return;
        }
        let generation = {
            // Waits for any in-progress write; none of the old forwarders
            // can write after this.
            let mut generation = self.sink.generation.write().await;
            *generation += 1;
            *generation
        };
        attached.abort();
        let Some(handle) = handle else {
            tracing::debug!(generation, "Reader session detached");
            return;
        };
        attached.handle = Some(Arc::downgrade(&handle));
        attached.tasks = vec![
            self.spawn(generation, bounded(&*handle, handle.state()), Forward::State),
            self.spawn(generation, bounded(&*handle, handle.zooming()), Forward::Zooming),
            self.spawn(generation, bounded(&*handle, handle.pagination()), Forward::Pagination),
        ];
        tracing::debug!(generation, "Reader session attached");
    }

    fn spawn<T, S>(&self, generation: u64, events: S, forward: fn(T) -> Forward) -> JoinHandle<()>
    where
        T: Send + 'static,
        S: Stream<Item = T> + Send + 'static,
    {
        let sink = self.sink.clone();
        tokio::spawn(async move {
            let mut events = std::pin::pin!(events);
            while let Some(event) = events.next().await {
                if !sink.write(generation, forward(event)).await {
                    break;
                }
            }
        })
    }
}
impl Drop for SessionBridge {
    fn drop(&mut self) {
        self.attached.get_mut().abort();
    }
}

/// Ends `events` once `engine` is destroyed.
fn bounded<T: Send + 'static>(engine: &dyn ReaderEngine, events: BoxStream<'static, T>) -> BoxStream<'static, T> {
    events.take_until(engine.destroyed()).boxed()
}

enum Forward {
    State(ReaderState),
    Zooming(bool),
    Pagination(PaginationInfo),
}

impl Sink {
    /// Returns `false` once `generation` has been superseded.
    async fn write(&self, generation: u64, event: Forward) -> bool {
        let current = self.generation.read().await;
        if *current != generation {
            return false;
        }
        match event {
            Forward::State(state) => {
                tracing::info!(%state, "Reader state changed");
                self.state.set_reader_state(state);
            },
            Forward::Zooming(zooming) => self.state.set_zooming(zooming),
            Forward::Pagination(info) => {
                let cfi = info.begin_cfi.clone().unwrap_or_default();
                self.state.set_pagination(Some(info));
                if let Err(err) = self.store.set(CFI_KEY, &cfi).await {
                    tracing::warn!(error = ?err, "Failed to persist reading position");
                }
            },
        }
        true
    }
}
