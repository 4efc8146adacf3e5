use crate::engine::{PaginationInfo, ReaderEngine, ReaderState};
use async_stream::stream;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};

const CAPACITY: usize = 64;

/// A [`ReaderEngine`] driven by hand.
///
/// Events are broadcast to every live subscription; emitting with no
/// subscribers drops the event, as a real engine would.
///
/// ```
/// use folio_session::engine::{ReaderEngine, ReaderState};
/// use folio_session::mock::ChannelEngine;
/// use futures::StreamExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let engine = ChannelEngine::default();
/// let mut states = engine.state();
/// engine.emit_state(ReaderState::Ready);
/// assert_eq!(states.next().await, Some(ReaderState::Ready));
/// engine.destroy();
/// engine.destroyed().await;
/// # }
/// ```
pub struct ChannelEngine {
    state: broadcast::Sender<ReaderState>,
    zooming: broadcast::Sender<bool>,
    pagination: broadcast::Sender<PaginationInfo>,
    destroyed: watch::Sender<bool>,
}
impl Default for ChannelEngine {
    fn default() -> Self {
        Self {
            state: broadcast::channel(CAPACITY).0,
            zooming: broadcast::channel(CAPACITY).0,
            pagination: broadcast::channel(CAPACITY).0,
            destroyed: watch::Sender::new(false),
        }
    }
}
impl ChannelEngine {
    pub fn emit_state(&self, state: ReaderState) {
        let _ = self.state.send(state);
    }

    pub fn emit_zooming(&self, zooming: bool) {
        let _ = self.zooming.send(zooming);
    }

    pub fn emit_pagination(&self, info: PaginationInfo) {
        let _ = self.pagination.send(info);
    }

    pub fn is_destroyed(&self) -> bool {
        *self.destroyed.borrow()
    }

    /// Live subscriptions across all three streams.
    pub fn subscribers(&self) -> usize {
        self.state.receiver_count() + self.zooming.receiver_count() + self.pagination.receiver_count()
    }
}

fn subscribe<T: Clone + Send + 'static>(sender: &broadcast::Sender<T>) -> BoxStream<'static, T> {
    let mut rx = sender.subscribe();
    Box::pin(stream! {
        loop {
            match rx.recv().await {
                Ok(event) => yield event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

impl ReaderEngine for ChannelEngine {
    fn state(&self) -> BoxStream<'static, ReaderState> {
        subscribe(&self.state)
    }

    fn zooming(&self) -> BoxStream<'static, bool> {
        subscribe(&self.zooming)
    }

    fn pagination(&self) -> BoxStream<'static, PaginationInfo> {
        subscribe(&self.pagination)
    }

    fn destroyed(&self) -> BoxFuture<'static, ()> {
        let mut destroyed = self.destroyed.subscribe();
        async move {
            // A dropped engine counts as destroyed.
            let _ = destroyed.wait_for(|destroyed| *destroyed).await;
        }
        .boxed()
    }

    fn destroy(&self) {
        self.destroyed.send_replace(true);
    }
}
