//! Reading sessions.
//!
//! A [`Navigator`] turns a locator into a mounted reading engine: it asks a
//! [`DescriptorSource`] for the book's manifest, picks a [`Mode`] from its
//! layout, has a [`ViewFactory`] build the engine and hands the engine to the
//! [`SessionBridge`], which mirrors the engine's events into
//! [`ExternalState`] and the position store.

pub mod bridge;
pub mod engine;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod mode;
pub mod navigator;
pub mod state;
pub mod store;

pub use crate::bridge::SessionBridge;
pub use crate::engine::{LoadOptions, PaginationInfo, ReaderEngine, ReaderOptions, ReaderState, SessionHandle};
pub use crate::mode::{DescriptorSource, HttpSource, Mode, ProxySource, SourceHandle, select_mode};
pub use crate::navigator::{Navigation, Navigator, ViewFactory, ViewHandle};
pub use crate::state::ExternalState;
pub use crate::store::{CFI_KEY, FileStore, MemoryStore, PositionStore, StoreHandle};
