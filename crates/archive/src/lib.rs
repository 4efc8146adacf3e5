//! Book locators, in-memory archives and the loaders that produce them.
//!
//! Nothing in here knows about book formats. An [`Archive`] is just an
//! ordered set of named byte blobs inflated from a zip container; turning it
//! into something a reading engine understands is the manifest generator's
//! job.

mod archive;
pub mod error;
pub mod loader;
mod locator;
mod path;

pub use crate::archive::{Archive, ArchiveHandle};
#[cfg(feature = "mock")]
pub use crate::loader::{Gate, MockLoader};
pub use crate::loader::{ArchiveLoader, HttpLoader, LoaderHandle, LocalLoader, OriginLoader};
pub use crate::locator::{Locator, Origin};
pub use crate::path::validate as validate_path;
