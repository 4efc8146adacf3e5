//! Content descriptors and their generation from book archives.
//!
//! The [`Manifest`] is what a reading engine fetches first; its
//! `renditionLayout` decides between continuous and paginated presentation.
//! [`Generator`] is the collaborator contract for producing manifests and
//! resources out of an [`Archive`](folio_archive::Archive).

pub mod error;
mod generator;
mod manifest;
pub mod media;

pub use crate::generator::{ArchiveGenerator, Generator, GeneratorHandle, Resource, ResourceParams};
pub use crate::manifest::{Item, Manifest, ReadingDirection, RenditionLayout, SpineItem};
