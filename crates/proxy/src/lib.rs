//! The virtual content proxy.
//!
//! Requests under `/<prefix>/` are claimed by the proxy: the path names a
//! book by locator, and the proxy answers with a generated manifest or with
//! a resource read out of the (cached) archive. Nothing under the prefix
//! exists on disk.
//!
//! ```text
//! /streamer/<encoded locator>[/@<qualifier>]/manifest
//! /streamer/<encoded locator>[/@<qualifier>]/<sub-path>
//! ```

pub mod error;
pub mod lifecycle;
mod respond;
pub mod route;
mod service;

pub use crate::lifecycle::{Lifecycle, Phase};
pub use crate::respond::{SynthesizedResponse, Synthesizer};
pub use crate::route::{ManifestRequest, RequestRouter, ResourceRequest, Route, Target};
pub use crate::service::Proxy;
