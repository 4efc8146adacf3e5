//! Reading-mode selection.
//!
//! The descriptor is fetched exactly once per navigation and travels inside
//! the selected [`Mode`], so the mounted view never fetches it again.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use folio_archive::Locator;
use folio_manifest::Manifest;
use folio_proxy::{Proxy, RequestRouter, Route};
use std::sync::Arc;

pub type SourceHandle = Arc<dyn DescriptorSource>;

/// Somewhere content descriptors can be fetched from.
#[async_trait]
pub trait DescriptorSource: Send + Sync {
    async fn manifest(&self, locator: &Locator) -> Result<Manifest>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum Mode {
    /// Fixed-layout content, one page at a time.
    Paginated(Manifest),
    /// Reflowable content.
    Continuous(Manifest),
    /// The descriptor could not be obtained. No engine is built.
    Error { locator: Locator, failure: String },
}
impl Mode {
    pub fn manifest(&self) -> Option<&Manifest> {
        match self {
            Self::Paginated(manifest) | Self::Continuous(manifest) => Some(manifest),
            Self::Error { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Paginated(_) => "paginated",
            Self::Continuous(_) => "continuous",
            Self::Error { .. } => "error",
        }
    }
}

/// Fetch the descriptor and decide how to present it.
///
/// Only an explicit `pre-paginated` layout selects [`Mode::Paginated`]; an
/// absent or unrecognised layout reads continuously.
pub async fn select_mode(source: &dyn DescriptorSource, locator: &Locator) -> Mode {
    match source.manifest(locator).await {
        Ok(manifest) => {
            let mode = if manifest.is_pre_paginated() {
                Mode::Paginated(manifest)
            } else {
                Mode::Continuous(manifest)
            };
            tracing::debug!(%locator, mode = mode.name(), "Selected reading mode");
            mode
        },
        Err(err) => {
            tracing::warn!(%locator, error = ?err, "Failed to fetch content descriptor");
            Mode::Error { locator: locator.clone(), failure: (*err).to_string() }
        },
    }
}

fn parse(bytes: &[u8]) -> Result<Manifest> {
    serde_json::from_slice(bytes).or_raise(|| ErrorKind::Descriptor("malformed content descriptor".to_string()))
}

/// Fetches descriptors by calling the in-process proxy directly.
pub struct ProxySource {
    proxy: Arc<Proxy>,
    origin: String,
}
impl ProxySource {
    /// `origin` is what manifest hrefs are resolved against.
    pub fn new(proxy: Arc<Proxy>, origin: impl Into<String>) -> Self {
        Self { proxy, origin: origin.into() }
    }
}

#[async_trait]
impl DescriptorSource for ProxySource {
    async fn manifest(&self, locator: &Locator) -> Result<Manifest> {
        let path = self.proxy.router().manifest_path(locator, None);
        let route = self.proxy.router().route_path(&path, &self.origin);
        if !matches!(route, Route::Manifest(_)) {
            exn::bail!(ErrorKind::Descriptor(format!("locator cannot be routed: {locator}")));
        }
        let response = self.proxy.synthesizer().respond(&route).await;
        if !response.status.is_success() {
            exn::bail!(ErrorKind::Descriptor(response.text()));
        }
        parse(&response.body)
    }
}

/// Fetches descriptors from a running server over HTTP.
pub struct HttpSource {
    client: reqwest::Client,
    base: reqwest::Url,
    router: RequestRouter,
}
impl HttpSource {
    pub fn new(client: reqwest::Client, base: reqwest::Url, router: RequestRouter) -> Self {
        Self { client, base, router }
    }
}

#[async_trait]
impl DescriptorSource for HttpSource {
    async fn manifest(&self, locator: &Locator) -> Result<Manifest> {
        let url = self
            .base
            .join(&self.router.manifest_path(locator, None))
            .or_raise(|| ErrorKind::Descriptor(format!("invalid server URL: {}", self.base)))?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| exn::Exn::from(ErrorKind::Descriptor(e.to_string())))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| exn::Exn::from(ErrorKind::Descriptor(e.to_string())))?;
        if !status.is_success() {
            tracing::debug!(%url, %status, "Descriptor request failed");
            exn::bail!(ErrorKind::Descriptor(String::from_utf8_lossy(&body).into_owned()));
        }
        parse(&body)
    }
}
