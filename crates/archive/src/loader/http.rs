//! Remote archive loader.

use crate::error::{ErrorKind, Result};
use crate::{Archive, ArchiveLoader, Locator, Origin};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::{Client, StatusCode};

/// Fetches `http`/`https` locators with [`reqwest`] and inflates the body.
#[derive(Clone, Default)]
pub struct HttpLoader {
    client: Client,
}
impl HttpLoader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArchiveLoader for HttpLoader {
    fn name(&self) -> &str {
        "http"
    }

    async fn load(&self, locator: &Locator) -> Result<Archive> {
        let Origin::Remote(url) = locator.origin() else {
            exn::bail!(ErrorKind::UnsupportedOrigin(locator.to_string()));
        };
        tracing::debug!(url = %url, "Fetching remote archive");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .or_raise(|| ErrorKind::Network(format!("failed to fetch {url}")))?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => exn::bail!(ErrorKind::NotFound(locator.to_string())),
            status if !status.is_success() => {
                exn::bail!(ErrorKind::Network(format!("{url} responded with {status}")))
            },
            _ => {},
        }
        let bytes = response
            .bytes()
            .await
            .or_raise(|| ErrorKind::Network(format!("failed to read response body from {url}")))?;
        tracing::debug!(url = %url, bytes = bytes.len(), "Fetched remote archive");
        Archive::inflate(locator.clone(), bytes.to_vec()).await
    }
}
