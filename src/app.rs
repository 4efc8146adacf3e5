//! Wiring configuration into services.

use crate::error::{ErrorKind, Result};
use axum::Router;
use folio_archive::{HttpLoader, LocalLoader, OriginLoader};
use folio_cache::ArchiveCache;
use folio_config::Config;
use folio_manifest::ArchiveGenerator;
use folio_proxy::{Lifecycle, Proxy, RequestRouter, Synthesizer};
use folio_session::{FileStore, MemoryStore, StoreHandle};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub fn loader(config: &Config) -> Result<OriginLoader> {
    let mut loader = OriginLoader::new();
    if config.library.remote {
        loader = loader.with_remote(HttpLoader::default());
    }
    if let Some(root) = &config.library.root {
        let library = LocalLoader::new(root).map_err(|err| err.raise(ErrorKind::Loader))?;
        loader = loader.with_library(library);
    }
    Ok(loader)
}

pub fn proxy(config: &Config) -> Result<Arc<Proxy>> {
    let cache = ArchiveCache::new(Arc::new(loader(config)?)).with_capacity(config.cache.capacity);
    let synthesizer = Synthesizer::new(Arc::new(cache), Arc::new(ArchiveGenerator));
    let proxy = Proxy::new(
        RequestRouter::new(&config.proxy.prefix),
        synthesizer,
        Lifecycle::new(config.proxy.skip_waiting),
    )
    .with_origin(config.server.public_origin.clone());
    Ok(Arc::new(proxy))
}

/// The full HTTP stack: proxy in front of the static shell, traced.
pub fn router(config: &Config, proxy: Arc<Proxy>) -> Router {
    let shell = match &config.server.static_dir {
        Some(dir) => Router::new().fallback_service(ServeDir::new(dir)),
        None => Router::new(),
    };
    proxy.layer(shell).layer(TraceLayer::new_for_http())
}

/// The origin manifests are built against when there is no request to take
/// it from.
pub fn origin(config: &Config) -> String {
    config
        .server
        .public_origin
        .clone()
        .unwrap_or_else(|| format!("http://{}", config.server.bind))
}

pub async fn store(config: &Config) -> Result<StoreHandle> {
    match config.store_path() {
        Some(path) => Ok(Arc::new(FileStore::open(path).await.map_err(|err| err.raise(ErrorKind::Store))?)),
        None => {
            tracing::warn!("No data directory available; reading positions will not be persisted");
            Ok(Arc::new(MemoryStore::default()))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_router_without_static_dir() {
        let config = Config::default();
        let proxy = proxy(&config).unwrap();
        proxy.lifecycle().install();
        let app = router(&config, proxy);

        let request = Request::builder().uri("/streamer/..%2Fescape.cbz/manifest").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let request = Request::builder().uri("/streamer/missing.cbz/manifest").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"no loader configured for locator: missing.cbz");
    }

    #[test]
    fn test_origin() {
        let mut config = Config::default();
        assert_eq!(origin(&config), "http://127.0.0.1:8080");
        config.server.public_origin = Some("https://books.example".to_string());
        assert_eq!(origin(&config), "https://books.example");
    }
}
