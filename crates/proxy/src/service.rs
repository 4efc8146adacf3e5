use crate::lifecycle::Lifecycle;
use crate::respond::Synthesizer;
use crate::route::{RequestRouter, Route};
use axum::Router;
use axum::extract::{Request, State};
use axum::http::header::HOST;
use axum::http::uri::Authority;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;

/// The virtual content proxy as an HTTP middleware.
///
/// Requests under the prefix that route to a manifest or resource are
/// answered here and never reach the wrapped router. Everything else (other
/// paths, malformed proxy paths, or any request before the lifecycle is
/// active) passes through untouched.
pub struct Proxy {
    router: RequestRouter,
    synthesizer: Synthesizer,
    lifecycle: Lifecycle,
    origin: Option<String>,
}
impl Proxy {
    pub fn new(router: RequestRouter, synthesizer: Synthesizer, lifecycle: Lifecycle) -> Self {
        Self { router, synthesizer, lifecycle, origin: None }
    }

    /// Fix the origin used for manifest `base_url`s instead of deriving it
    /// from each request's `Host` header.
    pub fn with_origin(mut self, origin: Option<String>) -> Self {
        self.origin = origin.map(|origin| origin.trim_end_matches('/').to_string());
        self
    }

    pub fn router(&self) -> &RequestRouter {
        &self.router
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Wrap `app` so the proxy sees every request first.
    pub fn layer<S>(self: Arc<Self>, app: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        app.layer(middleware::from_fn_with_state(self, intercept)).layer(CatchPanicLayer::new())
    }

    fn origin_of(&self, request: &Request) -> String {
        if let Some(origin) = &self.origin {
            return origin.clone();
        }
        let uri = request.uri();
        let scheme = uri.scheme_str().unwrap_or("http");
        // The Host header is client-controlled and ends up in every manifest
        // href, so only a well-formed `host[:port]` is echoed back.
        let authority = uri.authority().cloned().or_else(|| {
            let host = request.headers().get(HOST)?.to_str().ok()?;
            Authority::from_str(host)
                .inspect_err(|err| tracing::debug!(host, error = %err, "Ignoring malformed Host header"))
                .ok()
        });
        match authority {
            Some(authority) => match authority.port() {
                Some(port) => format!("{scheme}://{}:{port}", authority.host()),
                None => format!("{scheme}://{}", authority.host()),
            },
            None => format!("{scheme}://localhost"),
        }
    }
}

async fn intercept(State(proxy): State<Arc<Proxy>>, request: Request, next: Next) -> Response {
    if !proxy.lifecycle.is_active() || !proxy.router.claims(request.uri().path()) {
        return next.run(request).await;
    }
    let origin = proxy.origin_of(&request);
    let route = proxy.router.route(request.uri(), &origin);
    if let Route::NotRouted = route {
        tracing::debug!(path = request.uri().path(), "Malformed proxy path, passing through");
        return next.run(request).await;
    }
    tracing::debug!(method = %request.method(), path = request.uri().path(), "Intercepted request");
    proxy.synthesizer.respond(&route).await.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::StatusCode;
    use folio_archive::MockLoader;
    use folio_cache::ArchiveCache;
    use folio_manifest::{ArchiveGenerator, Manifest};
    use rstest::rstest;
    use tower::ServiceExt;

    fn app(loader: Arc<MockLoader>, lifecycle: Lifecycle) -> Router {
        let cache = Arc::new(ArchiveCache::new(loader));
        let synthesizer = Synthesizer::new(cache, Arc::new(ArchiveGenerator));
        let proxy = Arc::new(Proxy::new(RequestRouter::default(), synthesizer, lifecycle));
        proxy.layer(Router::new().fallback(|| async { "shell" }))
    }

    fn loader() -> Arc<MockLoader> {
        Arc::new(
            MockLoader::default()
                .with_book("books/a.epub", [("text/ch1.xhtml", b"<html/>".to_vec())])
                .with_failure("books/broken.epub", "network error"),
        )
    }

    async fn get_path(app: Router, path: &str) -> (StatusCode, Option<String>, String) {
        get_with_host(app, path, "reader.test").await
    }

    async fn get_with_host(app: Router, path: &str, host: &str) -> (StatusCode, Option<String>, String) {
        let request = axum::http::Request::builder().uri(path).header(HOST, host).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .map(|value| value.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_serves_manifest() {
        let (status, content_type, body) =
            get_path(app(loader(), Lifecycle::active()), "/streamer/books%2Fa.epub/manifest").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        let manifest: Manifest = serde_json::from_str(&body).unwrap();
        assert_eq!(manifest.spine_items[0].href, "http://reader.test/streamer/books%2Fa.epub/text/ch1.xhtml");
    }

    #[tokio::test]
    async fn test_serves_manifest_for_location_suffix() {
        let (status, _, body) =
            get_path(app(loader(), Lifecycle::active()), "/streamer/books%2Fa.epub/web/manifest").await;
        assert_eq!(status, StatusCode::OK);
        let manifest: Manifest = serde_json::from_str(&body).unwrap();
        assert_eq!(manifest.spine_items[0].href, "http://reader.test/streamer/books%2Fa.epub/text/ch1.xhtml");
    }

    #[rstest]
    #[case("reader.test:8080", "http://reader.test:8080/streamer/")]
    #[case("evil.test/<script>", "http://localhost/streamer/")]
    #[case("evil.test\"><img", "http://localhost/streamer/")]
    #[case("user@reader.test", "http://reader.test/streamer/")]
    #[tokio::test]
    async fn test_host_header_origin(#[case] host: &str, #[case] expected: &str) {
        let (status, _, body) =
            get_with_host(app(loader(), Lifecycle::active()), "/streamer/books%2Fa.epub/manifest", host).await;
        assert_eq!(status, StatusCode::OK);
        let manifest: Manifest = serde_json::from_str(&body).unwrap();
        assert!(manifest.spine_items[0].href.starts_with(expected), "{}", manifest.spine_items[0].href);
    }

    #[tokio::test]
    async fn test_serves_resource() {
        let (status, content_type, body) =
            get_path(app(loader(), Lifecycle::active()), "/streamer/books%2Fa.epub/text/ch1.xhtml").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/xhtml+xml"));
        assert_eq!(body, "<html/>");
    }

    #[tokio::test]
    async fn test_failure_is_plain_text() {
        let (status, content_type, body) =
            get_path(app(loader(), Lifecycle::active()), "/streamer/books%2Fbroken.epub/manifest").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(content_type.as_deref(), Some("text/plain; charset=utf-8"));
        assert_eq!(body, "network error");
    }

    #[tokio::test]
    async fn test_other_paths_pass_through() {
        let loader = loader();
        let app = app(loader.clone(), Lifecycle::active());
        for path in ["/", "/index.html", "/streamer", "/streamer/books%2Fa.epub"] {
            let (status, _, body) = get_path(app.clone(), path).await;
            assert_eq!(status, StatusCode::OK, "{path}");
            assert_eq!(body, "shell", "{path}");
        }
        assert_eq!(loader.loads(), 0);
    }

    #[tokio::test]
    async fn test_inactive_until_claimed() {
        let loader = loader();
        let lifecycle = Lifecycle::new(false);
        lifecycle.install();
        let cache = Arc::new(ArchiveCache::new(loader.clone()));
        let synthesizer = Synthesizer::new(cache, Arc::new(ArchiveGenerator));
        let proxy = Arc::new(Proxy::new(RequestRouter::default(), synthesizer, lifecycle));
        let app = proxy.clone().layer(Router::new().fallback(|| async { "shell" }));

        let (_, _, body) = get_path(app.clone(), "/streamer/books%2Fa.epub/manifest").await;
        assert_eq!(body, "shell");
        assert_eq!(loader.loads(), 0);

        assert!(proxy.lifecycle().activate());
        let (status, content_type, _) = get_path(app, "/streamer/books%2Fa.epub/manifest").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(loader.loads(), 1);
    }

    #[tokio::test]
    async fn test_configured_origin() {
        let cache = Arc::new(ArchiveCache::new(loader()));
        let synthesizer = Synthesizer::new(cache, Arc::new(ArchiveGenerator));
        let proxy = Proxy::new(RequestRouter::default(), synthesizer, Lifecycle::active())
            .with_origin(Some("https://books.example/".to_string()));
        let app = Arc::new(proxy).layer(Router::new());
        let (_, _, body) = get_path(app, "/streamer/books%2Fa.epub/manifest").await;
        let manifest: Manifest = serde_json::from_str(&body).unwrap();
        assert!(manifest.spine_items[0].href.starts_with("https://books.example/streamer/"));
    }
}
