//! Response synthesis for routed requests.

use crate::error::{ErrorKind, Result};
use crate::route::{ManifestRequest, ResourceRequest, Route};
use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_TYPE, HeaderName};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use exn::ResultExt;
use folio_archive::ArchiveHandle;
use folio_cache::ArchiveCache;
use folio_manifest::GeneratorHandle;
use folio_manifest::media::OCTET_STREAM;
use std::sync::Arc;

const JSON: &str = "application/json";
const TEXT: &str = "text/plain; charset=utf-8";

/// A fully formed HTTP response for an intercepted request.
#[derive(Clone, Debug)]
pub struct SynthesizedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}
impl SynthesizedResponse {
    fn new(status: StatusCode, content_type: HeaderValue, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, content_type);
        Self { status, headers, body: body.into() }
    }

    /// A plain-text failure whose body is exactly `message`.
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status, HeaderValue::from_static(TEXT), message.into())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
    }

    /// The body as text, for failures and manifests.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
impl IntoResponse for SynthesizedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Turns routed requests into responses by way of the archive cache and the
/// manifest/resource generator.
///
/// [`respond`](Self::respond) cannot fail: load and generation failures
/// become `500 text/plain` responses carrying the failure's message. Nothing
/// is retried here; the next request for the same book simply goes through
/// the cache again.
pub struct Synthesizer {
    cache: Arc<ArchiveCache>,
    generator: GeneratorHandle,
}
impl Synthesizer {
    pub fn new(cache: Arc<ArchiveCache>, generator: GeneratorHandle) -> Self {
        Self { cache, generator }
    }

    pub fn cache(&self) -> &ArchiveCache {
        &self.cache
    }

    pub async fn respond(&self, route: &Route) -> SynthesizedResponse {
        let result = match route {
            Route::Manifest(request) => self.manifest(request).await,
            Route::Resource(request) => self.resource(request).await,
            Route::NotRouted => return SynthesizedResponse::failure(StatusCode::NOT_FOUND, "not found"),
        };
        result.unwrap_or_else(|err| {
            let target = route.target().map(|target| target.locator.as_str()).unwrap_or_default();
            tracing::warn!(locator = target, error = ?err, "Failed to synthesize response");
            SynthesizedResponse::failure(StatusCode::INTERNAL_SERVER_ERROR, (*err).to_string())
        })
    }

    async fn load(&self, request_locator: &folio_archive::Locator) -> Result<ArchiveHandle> {
        self.cache.load(request_locator).await.map_err(ErrorKind::archive)
    }

    async fn manifest(&self, request: &ManifestRequest) -> Result<SynthesizedResponse> {
        let archive = self.load(&request.target.locator).await?;
        let manifest = self
            .generator
            .manifest(&archive, &request.target.base_url)
            .await
            .map_err(ErrorKind::generation)?;
        let body = serde_json::to_vec(&manifest).or_raise(|| ErrorKind::Serialize)?;
        tracing::debug!(locator = %request.target.locator, spine = manifest.spine_items.len(), "Served manifest");
        Ok(SynthesizedResponse::new(StatusCode::OK, HeaderValue::from_static(JSON), body))
    }

    async fn resource(&self, request: &ResourceRequest) -> Result<SynthesizedResponse> {
        let archive = self.load(&request.target.locator).await?;
        let resource = self.generator.resource(&archive, &request.path).await.map_err(ErrorKind::generation)?;
        let content_type = resource
            .params
            .content_type
            .as_deref()
            .and_then(|value| HeaderValue::from_str(value).ok())
            .unwrap_or(HeaderValue::from_static(OCTET_STREAM));
        let mut response = SynthesizedResponse::new(StatusCode::OK, content_type, resource.body);
        for (name, value) in &resource.params.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(name), Ok(value)) => {
                    response.headers.insert(name, value);
                },
                _ => tracing::warn!(header = name, "Dropping invalid resource header"),
            }
        }
        tracing::trace!(locator = %request.target.locator, path = request.path, bytes = response.body.len(), "Served resource");
        Ok(response)
    }
}
