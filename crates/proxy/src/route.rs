//! Request routing for the virtual content namespace.
//!
//! Path grammar, relative to the host:
//!
//! ```text
//! /<prefix>/<encoded-locator>[/@<qualifier>][/<location>]/manifest
//! /<prefix>/<encoded-locator>[/@<qualifier>]/<resource-sub-path>
//! ```
//!
//! Anything that does not fit is [`Route::NotRouted`] and belongs to whoever
//! else is serving the request.

use axum::http::Uri;
use folio_archive::Locator;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

pub const DEFAULT_PREFIX: &str = "streamer";
/// Reserved final segment of the manifest endpoint.
pub const MANIFEST: &str = "manifest";

const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');
const SUB_PATH: &AsciiSet = &SEGMENT.remove(b'/');

/// The book a routed request is about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub locator: Locator,
    pub qualifier: Option<String>,
    /// Absolute URL every manifest href is resolved against; ends with `/`.
    pub base_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestRequest {
    pub target: Target,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceRequest {
    pub target: Target,
    /// Percent-decoded path inside the archive.
    pub path: String,
}

/// Routing decision for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Manifest(ManifestRequest),
    Resource(ResourceRequest),
    NotRouted,
}
impl Route {
    pub fn target(&self) -> Option<&Target> {
        match self {
            Self::Manifest(request) => Some(&request.target),
            Self::Resource(request) => Some(&request.target),
            Self::NotRouted => None,
        }
    }

    pub fn is_routed(&self) -> bool {
        !matches!(self, Self::NotRouted)
    }
}

/// Claims requests under a fixed path prefix and parses them into [`Route`]s.
///
/// # Examples
///
/// ```
/// use folio_proxy::{RequestRouter, Route};
///
/// let router = RequestRouter::default();
/// let uri = "/streamer/comics%2Fissue-1.cbz/manifest".parse().unwrap();
/// let Route::Manifest(request) = router.route(&uri, "http://localhost:8080") else {
///     panic!("expected a manifest route");
/// };
/// assert_eq!(request.target.locator.as_str(), "comics/issue-1.cbz");
/// assert_eq!(request.target.base_url, "http://localhost:8080/streamer/comics%2Fissue-1.cbz/");
///
/// let uri = "/index.html".parse().unwrap();
/// assert_eq!(router.route(&uri, "http://localhost:8080"), Route::NotRouted);
/// ```
#[derive(Clone, Debug)]
pub struct RequestRouter {
    prefix: String,
}
impl Default for RequestRouter {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}
impl RequestRouter {
    /// Surrounding slashes in `prefix` are ignored.
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self { prefix: prefix.as_ref().trim_matches('/').to_string() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `path` lies inside the virtual namespace at all.
    pub fn claims(&self, path: &str) -> bool {
        self.strip_namespace(path).is_some()
    }

    /// Route a request. `origin` is the scheme and authority the client used
    /// (`http://host:port`); it only ends up in the target's base URL.
    pub fn route(&self, uri: &Uri, origin: &str) -> Route {
        self.route_path(uri.path(), origin)
    }

    /// [`route`](Self::route) for a bare path, without query or fragment.
    pub fn route_path(&self, path: &str, origin: &str) -> Route {
        let Some(rest) = self.strip_namespace(path) else {
            return Route::NotRouted;
        };
        let Some((encoded, rest)) = rest.split_once('/') else {
            return Route::NotRouted;
        };
        if encoded.is_empty() {
            return Route::NotRouted;
        }
        let locator = match Locator::decode(encoded) {
            Ok(locator) => locator,
            Err(err) => {
                tracing::debug!(path, error = %*err, "Unparsable locator; not routing");
                return Route::NotRouted;
            },
        };
        let (qualifier, rest) = match rest.strip_prefix('@') {
            Some(qualified) => {
                let Some((qualifier, rest)) = qualified.split_once('/') else {
                    return Route::NotRouted;
                };
                match decode(qualifier) {
                    Some(qualifier) if !qualifier.is_empty() => (Some(qualifier), rest),
                    _ => return Route::NotRouted,
                }
            },
            None => (None, rest),
        };
        if rest.is_empty() {
            return Route::NotRouted;
        }
        let base_url = format!("{}{}", origin.trim_end_matches('/'), self.base_path(&locator, qualifier.as_deref()));
        if rest == MANIFEST {
            return Route::Manifest(ManifestRequest { target: Target { locator, qualifier, base_url } });
        }
        // `/manifest` is a reserved suffix. Segments between the locator (or
        // `@qualifier`) and it name the location, which does not move the base.
        if let Some(location) = rest.strip_suffix(MANIFEST).and_then(|location| location.strip_suffix('/')) {
            let Some(location) = decode(location).filter(|location| !location.split('/').any(str::is_empty)) else {
                return Route::NotRouted;
            };
            let qualifier = match qualifier {
                Some(qualifier) => format!("{qualifier}/{location}"),
                None => location,
            };
            let target = Target { locator, qualifier: Some(qualifier), base_url };
            return Route::Manifest(ManifestRequest { target });
        }
        match decode(rest) {
            Some(path) => Route::Resource(ResourceRequest { target: Target { locator, qualifier, base_url }, path }),
            None => Route::NotRouted,
        }
    }

    /// Absolute path of the manifest endpoint for a book.
    ///
    /// ```
    /// use folio_archive::Locator;
    /// use folio_proxy::RequestRouter;
    ///
    /// let locator = Locator::parse("https://example.com/book.epub").unwrap();
    /// assert_eq!(
    ///     RequestRouter::default().manifest_path(&locator, None),
    ///     "/streamer/https%3A%2F%2Fexample.com%2Fbook.epub/manifest",
    /// );
    /// ```
    pub fn manifest_path(&self, locator: &Locator, qualifier: Option<&str>) -> String {
        format!("{}{MANIFEST}", self.base_path(locator, qualifier))
    }

    /// Absolute path of a resource endpoint for a book.
    pub fn resource_path(&self, locator: &Locator, qualifier: Option<&str>, path: &str) -> String {
        let path = utf8_percent_encode(path.trim_start_matches('/'), SUB_PATH);
        format!("{}{path}", self.base_path(locator, qualifier))
    }

    fn base_path(&self, locator: &Locator, qualifier: Option<&str>) -> String {
        match qualifier {
            Some(qualifier) => {
                let qualifier = utf8_percent_encode(qualifier, SEGMENT);
                format!("/{}/{}/@{qualifier}/", self.prefix, locator.encode())
            },
            None => format!("/{}/{}/", self.prefix, locator.encode()),
        }
    }

    fn strip_namespace<'a>(&self, path: &'a str) -> Option<&'a str> {
        path.strip_prefix('/')?.strip_prefix(self.prefix.as_str())?.strip_prefix('/')
    }
}

fn decode(segment: &str) -> Option<String> {
    percent_decode_str(segment).decode_utf8().ok().map(|decoded| decoded.into_owned())
}
