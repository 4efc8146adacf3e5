//! Book source locators.
//!
//! A [`Locator`] is the opaque string a reader navigates to. It is only ever
//! interpreted here: either as an `http(s)` URL or as a path relative to the
//! configured library root.

use crate::error::{Error, ErrorKind, Result};
use crate::path::validate as validate_path;
use exn::ResultExt;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use reqwest::Url;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Everything but RFC 3986 unreserved characters, so that an encoded locator
/// is always exactly one path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Where the raw bytes of a book can be obtained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Fetched over HTTP(S).
    Remote(Url),
    /// Read from the library root; always a validated relative path.
    Library(PathBuf),
}

/// Opaque identifier naming where a book's raw container bytes live.
///
/// Equality and hashing use the raw string, so two locators spelling the same
/// URL differently are different cache keys.
#[derive(Clone, Debug)]
pub struct Locator {
    raw: String,
    origin: Origin,
}
impl Locator {
    /// Parse a locator.
    ///
    /// Anything containing `://` must be an `http` or `https` URL; everything
    /// else is a library-relative path.
    ///
    /// # Examples
    ///
    /// ```
    /// use folio_archive::{Locator, Origin};
    ///
    /// let remote = Locator::parse("https://example.com/books/moby-dick.epub").unwrap();
    /// assert!(matches!(remote.origin(), Origin::Remote(_)));
    ///
    /// let local = Locator::parse("comics/issue-1.cbz").unwrap();
    /// assert!(matches!(local.origin(), Origin::Library(_)));
    ///
    /// assert!(Locator::parse("ftp://example.com/book.epub").is_err());
    /// assert!(Locator::parse("../escape.epub").is_err());
    /// ```
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            exn::bail!(ErrorKind::InvalidLocator(raw));
        }
        let origin = if raw.contains("://") {
            let url = Url::parse(&raw).or_raise(|| ErrorKind::InvalidLocator(raw.clone()))?;
            match url.scheme() {
                "http" | "https" => Origin::Remote(url),
                _ => exn::bail!(ErrorKind::InvalidLocator(raw)),
            }
        } else {
            Origin::Library(validate_path(&raw)?)
        };
        Ok(Self { raw, origin })
    }

    /// Decode a locator from a single percent-encoded path segment.
    pub fn decode(segment: &str) -> Result<Self> {
        let decoded = percent_decode_str(segment)
            .decode_utf8()
            .or_raise(|| ErrorKind::InvalidLocator(segment.to_string()))?;
        Self::parse(decoded.into_owned())
    }

    /// Encode this locator as a single URL path segment.
    ///
    /// ```
    /// use folio_archive::Locator;
    ///
    /// let locator = Locator::parse("https://example.com/a b.epub").unwrap();
    /// let segment = locator.encode();
    /// assert!(!segment.contains('/'));
    /// assert_eq!(Locator::decode(&segment).unwrap(), locator);
    /// ```
    pub fn encode(&self) -> String {
        utf8_percent_encode(&self.raw, SEGMENT).to_string()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The last path segment of the locator, used as a display name.
    pub fn filename(&self) -> String {
        let name = match &self.origin {
            Origin::Remote(url) => url.path_segments().and_then(|mut segments| segments.next_back()).map(str::to_string),
            Origin::Library(path) => path.file_name().map(|name| name.to_string_lossy().into_owned()),
        };
        match name {
            Some(name) if !name.is_empty() => name,
            _ => self.raw.clone(),
        }
    }

    /// The library-relative path, if this locator points into the library.
    pub fn library_path(&self) -> Option<&Path> {
        match &self.origin {
            Origin::Library(path) => Some(path),
            Origin::Remote(_) => None,
        }
    }
}
impl PartialEq for Locator {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl Eq for Locator {}
impl Hash for Locator {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}
impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
impl FromStr for Locator {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://example.com/books/moby-dick.epub", "moby-dick.epub")]
    #[case("http://localhost:9000/a/b/c.cbz?token=1", "c.cbz")]
    #[case("comics/issue-1.cbz", "issue-1.cbz")]
    #[case("https://example.com/", "https://example.com/")]
    fn test_filename(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(Locator::parse(raw).unwrap().filename(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("ftp://example.com/book.epub")]
    #[case("file:///etc/passwd")]
    #[case("https://")]
    #[case("../book.epub")]
    fn test_invalid(#[case] raw: &str) {
        let err = Locator::parse(raw).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidLocator(_)));
    }

    #[test]
    fn test_encode_is_single_segment() {
        let locator = Locator::parse("https://example.com/path/to/book%20one.epub?x=1&y=2").unwrap();
        let encoded = locator.encode();
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('?'));
        assert_eq!(Locator::decode(&encoded).unwrap().as_str(), locator.as_str());
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        let err = Locator::decode("%FF%FE").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidLocator(_)));
    }

    #[test]
    fn test_equality_uses_raw_string() {
        let a = Locator::parse("comics/issue-1.cbz").unwrap();
        let b = Locator::parse("comics/./issue-1.cbz").unwrap();
        assert_eq!(a.library_path(), b.library_path());
        assert_ne!(a, b);
    }
}
