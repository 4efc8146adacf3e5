//! Manifest and resource generation.

use crate::error::{ErrorKind, Result};
use crate::manifest::{Item, Manifest, ReadingDirection, RenditionLayout, SpineItem};
use crate::media;
use async_trait::async_trait;
use folio_archive::Archive;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::cmp::Ordering;
use std::sync::Arc;

/// Characters escaped inside a single path segment of a resource href.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/');

/// Shared, type-erased generator.
pub type GeneratorHandle = Arc<dyn Generator + Send + Sync>;

/// Content parameters a resource is served with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceParams {
    pub content_type: Option<String>,
    /// Any extra response headers.
    pub headers: Vec<(String, String)>,
}

/// Bytes of a single archive entry, ready to serve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    pub body: Vec<u8>,
    pub params: ResourceParams,
}

/// Produces manifests and resources from a loaded archive.
///
/// This is the seam where a real book-format library plugs in;
/// [`ArchiveGenerator`] is a format-agnostic fallback.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Describe the book. Every href in the manifest is absolute, under
    /// `base_url` (which ends with a `/`).
    async fn manifest(&self, archive: &Archive, base_url: &str) -> Result<Manifest>;

    /// Serve the entry at `path` (already percent-decoded).
    async fn resource(&self, archive: &Archive, path: &str) -> Result<Resource>;
}

/// Format-agnostic generator working off archive entry names alone.
///
/// - Archives containing HTML/XHTML documents are reflowable; the documents
///   make up the spine.
/// - Archives containing only images are pre-paginated (comics); the images
///   make up the spine.
///
/// Spine order is natural order of entry paths (`page2` before `page10`).
/// Package documents (`.opf`) are not interpreted.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchiveGenerator;

#[async_trait]
impl Generator for ArchiveGenerator {
    async fn manifest(&self, archive: &Archive, base_url: &str) -> Result<Manifest> {
        let entries: Vec<(&str, usize, &'static str)> = archive
            .entries()
            .filter(|(path, _)| !is_hidden(path))
            .map(|(path, size)| (path, size, media::from_path(path)))
            .collect();
        let documents: Vec<_> = entries.iter().filter(|(_, _, media_type)| media::is_document(media_type)).collect();
        let (layout, mut spine) = match documents.is_empty() {
            false => (RenditionLayout::Reflowable, documents),
            true => {
                let images: Vec<_> = entries.iter().filter(|(_, _, media_type)| media::is_image(media_type)).collect();
                if images.is_empty() {
                    exn::bail!(ErrorKind::NoReadableContent(archive.filename().to_string()));
                }
                (RenditionLayout::PrePaginated, images)
            },
        };
        spine.sort_by(|(a, ..), (b, ..)| natural_cmp(a, b));
        if archive.entries().any(|(path, _)| path.ends_with(".opf")) {
            tracing::debug!(filename = archive.filename(), "Package document ignored; spine built from entry names");
        }

        let total: usize = spine.iter().map(|(_, size, _)| size).sum();
        let count = spine.len();
        let spine_items = spine
            .into_iter()
            .map(|(path, size, media_type)| SpineItem {
                id: (*path).to_string(),
                href: href(base_url, path),
                media_type: (*media_type).to_string(),
                rendition_layout: Some(layout),
                progression_weight: weight(*size, total, count),
            })
            .collect();
        let items = entries
            .iter()
            .map(|(path, _, media_type)| Item {
                id: (*path).to_string(),
                href: href(base_url, path),
                media_type: (*media_type).to_string(),
            })
            .collect();
        Ok(Manifest {
            filename: archive.filename().to_string(),
            title: title(archive.filename()),
            reading_direction: ReadingDirection::Ltr,
            rendition_layout: Some(layout),
            spine_items,
            items,
        })
    }

    async fn resource(&self, archive: &Archive, path: &str) -> Result<Resource> {
        let Some(body) = archive.get(path) else {
            exn::bail!(ErrorKind::ResourceNotFound(path.to_string()));
        };
        Ok(Resource {
            body: body.to_vec(),
            params: ResourceParams {
                content_type: Some(media::from_path(path).to_string()),
                headers: Vec::new(),
            },
        })
    }
}

/// Metadata and resource-fork junk that zip tools like to leave behind.
fn is_hidden(path: &str) -> bool {
    path.starts_with("__MACOSX/") || path.split('/').any(|segment| segment.starts_with('.'))
}

fn href(base_url: &str, path: &str) -> String {
    let encoded: Vec<String> = path.split('/').map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string()).collect();
    format!("{base_url}{}", encoded.join("/"))
}

fn weight(size: usize, total: usize, count: usize) -> f64 {
    match total {
        0 => 1.0 / count as f64,
        _ => size as f64 / total as f64,
    }
}

fn title(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => filename.to_string(),
    }
}

/// Compare paths so that runs of digits compare by value.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a.as_bytes(), b.as_bytes());
    loop {
        match (a.first(), b.first()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let a_len = a.iter().take_while(|c| c.is_ascii_digit()).count();
                let b_len = b.iter().take_while(|c| c.is_ascii_digit()).count();
                let (a_num, b_num) = (trim_zeros(&a[..a_len]), trim_zeros(&b[..b_len]));
                let ordering = a_num.len().cmp(&b_num.len()).then_with(|| a_num.cmp(b_num)).then(a_len.cmp(&b_len));
                if ordering != Ordering::Equal {
                    return ordering;
                }
                (a, b) = (&a[a_len..], &b[b_len..]);
            },
            (Some(x), Some(y)) => {
                let ordering = x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase()).then(x.cmp(y));
                if ordering != Ordering::Equal {
                    return ordering;
                }
                (a, b) = (&a[1..], &b[1..]);
            },
        }
    }
}

fn trim_zeros(digits: &[u8]) -> &[u8] {
    let zeros = digits.iter().take_while(|c| **c == b'0').count();
    &digits[zeros..]
}
