//! In-memory book containers.

use crate::Locator;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

/// Shared handle to a loaded archive. The cache owns one clone per locator;
/// every in-flight request holds another.
pub type ArchiveHandle = Arc<Archive>;

/// A fully inflated book container.
///
/// Entries are keyed by their path inside the container (forward slashes, no
/// leading slash) and kept in lexical order so that anything derived from
/// them is deterministic.
#[derive(Debug)]
pub struct Archive {
    locator: Locator,
    filename: String,
    entries: BTreeMap<String, Vec<u8>>,
}
impl Archive {
    /// Build an archive from already-extracted entries.
    ///
    /// # Example
    ///
    /// ```
    /// use folio_archive::{Archive, Locator};
    ///
    /// let locator = Locator::parse("comics/issue-1.cbz").unwrap();
    /// let archive = Archive::new(locator, [("001.jpg", b"...".to_vec()), ("002.jpg", b"...".to_vec())]);
    /// assert_eq!(archive.len(), 2);
    /// assert_eq!(archive.filename(), "issue-1.cbz");
    /// ```
    pub fn new(locator: Locator, entries: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(path, data)| (normalize_entry(&path.into()), data.into()))
            .filter(|(path, _)| !path.is_empty())
            .collect();
        Self { filename: locator.filename(), locator, entries }
    }

    /// Inflate a zip container held in memory.
    ///
    /// This is CPU-bound; async callers should prefer [`inflate`](Self::inflate).
    pub fn from_zip(locator: Locator, bytes: Vec<u8>) -> Result<Self> {
        let invalid = || ErrorKind::InvalidArchive(locator.to_string());
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).or_raise(invalid)?;
        let mut entries = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            let mut file = zip.by_index(index).or_raise(invalid)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
            file.read_to_end(&mut data).or_raise(invalid)?;
            entries.push((name, data));
        }
        tracing::debug!(locator = %locator, entries = entries.len(), "Inflated archive");
        Ok(Self::new(locator, entries))
    }

    /// Inflate a zip container on the blocking thread pool.
    pub async fn inflate(locator: Locator, bytes: Vec<u8>) -> Result<Self> {
        let name = locator.to_string();
        tokio::task::spawn_blocking(move || Self::from_zip(locator, bytes))
            .await
            .or_raise(|| ErrorKind::Io(format!("inflation of {name} did not complete")))?
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Look up an entry by its path inside the container. Leading slashes are
    /// ignored.
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(normalize_entry(path).as_str()).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Entry paths and their sizes, in lexical order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(path, data)| (path.as_str(), data.len()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total inflated size in bytes.
    pub fn size(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

fn normalize_entry(path: &str) -> String {
    path.trim_start_matches('/').replace('\\', "/")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    pub(crate) fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn locator() -> Locator {
        Locator::parse("comics/issue-1.cbz").unwrap()
    }

    #[test]
    fn test_from_zip() {
        let bytes = zip_bytes(&[("002.png", b"two"), ("001.png", b"one"), ("info/ComicInfo.xml", b"<x/>")]);
        let archive = Archive::from_zip(locator(), bytes).unwrap();
        assert_eq!(archive.len(), 3);
        assert_eq!(archive.get("001.png"), Some(&b"one"[..]));
        assert_eq!(archive.get("/info/ComicInfo.xml"), Some(&b"<x/>"[..]));
        let paths: Vec<_> = archive.entries().map(|(path, _)| path).collect();
        assert_eq!(paths, ["001.png", "002.png", "info/ComicInfo.xml"]);
        assert_eq!(archive.size(), 10);
    }

    #[test]
    fn test_from_zip_rejects_garbage() {
        let err = Archive::from_zip(locator(), b"definitely not a zip".to_vec()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidArchive(_)));
    }

    #[tokio::test]
    async fn test_inflate() {
        let bytes = zip_bytes(&[("chapter.xhtml", b"<html/>")]);
        let archive = Archive::inflate(locator(), bytes).await.unwrap();
        assert!(archive.contains("chapter.xhtml"));
        assert_eq!(archive.filename(), "issue-1.cbz");
    }

    #[test]
    fn test_new_normalizes_paths() {
        let archive = Archive::new(locator(), [("/a.png", b"a".to_vec()), ("dir\\b.png", b"b".to_vec()), ("/", Vec::new())]);
        assert_eq!(archive.len(), 2);
        assert!(archive.contains("a.png"));
        assert!(archive.contains("dir/b.png"));
    }
}
