//! Library path validation.
//!
//! Library locators name a file relative to the configured library root. They
//! must never resolve outside of it.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates and normalizes a library-relative path.
///
/// `.` components and repeated separators are dropped, `..` is resolved
/// against the components seen so far and rejected if it would leave the
/// library root. Absolute paths are treated as relative to the root. Null
/// bytes and empty results are rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use folio_archive::validate_path;
/// assert_eq!(validate_path("comics/./issue-1.cbz").unwrap(), Path::new("comics/issue-1.cbz"));
/// assert!(validate_path("../outside.epub").is_err());
/// assert!(validate_path("").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || ErrorKind::InvalidLocator(path.display().to_string());
    let mut inside_root: Vec<&OsStr> = Vec::new();
    for component in path.components() {
        match component {
            // A locator is always joined onto the library root, so a leading
            // `/` carries no meaning. A drive or UNC prefix names another root.
            Component::RootDir | Component::CurDir => continue,
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if inside_root.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
            // The OS would cut the name short at a NUL and open some other file.
            Component::Normal(name) if name.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(name) => inside_root.push(name),
        }
    }
    if inside_root.is_empty() {
        // Nothing left but the library root itself.
        exn::bail!(invalid());
    }
    Ok(inside_root.into_iter().collect())
}
