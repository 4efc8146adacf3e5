//! Media type detection from file extensions.

use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const XHTML: &str = "application/xhtml+xml";
pub const HTML: &str = "text/html";

/// Guess a media type from a path's extension. Unknown extensions are
/// [`OCTET_STREAM`].
pub fn from_path(path: impl AsRef<Path>) -> &'static str {
    let Some(extension) = path.as_ref().extension().and_then(|ext| ext.to_str()) else {
        return OCTET_STREAM;
    };
    match extension.to_ascii_lowercase().as_str() {
        "xhtml" | "xht" => XHTML,
        "html" | "htm" => HTML,
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "txt" => "text/plain",
        "json" => "application/json",
        "xml" => "application/xml",
        "opf" => "application/oebps-package+xml",
        "ncx" => "application/x-dtbncx+xml",
        "smil" => "application/smil+xml",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        _ => OCTET_STREAM,
    }
}

/// Raster and vector images a paginated (comic) reader can show as a page.
pub fn is_image(media_type: &str) -> bool {
    media_type.starts_with("image/")
}

/// Documents a continuous (reflowable) reader lays out.
pub fn is_document(media_type: &str) -> bool {
    matches!(media_type, XHTML | HTML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("chapter1.xhtml", XHTML)]
    #[case("Text/Chapter1.HTML", HTML)]
    #[case("pages/001.JPG", "image/jpeg")]
    #[case("cover.jpeg", "image/jpeg")]
    #[case("fonts/serif.woff2", "font/woff2")]
    #[case("styles/main.css", "text/css")]
    #[case("mimetype", OCTET_STREAM)]
    #[case("archive.unknown", OCTET_STREAM)]
    fn test_from_path(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(from_path(path), expected);
    }

    #[test]
    fn test_classification() {
        assert!(is_image("image/png"));
        assert!(!is_image(XHTML));
        assert!(is_document(XHTML));
        assert!(is_document(HTML));
        assert!(!is_document("text/css"));
    }
}
