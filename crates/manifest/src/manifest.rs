//! The content descriptor handed to reading engines.
//!
//! Serialized as camelCase JSON. Deserialization is deliberately permissive:
//! a descriptor without a recognisable `renditionLayout` is still a valid
//! descriptor, it just reads as reflowable.

use serde::{Deserialize, Serialize};

/// How a book (or a single spine item) is laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenditionLayout {
    /// Text flows to fit the viewport.
    Reflowable,
    /// Fixed pages (comics, picture books, fixed-layout EPUB).
    PrePaginated,
    /// Any value this crate does not know about.
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingDirection {
    #[default]
    Ltr,
    Rtl,
}

/// An entry of the reading order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpineItem {
    pub id: String,
    /// Absolute URL of the resource, under the manifest's base URL.
    pub href: String,
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendition_layout: Option<RenditionLayout>,
    /// Share of the whole book this item represents, in `0.0..=1.0`.
    #[serde(default)]
    pub progression_weight: f64,
}

/// Any resource of the book, in or out of the spine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub href: String,
    pub media_type: String,
}

/// Structural description of a book (a.k.a. content descriptor).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub filename: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub reading_direction: ReadingDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendition_layout: Option<RenditionLayout>,
    #[serde(default)]
    pub spine_items: Vec<SpineItem>,
    #[serde(default)]
    pub items: Vec<Item>,
}
impl Manifest {
    /// `true` only for an explicit `pre-paginated` layout. Missing and
    /// unknown layouts fall back to reflowable.
    pub fn is_pre_paginated(&self) -> bool {
        matches!(self.rendition_layout, Some(RenditionLayout::PrePaginated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"filename":"a.cbz","renditionLayout":"pre-paginated"}"#, Some(RenditionLayout::PrePaginated), true)]
    #[case(r#"{"filename":"a.epub","renditionLayout":"reflowable"}"#, Some(RenditionLayout::Reflowable), false)]
    #[case(r#"{"filename":"a.epub","renditionLayout":"scrolled-doc"}"#, Some(RenditionLayout::Unknown), false)]
    #[case(r#"{"filename":"a.epub"}"#, None, false)]
    fn test_layout_deserialize(
        #[case] json: &str,
        #[case] layout: Option<RenditionLayout>,
        #[case] pre_paginated: bool,
    ) {
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.rendition_layout, layout);
        assert_eq!(manifest.is_pre_paginated(), pre_paginated);
        assert_eq!(manifest.reading_direction, ReadingDirection::Ltr);
        assert!(manifest.spine_items.is_empty());
    }

    #[test]
    fn test_serialize_camel_case() {
        let manifest = Manifest {
            filename: "issue-1.cbz".to_string(),
            title: "issue-1".to_string(),
            reading_direction: ReadingDirection::Rtl,
            rendition_layout: Some(RenditionLayout::PrePaginated),
            spine_items: vec![SpineItem {
                id: "001.png".to_string(),
                href: "http://localhost/streamer/issue-1.cbz/001.png".to_string(),
                media_type: "image/png".to_string(),
                rendition_layout: None,
                progression_weight: 1.0,
            }],
            items: Vec::new(),
        };
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["renditionLayout"], "pre-paginated");
        assert_eq!(value["readingDirection"], "rtl");
        assert_eq!(value["spineItems"][0]["mediaType"], "image/png");
        assert_eq!(value["spineItems"][0]["progressionWeight"], 1.0);
        assert!(value["spineItems"][0].get("renditionLayout").is_none());
    }
}
