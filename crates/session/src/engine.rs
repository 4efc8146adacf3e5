//! The reading-engine contract and the values it exchanges.

use derive_more::Display;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A live reading engine, shared as `Arc` and owned by the mounted view.
pub type SessionHandle = Arc<dyn ReaderEngine>;

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderState {
    #[default]
    #[display("idle")]
    Idle,
    #[display("ready")]
    Ready,
}

/// Where the reader currently is.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub begin_cfi: Option<String>,
    pub end_cfi: Option<String>,
    pub begin_spine_item_index: Option<usize>,
    pub begin_page_index_in_chapter: Option<usize>,
    pub number_of_total_pages: usize,
}

/// Options a view is mounted with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOptions {
    /// Position to open at, as persisted by the last session.
    pub cfi: Option<String>,
    #[serde(rename = "numberOfAdjacentSpineItemToPreLoad")]
    pub adjacent_spine_items_to_preload: usize,
}
impl LoadOptions {
    pub fn at(cfi: Option<String>) -> Self {
        Self { cfi: cfi.filter(|cfi| !cfi.is_empty()), ..Self::default() }
    }
}
impl Default for LoadOptions {
    fn default() -> Self {
        Self { cfi: None, adjacent_spine_items_to_preload: 1 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageTurnDirection {
    #[default]
    Horizontal,
    Vertical,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageTurnMode {
    #[default]
    Controlled,
    Scrollable,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageTurnAnimation {
    #[default]
    Slide,
}

/// Presentation options taken from the navigation query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderOptions {
    pub page_turn_direction: PageTurnDirection,
    pub page_turn_mode: PageTurnMode,
    pub page_turn_animation: PageTurnAnimation,
}
impl ReaderOptions {
    /// `vertical` turns pages vertically and `free` scrolls freely. Only the
    /// presence of a flag matters, not its value.
    pub fn from_query(query: &str) -> Self {
        let has = |flag: &str| {
            query
                .trim_start_matches('?')
                .split('&')
                .any(|pair| pair.split('=').next() == Some(flag))
        };
        Self {
            page_turn_direction: if has("vertical") { PageTurnDirection::Vertical } else { PageTurnDirection::Horizontal },
            page_turn_mode: if has("free") { PageTurnMode::Scrollable } else { PageTurnMode::Controlled },
            page_turn_animation: PageTurnAnimation::Slide,
        }
    }
}

/// A reading engine as seen from outside: three event streams and a destroy
/// signal.
///
/// Each stream call returns a fresh subscription that ends when the engine
/// goes away. [`destroyed`](Self::destroyed) resolves once the engine has
/// been destroyed (immediately, if it already has).
pub trait ReaderEngine: Send + Sync {
    fn state(&self) -> BoxStream<'static, ReaderState>;
    fn zooming(&self) -> BoxStream<'static, bool>;
    fn pagination(&self) -> BoxStream<'static, PaginationInfo>;
    fn destroyed(&self) -> BoxFuture<'static, ()>;
    fn destroy(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", PageTurnDirection::Horizontal, PageTurnMode::Controlled)]
    #[case("?vertical", PageTurnDirection::Vertical, PageTurnMode::Controlled)]
    #[case("free=1", PageTurnDirection::Horizontal, PageTurnMode::Scrollable)]
    #[case("vertical=false&free", PageTurnDirection::Vertical, PageTurnMode::Scrollable)]
    #[case("verticality&freedom", PageTurnDirection::Horizontal, PageTurnMode::Controlled)]
    fn test_reader_options_from_query(
        #[case] query: &str,
        #[case] direction: PageTurnDirection,
        #[case] mode: PageTurnMode,
    ) {
        let options = ReaderOptions::from_query(query);
        assert_eq!(options.page_turn_direction, direction);
        assert_eq!(options.page_turn_mode, mode);
        assert_eq!(options.page_turn_animation, PageTurnAnimation::Slide);
    }

    #[test]
    fn test_load_options() {
        assert_eq!(LoadOptions::default().adjacent_spine_items_to_preload, 1);
        assert_eq!(LoadOptions::at(Some(String::new())).cfi, None);
        let json = serde_json::to_value(LoadOptions::at(Some("epubcfi(/6/4)".to_string()))).unwrap();
        assert_eq!(json, serde_json::json!({"cfi": "epubcfi(/6/4)", "numberOfAdjacentSpineItemToPreLoad": 1}));
    }

    #[test]
    fn test_pagination_info_json() {
        let info: PaginationInfo = serde_json::from_str(r#"{"beginCfi":"a","numberOfTotalPages":3}"#).unwrap();
        assert_eq!(info.begin_cfi.as_deref(), Some("a"));
        assert_eq!(info.number_of_total_pages, 3);
    }
}
