//! Final page numbering, computed once before any tool runs.
//!
//! Assembly does not add pages in document order: bitonal pages go in first
//! (the batched encoder must see all of them at once), color pages are then
//! inserted at explicit positions between them, and covers come last. The
//! [`PositionPlan`] fixes every page's final 1-based position up front so the
//! inserts, progress events and title script all agree on one numbering.
//!
//! Body pages of a skipped class take no position; the remaining body pages
//! close ranks around them.

use super::encode::{BITONAL_ENCODERS, COLOR_ENCODERS};
use crate::config::{BindConfig, TargetFormat};
use crate::model::{Book, PageClass};
use serde::{Deserialize, Serialize};

/// Which page classes have a usable encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSelection {
    pub bitonal: bool,
    pub color: bool,
}

impl ClassSelection {
    pub const ALL: Self = Self {
        bitonal: true,
        color: true,
    };

    /// Judge the configured encoder names without touching any tool.
    ///
    /// The PDF target has a fixed encoder recipe and always includes both.
    pub fn from_config(config: &BindConfig) -> Self {
        match config.target {
            TargetFormat::Pdf => Self::ALL,
            TargetFormat::Djvu => Self {
                bitonal: BITONAL_ENCODERS.contains(&config.bitonal_encoder.as_str()),
                color: COLOR_ENCODERS.contains(&config.color_encoder.as_str()),
            },
        }
    }

    pub fn includes(&self, class: PageClass) -> bool {
        match class {
            PageClass::Bitonal => self.bitonal,
            PageClass::Color => self.color,
        }
    }
}

/// What occupies a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Slot {
    FrontCover,
    /// `index` is the page's position in [`Book::pages`].
    Body { index: usize, class: PageClass },
    BackCover,
}

/// One entry of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedPage {
    /// Final 1-based position in the bound document.
    pub position: usize,
    #[serde(flatten)]
    pub slot: Slot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Final position of every page and cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionPlan {
    pages: Vec<PlannedPage>,
    selection: ClassSelection,
}

impl PositionPlan {
    /// Plan `book` with the classes in `selection`; covers are placed only
    /// when `covers` is set and the book has them.
    pub fn compute(book: &Book, selection: ClassSelection, covers: bool) -> Self {
        let mut pages = Vec::with_capacity(book.pages.len() + 2);
        let mut position = 0;

        if covers && book.supplements.cover_front.is_some() {
            position += 1;
            pages.push(PlannedPage {
                position,
                slot: Slot::FrontCover,
                title: Some("cover".to_string()),
            });
        }

        for (index, page) in book.pages.iter().enumerate() {
            let class = page.class();
            if !selection.includes(class) {
                continue;
            }
            position += 1;
            pages.push(PlannedPage {
                position,
                slot: Slot::Body { index, class },
                title: page.display_title().map(str::to_string),
            });
        }

        if covers && book.supplements.cover_back.is_some() {
            position += 1;
            pages.push(PlannedPage {
                position,
                slot: Slot::BackCover,
                title: Some("back cover".to_string()),
            });
        }

        Self { pages, selection }
    }

    pub fn pages(&self) -> &[PlannedPage] {
        &self.pages
    }

    /// Number of pages the bound document will have.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn selection(&self) -> ClassSelection {
        self.selection
    }

    /// Planned body pages of `class`, in book order.
    pub fn body(&self, class: PageClass) -> impl Iterator<Item = &PlannedPage> {
        self.pages
            .iter()
            .filter(move |p| matches!(p.slot, Slot::Body { class: c, .. } if c == class))
    }

    /// Final position of `book.pages[index]`.
    pub fn position_of(&self, index: usize) -> Option<usize> {
        self.pages.iter().find_map(|p| match p.slot {
            Slot::Body { index: i, .. } if i == index => Some(p.position),
            _ => None,
        })
    }

    pub fn front_cover(&self) -> Option<usize> {
        self.find(Slot::FrontCover)
    }

    pub fn back_cover(&self) -> Option<usize> {
        self.find(Slot::BackCover)
    }

    fn find(&self, slot: Slot) -> Option<usize> {
        self.pages.iter().find(|p| p.slot == slot).map(|p| p.position)
    }

    /// Position a body page is inserted at while covers are not yet present.
    pub fn insert_position(&self, page: &PlannedPage) -> usize {
        let shift = usize::from(self.front_cover().is_some());
        page.position - shift
    }

    /// Count of planned body pages.
    pub fn body_len(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| matches!(p.slot, Slot::Body { .. }))
            .count()
    }

    /// `select N; set-page-title "..."` for every titled position.
    pub fn title_directives(&self) -> Vec<String> {
        self.pages
            .iter()
            .filter_map(|p| {
                p.title.as_deref().map(|title| {
                    format!("select {}; set-page-title {}", p.position, quote(title))
                })
            })
            .collect()
    }
}

/// Quote a string for a djvused script.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
