//! List-query state for the catalog: filters, sorting, paging, and the
//! result page returned by the server.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShelfmarkError};
use crate::models::Book;

/// Number of page links shown around the current page.
pub const VISIBLE_PAGES: u32 = 5;

// ─── Filters ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Available,
    Unavailable,
}

impl FromStr for Availability {
    type Err = ShelfmarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "unavailable" => Ok(Self::Unavailable),
            other => Err(ShelfmarkError::Validation(format!(
                "Unknown availability: {other}"
            ))),
        }
    }
}

/// Named optional predicates. All absent matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    pub author: Option<String>,
    pub published_year: Option<i32>,
    pub availability: Option<Availability>,
    pub search: Option<String>,
}

impl FilterSet {
    /// True when no predicate would constrain the result.
    pub fn is_empty(&self) -> bool {
        self.author().is_none()
            && self.published_year().is_none()
            && self.availability.is_none()
            && self.search().is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn author(&self) -> Option<&str> {
        non_blank(self.author.as_deref())
    }

    pub fn search(&self) -> Option<&str> {
        non_blank(self.search.as_deref())
    }

    /// A year of 0 is the "any year" sentinel used by the form.
    pub fn published_year(&self) -> Option<i32> {
        self.published_year.filter(|y| *y != 0)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

// ─── Sorting ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortColumn {
    Title,
    Author,
    Genre,
    Isbn,
    PublishedOn,
    TotalCopies,
    Availability,
}

impl SortColumn {
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Author => "author",
            Self::Genre => "genre",
            Self::Isbn => "isbn",
            Self::PublishedOn => "publishedOn",
            Self::TotalCopies => "totalCopies",
            Self::Availability => "availability",
        }
    }
}

impl FromStr for SortColumn {
    type Err = ShelfmarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "title" => Ok(Self::Title),
            "author" => Ok(Self::Author),
            "genre" => Ok(Self::Genre),
            "isbn" => Ok(Self::Isbn),
            "publishedon" | "published" | "year" => Ok(Self::PublishedOn),
            "totalcopies" | "copies" => Ok(Self::TotalCopies),
            "availability" => Ok(Self::Availability),
            other => Err(ShelfmarkError::Validation(format!("Unknown sort column: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "Ascending"),
            Self::Descending => write!(f, "Descending"),
        }
    }
}

/// At most one active column. Direction is meaningless while `column` is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub column: Option<SortColumn>,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Same column flips the direction; a different column starts ascending.
    pub fn toggle(&mut self, column: SortColumn) {
        if self.column == Some(column) {
            self.direction = self.direction.flip();
        } else {
            self.column = Some(column);
            self.direction = SortDirection::Ascending;
        }
    }

    pub fn indicator(&self, column: SortColumn) -> &'static str {
        match (self.column == Some(column), self.direction) {
            (false, _) => "↕",
            (true, SortDirection::Ascending) => "↑",
            (true, SortDirection::Descending) => "↓",
        }
    }
}

// ─── Paging ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

impl PageWindow {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            total: 0,
        }
    }

    pub fn total_pages(&self) -> u32 {
        u32::try_from(self.total.div_ceil(u64::from(self.page_size.max(1)))).unwrap_or(u32::MAX)
    }

    /// Pull `page` back into `[1, max(1, total_pages)]`.
    pub fn clamp(&mut self) {
        self.page = self.page.clamp(1, self.total_pages().max(1));
    }

    /// 1-based inclusive bounds of the rows on the current page, for
    /// "Showing X–Y of Z". `None` when the collection is empty.
    pub fn visible_range(&self) -> Option<(u64, u64)> {
        if self.total == 0 {
            return None;
        }
        let start = u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size) + 1;
        if start > self.total {
            return None;
        }
        let end = (start + u64::from(self.page_size) - 1).min(self.total);
        Some((start, end))
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Sliding window of page links of at most `width` entries around `current`,
/// clamped to `[1, total_pages]` and shifted toward the boundary near either end.
pub fn page_numbers(current: u32, total_pages: u32, width: u32) -> Vec<u32> {
    if total_pages == 0 || width == 0 {
        return Vec::new();
    }
    let mut start = current.saturating_sub(width / 2).max(1);
    let end = start.saturating_add(width - 1).min(total_pages);
    if end < start || end - start + 1 < width {
        start = (end + 1).saturating_sub(width).max(1);
    }
    (start..=end).collect()
}

// ─── Wire types ────────────────────────────────────────────

/// Query string for `GET /books`. Absent predicates are omitted entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<Availability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortColumn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<SortDirection>,
    pub page: u32,
    pub page_size: u32,
}

impl BookQuery {
    pub fn new(filters: &FilterSet, sort: &SortSpec, window: &PageWindow) -> Self {
        Self {
            author: filters.author().map(ToOwned::to_owned),
            published_year: filters.published_year(),
            availability: filters.availability,
            search_term: filters.search().map(ToOwned::to_owned),
            sort_by: sort.column,
            sort_direction: sort.column.map(|_| sort.direction),
            page: window.page,
            page_size: window.page_size,
        }
    }
}

/// Records that can be reconciled by identity inside a result page.
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for Book {
    fn id(&self) -> &str {
        &self.id
    }
}

/// One window of a remote collection plus its paging metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage<T> {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

pub type BookPage = ResultPage<Book>;

impl<T: Identified> ResultPage<T> {
    /// A page holding a single freshly created item, used when nothing was loaded yet.
    pub fn single(item: T) -> Self {
        Self {
            page: 1,
            page_size: 1,
            total: 1,
            items: vec![item],
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|i| i.id() == id)
    }

    /// Add a newly created item. Returns `false` (and replaces in place,
    /// leaving `total` alone) when the id is already on the page.
    pub fn insert_created(&mut self, item: T) -> bool {
        if let Some(slot) = self.items.iter_mut().find(|i| i.id() == item.id()) {
            *slot = item;
            return false;
        }
        self.items.push(item);
        self.total += 1;
        true
    }

    /// Replace the item with the same id. Returns `false` when it is not on the page.
    pub fn replace(&mut self, item: T) -> bool {
        match self.items.iter_mut().find(|i| i.id() == item.id()) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    /// Drop the item with `id` and decrement the total.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let removed = self
            .items
            .iter()
            .position(|i| i.id() == id)
            .map(|idx| self.items.remove(idx));
        self.total = self.total.saturating_sub(1);
        removed
    }
}
