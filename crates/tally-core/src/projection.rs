//! Pure projection of the collection into the visible page.
//!
//! Pipeline: status filter, then search, then sort, then page slice. Nothing
//! here touches shared state, so the same inputs always give the same output.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use icu_collator::options::{CollatorOptions, Strength};
use icu_collator::{Collator, CollatorBorrowed};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::model::Item;

/// Completion-state filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusFilter {
    /// Every item.
    #[default]
    All,
    /// Items not yet completed.
    Active,
    /// Completed items.
    Completed,
}

impl StatusFilter {
    /// Wire and CLI label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    const fn admits(self, item: &Item) -> bool {
        match self {
            Self::All => true,
            Self::Active => !item.completed,
            Self::Completed => item.completed,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = UnknownValue;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(UnknownValue::new("status", other)),
        }
    }
}

/// Ordering applied after filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortMode {
    /// Incomplete items first, otherwise collection order.
    #[default]
    ActiveFirst,
    /// Completed items first, otherwise collection order.
    CompletedFirst,
    /// Title ascending.
    Az,
    /// Title descending.
    Za,
}

impl SortMode {
    /// Wire and CLI label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ActiveFirst => "activeFirst",
            Self::CompletedFirst => "completedFirst",
            Self::Az => "az",
            Self::Za => "za",
        }
    }

    fn sort(self, items: &mut [&Item]) {
        match self {
            Self::ActiveFirst => items.sort_by_key(|item| item.completed),
            Self::CompletedFirst => items.sort_by_key(|item| !item.completed),
            Self::Az => items.sort_by(|left, right| compare_titles(left, right)),
            Self::Za => items.sort_by(|left, right| compare_titles(right, left)),
        }
    }
}

impl FromStr for SortMode {
    type Err = UnknownValue;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "activeFirst" => Ok(Self::ActiveFirst),
            "completedFirst" => Ok(Self::CompletedFirst),
            "az" => Ok(Self::Az),
            "za" => Ok(Self::Za),
            other => Err(UnknownValue::new("sort", other)),
        }
    }
}

/// Root-locale collator at secondary strength: accents order, case does not.
static TITLE_COLLATOR: Lazy<Option<CollatorBorrowed<'static>>> = Lazy::new(|| {
    let mut options = CollatorOptions::default();
    options.strength = Some(Strength::Secondary);
    Collator::try_new(Default::default(), options).ok()
});

/// Locale-aware, case-insensitive title order with a byte-order tie-break so
/// the result is total and deterministic.
fn compare_titles(left: &Item, right: &Item) -> Ordering {
    let collated = TITLE_COLLATOR.as_ref().map_or_else(
        || left.title.to_lowercase().cmp(&right.title.to_lowercase()),
        |collator| collator.compare(&left.title, &right.title),
    );
    collated.then_with(|| left.title.cmp(&right.title))
}

/// Allowed page sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum PageSize {
    /// Ten rows.
    #[default]
    Ten,
    /// Twenty rows.
    Twenty,
    /// Fifty rows.
    Fifty,
}

impl PageSize {
    /// Rows per page.
    #[must_use]
    pub const fn get(self) -> usize {
        match self {
            Self::Ten => 10,
            Self::Twenty => 20,
            Self::Fifty => 50,
        }
    }
}

impl TryFrom<usize> for PageSize {
    type Error = UnknownValue;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(Self::Ten),
            20 => Ok(Self::Twenty),
            50 => Ok(Self::Fifty),
            other => Err(UnknownValue::new("page size", &other.to_string())),
        }
    }
}

impl From<PageSize> for usize {
    fn from(size: PageSize) -> Self {
        size.get()
    }
}

impl FromStr for PageSize {
    type Err = UnknownValue;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.parse::<usize>()
            .map_err(|_| UnknownValue::new("page size", raw))
            .and_then(Self::try_from)
    }
}

/// A value outside an enumerated parameter's domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValue {
    field: &'static str,
    value: String,
}

impl UnknownValue {
    fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

impl Display for UnknownValue {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "unknown {} '{}'", self.field, self.value)
    }
}

impl std::error::Error for UnknownValue {}

/// Inputs to [`project`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewParams {
    /// Committed search text.
    pub search: String,
    /// Status filter.
    pub status: StatusFilter,
    /// Sort mode.
    pub sort: SortMode,
    /// One-based page number.
    pub page: usize,
    /// Rows per page.
    pub page_size: PageSize,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: StatusFilter::All,
            sort: SortMode::ActiveFirst,
            page: 1,
            page_size: PageSize::Ten,
        }
    }
}

/// Why the visible page is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyState {
    /// The collection itself is empty; prompt to create.
    NoItems,
    /// Filters exclude everything; prompt to reset them.
    NoMatches,
}

/// Result of [`project`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Projection {
    /// Items on the current page, in display order.
    pub items: Vec<Item>,
    /// Items passing filter and search, across all pages.
    pub total_matching: usize,
    /// Page count, never below one.
    pub total_pages: usize,
    /// Page actually shown after clamping.
    pub page: usize,
    /// Set when `items` is empty.
    pub empty: Option<EmptyState>,
}

/// Project `collection` through `params`.
#[must_use]
pub fn project(collection: &[Item], params: &ViewParams) -> Projection {
    let needle = params.search.trim().to_lowercase();
    let mut matching: Vec<&Item> = collection
        .iter()
        .filter(|item| params.status.admits(item))
        .filter(|item| needle.is_empty() || item.title.to_lowercase().contains(&needle))
        .collect();
    params.sort.sort(&mut matching);

    let size = params.page_size.get();
    let total_matching = matching.len();
    let total_pages = total_matching.div_ceil(size).max(1);
    let page = params.page.clamp(1, total_pages);

    let items: Vec<Item> = matching
        .into_iter()
        .skip((page - 1) * size)
        .take(size)
        .cloned()
        .collect();

    let empty = if collection.is_empty() {
        Some(EmptyState::NoItems)
    } else if items.is_empty() {
        Some(EmptyState::NoMatches)
    } else {
        None
    };

    Projection {
        items,
        total_matching,
        total_pages,
        page,
        empty,
    }
}
