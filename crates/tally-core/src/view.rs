//! View parameters plus the search debounce that feeds them.
//!
//! Transitions are pure and take the current instant explicitly, so callers
//! decide where time comes from. Reactions run in causal order: a debounced
//! search commit, then the page reset it implies, then the clamp against the
//! freshly projected page count.

use std::time::{Duration, Instant};

use crate::model::Item;
use crate::projection::{PageSize, Projection, SortMode, StatusFilter, ViewParams, project};

/// Default quiet period before typed search text takes effect.
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(200);

/// Trailing-edge debounce of a single text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    /// Debounce with the given quiet period.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Restart the quiet period at `now`.
    pub fn bump(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Forget any scheduled commit.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Consume the scheduled commit if its quiet period has elapsed.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// When the scheduled commit becomes due.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Live view state: committed parameters, raw search input and its debounce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    params: ViewParams,
    search_input: String,
    debounce: Debounce,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(ViewParams::default(), DEFAULT_SEARCH_DEBOUNCE)
    }
}

impl ViewState {
    /// State seeded from restored parameters.
    #[must_use]
    pub fn new(params: ViewParams, debounce: Duration) -> Self {
        Self {
            search_input: params.search.clone(),
            params,
            debounce: Debounce::new(debounce),
        }
    }

    /// Committed parameters.
    #[must_use]
    pub const fn params(&self) -> &ViewParams {
        &self.params
    }

    /// Search text as typed, possibly not yet committed.
    #[must_use]
    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    /// Whether typed search text is waiting on the debounce.
    #[must_use]
    pub const fn search_pending(&self) -> bool {
        self.debounce.deadline().is_some()
    }

    /// When the pending search commits, if one is scheduled.
    #[must_use]
    pub const fn search_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Record typed search text; it takes effect after the quiet period.
    pub fn input_search(&mut self, text: impl Into<String>, now: Instant) {
        self.search_input = text.into();
        if self.search_input == self.params.search {
            self.debounce.cancel();
        } else {
            self.debounce.bump(now);
        }
    }

    /// Commit the typed search if its quiet period elapsed. Returns whether
    /// the committed parameters changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.debounce.ready(now) {
            return false;
        }
        self.commit_search()
    }

    /// Commit the typed search right away.
    pub fn flush_search(&mut self) -> bool {
        self.debounce.cancel();
        self.commit_search()
    }

    fn commit_search(&mut self) -> bool {
        if self.params.search == self.search_input {
            return false;
        }
        self.params.search.clone_from(&self.search_input);
        self.params.page = 1;
        true
    }

    /// Change the status filter.
    pub fn set_status(&mut self, status: StatusFilter) -> bool {
        if self.params.status == status {
            return false;
        }
        self.params.status = status;
        self.params.page = 1;
        true
    }

    /// Change the sort mode.
    pub fn set_sort(&mut self, sort: SortMode) -> bool {
        if self.params.sort == sort {
            return false;
        }
        self.params.sort = sort;
        self.params.page = 1;
        true
    }

    /// Change the page size.
    pub fn set_page_size(&mut self, page_size: PageSize) -> bool {
        if self.params.page_size == page_size {
            return false;
        }
        self.params.page_size = page_size;
        self.params.page = 1;
        true
    }

    /// Jump to a page; clamped on the next [`ViewState::apply`].
    pub fn set_page(&mut self, page: usize) {
        self.params.page = page.max(1);
    }

    /// Clear search and status filter, keeping sort and page size.
    pub fn reset_filters(&mut self) {
        self.debounce.cancel();
        self.search_input.clear();
        self.params.search.clear();
        self.params.status = StatusFilter::All;
        self.params.page = 1;
    }

    /// Clamp the page into `[1, total_pages]`.
    pub fn clamp(&mut self, total_pages: usize) {
        self.params.page = self.params.page.clamp(1, total_pages.max(1));
    }

    /// Project `collection` and keep the clamped page.
    pub fn apply(&mut self, collection: &[Item]) -> Projection {
        let projection = project(collection, &self.params);
        self.clamp(projection.total_pages);
        projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(200);

    #[test]
    fn search_commits_only_after_quiet_period() {
        let start = Instant::now();
        let mut view = ViewState::default();
        view.set_page(3);

        view.input_search("mi", start);
        view.input_search("milk", start + Duration::from_millis(150));
        assert!(!view.tick(start + Duration::from_millis(300)));
        assert_eq!(view.params().search, "");
        assert_eq!(view.params().page, 3);

        assert!(view.tick(start + Duration::from_millis(350)));
        assert_eq!(view.params().search, "milk");
        assert_eq!(view.params().page, 1);
        assert!(!view.search_pending());
    }

    #[test]
    fn retyping_committed_text_cancels_debounce() {
        let start = Instant::now();
        let mut view = ViewState::default();
        view.input_search("a", start);
        view.input_search("", start + Duration::from_millis(10));
        assert!(!view.search_pending());
        assert!(!view.tick(start + QUIET * 2));
    }

    #[test]
    fn filter_changes_reset_page_only_when_changed() {
        let mut view = ViewState::default();
        view.set_page(4);
        assert!(!view.set_status(StatusFilter::All));
        assert_eq!(view.params().page, 4);
        assert!(view.set_sort(SortMode::Za));
        assert_eq!(view.params().page, 1);
        view.set_page(2);
        assert!(view.set_page_size(PageSize::Fifty));
        assert_eq!(view.params().page, 1);
    }

    #[test]
    fn apply_clamps_page() {
        let items: Vec<Item> = (1..=12)
            .map(|n| Item::new(n, format!("Task {n}"), false))
            .collect();
        let mut view = ViewState::default();
        view.set_page(9);
        let projection = view.apply(&items);
        assert_eq!(projection.page, 2);
        assert_eq!(view.params().page, 2);

        view.reset_filters();
        assert_eq!(view.params(), &ViewParams {
            sort: SortMode::ActiveFirst,
            ..ViewParams::default()
        });
    }
}
