//! Multi-select bookkeeping over item keys.

use std::collections::{BTreeSet, HashSet};

use crate::error::SelectionError;
use crate::model::{Identifier, Item};

/// Default ceiling for a single select-all.
pub const DEFAULT_SELECT_ALL_LIMIT: usize = 500;

/// Set of selected item keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSet {
    keys: BTreeSet<String>,
    limit: usize,
}

impl Default for SelectionSet {
    fn default() -> Self {
        Self::new(DEFAULT_SELECT_ALL_LIMIT)
    }
}

impl SelectionSet {
    /// Empty selection refusing select-alls above `limit`.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            keys: BTreeSet::new(),
            limit,
        }
    }

    /// Flip membership of `id`; returns whether it is now selected.
    pub fn toggle(&mut self, id: &Identifier) -> bool {
        let key = id.key();
        if self.keys.remove(&key) {
            false
        } else {
            self.keys.insert(key);
            true
        }
    }

    /// Add every candidate to the selection.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::TooMany`] when there are more candidates
    /// than the configured limit; the selection is left untouched.
    pub fn select_all(&mut self, candidates: &[Identifier]) -> Result<usize, SelectionError> {
        if candidates.len() > self.limit {
            return Err(SelectionError::TooMany {
                requested: candidates.len(),
                limit: self.limit,
            });
        }
        self.keys.extend(candidates.iter().map(Identifier::key));
        Ok(self.keys.len())
    }

    /// Drop every key.
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Number of selected keys.
    #[must_use]
    pub fn count(&self) -> usize {
        self.keys.len()
    }

    /// Whether `id` is selected.
    #[must_use]
    pub fn contains(&self, id: &Identifier) -> bool {
        self.keys.contains(&id.key())
    }

    /// Selected keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }

    /// Selected items in collection order; unknown keys are skipped.
    #[must_use]
    pub fn resolve(&self, collection: &[Item]) -> Vec<Item> {
        collection
            .iter()
            .filter(|item| self.keys.contains(&item.key()))
            .cloned()
            .collect()
    }

    /// Forget keys that no longer name an item; returns how many were dropped.
    pub fn prune(&mut self, collection: &[Item]) -> usize {
        let present: HashSet<String> = collection.iter().map(Item::key).collect();
        let before = self.keys.len();
        self.keys.retain(|key| present.contains(key));
        before - self.keys.len()
    }
}
