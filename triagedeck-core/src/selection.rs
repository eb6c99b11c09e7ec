//! Selection tracking for bulk actions.
//!
//! The selection is a set of issue IDs, deliberately decoupled from what is
//! currently visible: an issue hidden by a filter stays selected and shows
//! up checked again when the filter is cleared. Only explicit clears or a
//! select-all replacement change membership.

use crate::types::Issue;
use std::collections::HashSet;

/// Set of selected issue IDs.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    selected: HashSet<String>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle one issue in or out of the selection.
    ///
    /// Toggling an ID with no backing issue is a plain set operation; the
    /// orphan ID is recorded and harmless.
    pub fn toggle(&mut self, id: &str) {
        if !self.selected.remove(id) {
            self.selected.insert(id.to_string());
        }
    }

    /// Replace the selection with exactly the IDs of `visible_issues`.
    ///
    /// Does not union with the prior selection: issues outside the visible
    /// set are dropped.
    pub fn select_all(&mut self, visible_issues: &[Issue]) {
        self.selected = visible_issues.iter().map(|i| i.id.clone()).collect();
    }

    /// Clear the selection.
    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Selected IDs in unspecified order.
    pub fn ids(&self) -> Vec<String> {
        self.selected.iter().cloned().collect()
    }
}
