//! Ordering of the issue list.
//!
//! Returns a new array, never mutating the input. Severity sorts by its
//! fixed rank (CRITICAL > HIGH > MEDIUM > LOW > INFO), not alphabetically;
//! every comparison breaks ties by `id` ascending so output is
//! deterministic regardless of direction.

use crate::types::{Issue, SortDirection, SortField};
use std::cmp::Ordering;

/// Return the issues ordered by `field` in `direction`.
pub fn sort(issues: &[Issue], field: SortField, direction: SortDirection) -> Vec<Issue> {
    let mut sorted = issues.to_vec();
    sorted.sort_by(|a, b| {
        let primary = compare(a, b, field);
        let directed = match direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        // Tie-break stays ascending so direction flips are exact reversals
        // only where the primary key actually differs.
        directed.then_with(|| a.id.cmp(&b.id))
    });
    sorted
}

fn compare(a: &Issue, b: &Issue, field: SortField) -> Ordering {
    match field {
        SortField::Priority => a.priority.cmp(&b.priority),
        SortField::Count => a.count.cmp(&b.count),
        SortField::Severity => a.severity.rank().cmp(&b.severity.rank()),
        SortField::Title => compare_text(&a.title, &b.title),
        SortField::Provider => compare_text(&a.provider, &b.provider),
        SortField::Repo => compare_text(&a.repo_key(), &b.repo_key()),
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}
