//! Compound predicate filtering over the issue list.
//!
//! Dimensions with a non-default value are ANDed together; within a
//! multi-value dimension membership is ORed. Empty vectors and default
//! ranges mean "no constraint on this dimension".

use crate::types::{FilterState, Issue};

/// Return the issues passing every active dimension of `state`, order
/// preserved.
pub fn filter(issues: &[Issue], state: &FilterState) -> Vec<Issue> {
    issues
        .iter()
        .filter(|issue| passes(issue, state))
        .cloned()
        .collect()
}

/// Whether a single issue passes the filter.
pub fn passes(issue: &Issue, state: &FilterState) -> bool {
    if !state.providers.is_empty() && !state.providers.contains(&issue.provider) {
        return false;
    }
    if !state.severities.is_empty() && !state.severities.contains(&issue.severity) {
        return false;
    }
    let (min, max) = state.priority_range;
    if issue.priority < min || issue.priority > max {
        return false;
    }
    if !state.statuses.is_empty() && !state.statuses.contains(&issue.status) {
        return false;
    }
    if !state.tags.is_empty() && !issue.tags.iter().any(|tag| state.tags.contains(tag)) {
        return false;
    }
    if !state.count_range.contains(issue.count) {
        return false;
    }
    true
}
