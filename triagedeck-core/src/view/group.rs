//! Partitioning of the issue list into labeled, ordered groups.
//!
//! Group order affects UI scan order, so it is deterministic: descending
//! member count, ties broken by key ascending.

use crate::types::{GroupBy, Issue, IssueGroup};
use std::collections::HashSet;

/// Key used for the implicit single group when no dimension is selected.
const ALL_GROUP_KEY: &str = "all";

/// Partition `issues` by `group_by`.
///
/// `None` yields a single implicit group containing all issues in their
/// given order; callers render that as a flat list. Within each group,
/// issues keep the order they arrived in.
pub fn group(issues: &[Issue], group_by: Option<GroupBy>) -> Vec<IssueGroup> {
    let Some(dimension) = group_by else {
        return vec![IssueGroup {
            key: ALL_GROUP_KEY.to_string(),
            label: "All issues".to_string(),
            issues: issues.to_vec(),
            count: issues.len(),
        }];
    };

    // Preserve first-seen key order while accumulating, then impose the
    // deterministic display order at the end.
    let mut keys: Vec<String> = Vec::new();
    let mut buckets: Vec<Vec<Issue>> = Vec::new();

    for issue in issues {
        let key = group_key(issue, dimension);
        match keys.iter().position(|k| *k == key) {
            Some(pos) => buckets[pos].push(issue.clone()),
            None => {
                keys.push(key);
                buckets.push(vec![issue.clone()]);
            }
        }
    }

    let mut groups: Vec<IssueGroup> = keys
        .into_iter()
        .zip(buckets)
        .map(|(key, issues)| {
            let label = group_label(&key, dimension);
            let count = issues.len();
            IssueGroup {
                key,
                label,
                issues,
                count,
            }
        })
        .collect();

    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    groups
}

fn group_key(issue: &Issue, dimension: GroupBy) -> String {
    match dimension {
        GroupBy::Provider => issue.provider.clone(),
        GroupBy::Severity => issue.severity.as_str().to_string(),
        GroupBy::Repo => issue.repo_key(),
    }
}

fn group_label(key: &str, dimension: GroupBy) -> String {
    match dimension {
        // Severity keys are already display-ready; providers read better
        // capitalized.
        GroupBy::Severity | GroupBy::Repo => key.to_string(),
        GroupBy::Provider => {
            let mut chars = key.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => key.to_string(),
            }
        }
    }
}

/// UI-side record of which groups are collapsed.
///
/// Membership is a set of group keys, tracked outside the grouping itself so
/// it survives regrouping.
#[derive(Debug, Default)]
pub struct CollapsedGroups {
    keys: HashSet<String>,
}

impl CollapsedGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_collapsed(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn toggle(&mut self, key: &str) {
        if !self.keys.remove(key) {
            self.keys.insert(key.to_string());
        }
    }

    /// Collapse every group currently produced.
    pub fn collapse_all(&mut self, groups: &[IssueGroup]) {
        self.keys = groups.iter().map(|g| g.key.clone()).collect();
    }

    /// Clear the set, expanding everything.
    pub fn expand_all(&mut self) {
        self.keys.clear();
    }
}
