//! View composition pipeline
//!
//! Orchestrates search, filter, sort, and group over a canonical issue
//! array to produce the groups actually rendered. Each stage is a pure
//! function; [`ViewState`] holds the current query/filter/sort/group state
//! and runs the stages in a fixed order:
//!
//! ```text
//! Issue[] → search → filter → sort → group → IssueGroup[]
//! ```
//!
//! Search and filter state are independent: changing the query never
//! touches [`FilterState`] and vice versa.

pub mod filter;
pub mod group;
pub mod search;
pub mod sort;

pub use filter::{filter, passes};
pub use group::{group, CollapsedGroups};
pub use search::{search, SearchScope};
pub use sort::sort;

use crate::types::{FilterState, GroupBy, Issue, IssueGroup, SortField, SortState};
use serde::{Deserialize, Serialize};

/// Current query/filter/sort/group state for the issue list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewState {
    pub query: String,
    pub scope: SearchScope,
    pub filters: FilterState,
    pub sort: SortState,
    pub group_by: Option<GroupBy>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues surviving search + filter, in sorted order, without grouping.
    ///
    /// This is the "currently visible" set that select-all operates over.
    pub fn visible(&self, issues: &[Issue]) -> Vec<Issue> {
        let searched = search::search(issues, &self.query, self.scope);
        let filtered = filter::filter(&searched, &self.filters);
        sort::sort(&filtered, self.sort.field, self.sort.direction)
    }

    /// Run the full pipeline and return the groups to render.
    pub fn compose(&self, issues: &[Issue]) -> Vec<IssueGroup> {
        let visible = self.visible(issues);
        group::group(&visible, self.group_by)
    }

    /// Toggle sort on `field` (same-field click flips direction).
    pub fn toggle_sort(&mut self, field: SortField) {
        self.sort.toggle(field);
    }

    /// Clear the search query, leaving filters untouched.
    pub fn clear_query(&mut self) {
        self.query.clear();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::{Issue, IssueStatus, Severity, TargetRepo};

    /// Four issues spanning two providers, all severities distinct, priorities
    /// 95/75/50/25, counts 1/3/120/8.
    pub fn sample_issues() -> Vec<Issue> {
        vec![
            Issue {
                id: "zeropath-z1".to_string(),
                provider: "zeropath".to_string(),
                title: "SQL Injection in login handler".to_string(),
                description: "User-controlled input reaches the query builder unescaped"
                    .to_string(),
                severity: Severity::Critical,
                priority: 95,
                count: 1,
                status: IssueStatus::Open,
                tags: vec!["injection".to_string(), "security".to_string()],
                location: Some("src/auth.rs:42".to_string()),
                permalink: Some("https://zeropath.example/issues/z1".to_string()),
                target_repo: Some(TargetRepo {
                    full_name: Some("acme/api".to_string()),
                    repo: Some("api".to_string()),
                }),
                metadata: serde_json::json!({}),
            },
            Issue {
                id: "zeropath-z2".to_string(),
                provider: "zeropath".to_string(),
                title: "Stored XSS in comment form".to_string(),
                description: "Rendered markdown is not sanitized".to_string(),
                severity: Severity::High,
                priority: 75,
                count: 3,
                status: IssueStatus::Open,
                tags: vec!["security".to_string()],
                location: Some("src/comments.rs:118".to_string()),
                permalink: None,
                target_repo: Some(TargetRepo {
                    full_name: Some("acme/api".to_string()),
                    repo: Some("api".to_string()),
                }),
                metadata: serde_json::json!({}),
            },
            Issue {
                id: "sentry-s1".to_string(),
                provider: "sentry".to_string(),
                title: "TypeError in payment flow".to_string(),
                description: "Uncaught TypeError raised during checkout".to_string(),
                severity: Severity::Medium,
                priority: 50,
                count: 120,
                status: IssueStatus::Failed,
                tags: vec!["frontend".to_string()],
                location: None,
                permalink: Some("https://sentry.example/issues/s1".to_string()),
                target_repo: None,
                metadata: serde_json::json!({}),
            },
            Issue {
                id: "sentry-s2".to_string(),
                provider: "sentry".to_string(),
                title: "Slow response on dashboard load".to_string(),
                description: "p95 latency regression".to_string(),
                severity: Severity::Low,
                priority: 25,
                count: 8,
                status: IssueStatus::Completed,
                tags: vec![],
                location: None,
                permalink: None,
                target_repo: None,
                metadata: serde_json::json!({}),
            },
        ]
    }
}
