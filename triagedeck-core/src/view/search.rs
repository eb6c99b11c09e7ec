//! Free-text search over the issue list.
//!
//! Matching is a pure function of its inputs: no indexes, no side effects.
//! An empty or whitespace-only query is an identity pass-through.

use crate::types::Issue;
use serde::{Deserialize, Serialize};

/// Which Issue field(s) a text query is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// Title OR description OR location
    All,
    Title,
    Description,
    Location,
    /// Exact case-insensitive ID match
    Id,
}

impl Default for SearchScope {
    fn default() -> Self {
        SearchScope::All
    }
}

impl std::str::FromStr for SearchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(SearchScope::All),
            "title" => Ok(SearchScope::Title),
            "description" => Ok(SearchScope::Description),
            "location" => Ok(SearchScope::Location),
            "id" => Ok(SearchScope::Id),
            _ => Err(format!("unknown search scope: {}", s)),
        }
    }
}

/// Return the issues matching `query` within `scope`, order preserved.
///
/// All scopes except `Id` use case-insensitive substring containment; `Id`
/// requires an exact case-insensitive match.
pub fn search(issues: &[Issue], query: &str, scope: SearchScope) -> Vec<Issue> {
    let query = query.trim();
    if query.is_empty() {
        return issues.to_vec();
    }
    let needle = query.to_lowercase();

    issues
        .iter()
        .filter(|issue| matches(issue, &needle, scope))
        .cloned()
        .collect()
}

fn matches(issue: &Issue, needle: &str, scope: SearchScope) -> bool {
    match scope {
        SearchScope::All => {
            contains(&issue.title, needle)
                || contains(&issue.description, needle)
                || issue
                    .location
                    .as_deref()
                    .map_or(false, |loc| contains(loc, needle))
        }
        SearchScope::Title => contains(&issue.title, needle),
        SearchScope::Description => contains(&issue.description, needle),
        SearchScope::Location => issue
            .location
            .as_deref()
            .map_or(false, |loc| contains(loc, needle)),
        SearchScope::Id => issue.id.to_lowercase() == needle,
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::test_support::sample_issues;

    #[test]
    fn test_empty_query_is_identity() {
        let issues = sample_issues();
        for scope in [
            SearchScope::All,
            SearchScope::Title,
            SearchScope::Description,
            SearchScope::Location,
            SearchScope::Id,
        ] {
            let result = search(&issues, "   ", scope);
            let ids: Vec<_> = result.iter().map(|i| i.id.as_str()).collect();
            let expected: Vec<_> = issues.iter().map(|i| i.id.as_str()).collect();
            assert_eq!(ids, expected, "scope {:?} must pass everything through", scope);
        }
    }

    #[test]
    fn test_title_search_isolates_match() {
        let issues = sample_issues();
        let result = search(&issues, "SQL", SearchScope::Title);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "zeropath-z1");
    }

    #[test]
    fn test_all_scope_matches_description_and_location() {
        let issues = sample_issues();
        // "checkout" only appears in a description
        let result = search(&issues, "checkout", SearchScope::All);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "sentry-s1");

        // Location substring
        let result = search(&issues, "auth.rs", SearchScope::All);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "zeropath-z1");
    }

    #[test]
    fn test_id_scope_requires_exact_match() {
        let issues = sample_issues();
        assert!(search(&issues, "zeropath-z", SearchScope::Id).is_empty());

        let result = search(&issues, "ZEROPATH-Z1", SearchScope::Id);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "zeropath-z1");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let issues = sample_issues();
        let upper = search(&issues, "XSS", SearchScope::Title);
        let lower = search(&issues, "xss", SearchScope::Title);
        assert_eq!(upper.len(), 1);
        assert_eq!(upper[0].id, lower[0].id);
    }
}
