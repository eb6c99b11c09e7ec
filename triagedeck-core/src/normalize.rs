//! Provider payload normalization.
//!
//! Converts heterogeneous provider payloads into canonical [`Issue`]
//! records. Three providers are understood natively — the `zeropath`
//! vulnerability scanner, the `sentry` error tracker, and the `coverage`
//! tool — with a generic mapping for anything else.
//!
//! Normalization is resilient: a malformed
//! record is skipped with a warning in [`NormalizeResult::warnings`], never
//! a batch failure.
//!
//! ## Severity mapping
//!
//! | Provider vocabulary | Normalized |
//! |---------------------|------------|
//! | critical, fatal, P0 | CRITICAL |
//! | high, error, P1 | HIGH |
//! | medium, moderate, warning, P2 | MEDIUM |
//! | low, minor, P3 | LOW |
//! | info, informational, debug, P4 | INFO |
//!
//! Priority comes from an explicit provider score (clamped to 0..=100) when
//! present, otherwise from the severity's base priority.

use crate::error::{Error, Result};
use crate::types::{Issue, IssueStatus, Severity, TargetRepo};
use serde_json::Value;

/// Outcome of normalizing one batch of provider payloads.
#[derive(Debug, Default)]
pub struct NormalizeResult {
    pub issues: Vec<Issue>,
    pub warnings: Vec<String>,
}

/// Normalize a batch, skipping malformed records with a warning.
pub fn normalize_batch(provider: &str, payloads: &[Value]) -> NormalizeResult {
    let mut result = NormalizeResult::default();
    for (index, payload) in payloads.iter().enumerate() {
        match normalize(provider, payload) {
            Ok(issue) => result.issues.push(issue),
            Err(e) => {
                tracing::warn!(provider, index, error = %e, "skipping malformed record");
                result.warnings.push(format!("record {}: {}", index, e));
            }
        }
    }
    result
}

/// Normalize a single provider payload into an [`Issue`].
pub fn normalize(provider: &str, payload: &Value) -> Result<Issue> {
    match provider {
        "zeropath" => normalize_zeropath(payload),
        "sentry" => normalize_sentry(payload),
        "coverage" => normalize_coverage(payload),
        other => normalize_generic(other, payload),
    }
}

fn normalize_zeropath(payload: &Value) -> Result<Issue> {
    let raw_id = require_id("zeropath", payload)?;
    let severity = raw_severity(payload).map_or(Severity::Medium, Severity::from_raw);
    let location = match (get_str(payload, "file"), payload.get("line").and_then(Value::as_u64)) {
        (Some(file), Some(line)) => Some(format!("{}:{}", file, line)),
        (Some(file), None) => Some(file.to_string()),
        _ => None,
    };

    Ok(Issue {
        id: format!("zeropath-{}", raw_id),
        provider: "zeropath".to_string(),
        title: get_str(payload, "title")
            .or_else(|| get_str(payload, "name"))
            .unwrap_or("Untitled finding")
            .to_string(),
        description: get_str(payload, "description").unwrap_or_default().to_string(),
        severity,
        priority: priority_for(payload, severity),
        count: payload.get("count").and_then(Value::as_u64).unwrap_or(1),
        status: IssueStatus::Open,
        tags: string_array(payload.get("tags")),
        location,
        permalink: get_str(payload, "url").map(str::to_string),
        target_repo: target_repo(payload.get("repository")),
        metadata: extra_metadata(payload),
    })
}

fn normalize_sentry(payload: &Value) -> Result<Issue> {
    let raw_id = require_id("sentry", payload)?;
    let severity = get_str(payload, "level").map_or(Severity::Medium, Severity::from_raw);
    // Sentry serializes counts as strings
    let count = payload
        .get("count")
        .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(1);

    Ok(Issue {
        id: format!("sentry-{}", raw_id),
        provider: "sentry".to_string(),
        title: get_str(payload, "title").unwrap_or("Untitled event").to_string(),
        description: payload
            .get("metadata")
            .and_then(|m| m.get("value"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        severity,
        priority: priority_for(payload, severity),
        count,
        status: IssueStatus::Open,
        tags: string_array(payload.get("tags")),
        location: get_str(payload, "culprit").map(str::to_string),
        permalink: get_str(payload, "permalink").map(str::to_string),
        target_repo: target_repo(payload.get("project")),
        metadata: extra_metadata(payload),
    })
}

fn normalize_coverage(payload: &Value) -> Result<Issue> {
    let raw_id = require_id("coverage", payload)?;
    let severity = get_str(payload, "impact").map_or(Severity::Low, Severity::from_raw);
    let path = get_str(payload, "path");

    Ok(Issue {
        id: format!("coverage-{}", raw_id),
        provider: "coverage".to_string(),
        title: path
            .map(|p| format!("Uncovered code in {}", p))
            .unwrap_or_else(|| "Uncovered code".to_string()),
        description: get_str(payload, "description").unwrap_or_default().to_string(),
        severity,
        priority: priority_for(payload, severity),
        count: payload.get("missed_lines").and_then(Value::as_u64).unwrap_or(1),
        status: IssueStatus::Open,
        tags: string_array(payload.get("tags")),
        location: path.map(str::to_string),
        permalink: get_str(payload, "url").map(str::to_string),
        target_repo: target_repo(payload.get("repository")),
        metadata: extra_metadata(payload),
    })
}

/// Best-effort mapping for providers we have no dedicated normalizer for.
fn normalize_generic(provider: &str, payload: &Value) -> Result<Issue> {
    let raw_id = require_id(provider, payload)?;
    let severity = raw_severity(payload).map_or(Severity::Medium, Severity::from_raw);

    Ok(Issue {
        id: format!("{}-{}", provider, raw_id),
        provider: provider.to_string(),
        title: get_str(payload, "title").unwrap_or("Untitled issue").to_string(),
        description: get_str(payload, "description").unwrap_or_default().to_string(),
        severity,
        priority: priority_for(payload, severity),
        count: payload.get("count").and_then(Value::as_u64).unwrap_or(1),
        status: IssueStatus::Open,
        tags: string_array(payload.get("tags")),
        location: get_str(payload, "location").map(str::to_string),
        permalink: get_str(payload, "url").map(str::to_string),
        target_repo: target_repo(payload.get("repository")),
        metadata: extra_metadata(payload),
    })
}

// ============================================
// Field extraction helpers
// ============================================

fn require_id(provider: &str, payload: &Value) -> Result<String> {
    payload
        .get("id")
        .and_then(|v| {
            v.as_str()
                .map(str::to_string)
                .or_else(|| v.as_u64().map(|n| n.to_string()))
        })
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Normalize {
            provider: provider.to_string(),
            message: "missing id".to_string(),
        })
}

fn raw_severity(payload: &Value) -> Option<&str> {
    get_str(payload, "severity")
        .or_else(|| get_str(payload, "raw_severity"))
        .or_else(|| get_str(payload, "level"))
}

fn priority_for(payload: &Value, severity: Severity) -> u8 {
    payload
        .get("score")
        .or_else(|| payload.get("priority"))
        .and_then(Value::as_u64)
        .map(|score| score.min(100) as u8)
        .unwrap_or_else(|| severity.base_priority())
}

fn get_str<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn target_repo(value: Option<&Value>) -> Option<TargetRepo> {
    let value = value?;
    let full_name = get_str(value, "full_name")
        .or_else(|| get_str(value, "fullName"))
        .map(str::to_string);
    let repo = get_str(value, "repo")
        .or_else(|| get_str(value, "name"))
        .or_else(|| get_str(value, "slug"))
        .map(str::to_string);
    if full_name.is_none() && repo.is_none() {
        return None;
    }
    Some(TargetRepo { full_name, repo })
}

/// Keep the whole payload as metadata so nothing provider-specific is lost.
fn extra_metadata(payload: &Value) -> Value {
    payload.clone()
}
