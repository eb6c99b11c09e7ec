//! Core domain types for triagedeck
//!
//! These types form the canonical data model shared by the view pipeline,
//! the selection tracker, and the processing session machinery.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Issue** | Canonical unit of triage work surfaced from an external provider |
//! | **Provider** | The external system an issue came from (scanner, error tracker, coverage tool) |
//! | **Session** | The lifecycle record of one automated fix-attempt run against an issue |
//! | **Activity** | One discrete log/tool/result event within a session's timeline |
//! | **Scope** | Which Issue field(s) a free-text search query is matched against |
//! | **GroupBy** | The dimension used to partition the issue list for display |
//!
//! Issues are immutable once normalized: a refetch produces a new array, and
//! `Issue::id` is the stable join key for selection, session tracking, and
//! history across fetches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Severity
// ============================================

/// Normalized severity of an issue.
///
/// Providers report severity in their own vocabulary (`raw_severity`); the
/// normalizer maps everything onto this five-level scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        }
    }

    /// Fixed rank used for severity ordering; higher is more severe.
    ///
    /// Sorting by severity uses this rank, not alphabetic order, so
    /// CRITICAL > HIGH > MEDIUM > LOW > INFO.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
            Severity::Info => 0,
        }
    }

    /// Base priority assigned when a provider supplies no score of its own.
    pub fn base_priority(&self) -> u8 {
        match self {
            Severity::Critical => 90,
            Severity::High => 70,
            Severity::Medium => 50,
            Severity::Low => 30,
            Severity::Info => 10,
        }
    }

    /// Normalize a provider-specific severity string.
    ///
    /// Recognizes the scanner vocabulary (critical/high/medium/low/info),
    /// error-tracker levels (fatal/error/warning/debug), and P0..P4 labels.
    /// Unknown values fall back to [`Severity::Medium`].
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" | "fatal" | "p0" => Severity::Critical,
            "high" | "error" | "p1" => Severity::High,
            "medium" | "moderate" | "warning" | "p2" => Severity::Medium,
            "low" | "minor" | "p3" => Severity::Low,
            "info" | "informational" | "debug" | "p4" => Severity::Info,
            _ => Severity::Medium,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(Severity::Critical),
            "HIGH" => Ok(Severity::High),
            "MEDIUM" => Ok(Severity::Medium),
            "LOW" => Ok(Severity::Low),
            "INFO" => Ok(Severity::Info),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

// ============================================
// Issue Status
// ============================================

/// Triage status of an issue, derived from processing history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    /// Not yet dispatched to the fix agent
    Open,
    /// A fix run is in flight
    Processing,
    /// Last fix run finished successfully
    Completed,
    /// Last fix run failed; eligible for retry
    Failed,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::Processing => "processing",
            IssueStatus::Completed => "completed",
            IssueStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for IssueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(IssueStatus::Open),
            "processing" => Ok(IssueStatus::Processing),
            "completed" => Ok(IssueStatus::Completed),
            "failed" => Ok(IssueStatus::Failed),
            _ => Err(format!("unknown issue status: {}", s)),
        }
    }
}

// ============================================
// Issue
// ============================================

/// Repository an issue targets, as reported by its provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRepo {
    /// "owner/name" form, preferred when present
    pub full_name: Option<String>,
    /// Bare repository name
    pub repo: Option<String>,
}

/// Canonical unit of triage work.
///
/// Created by the normalizer on each fetch and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Globally unique, provider-prefixed identifier (e.g. "zeropath-1042").
    /// Stable across fetches.
    pub id: String,
    /// Which provider surfaced this issue
    pub provider: String,
    /// Short human-readable title
    pub title: String,
    /// Longer description
    pub description: String,
    /// Normalized severity
    pub severity: Severity,
    /// Provider-or-rule-derived ranking, 0..=100
    pub priority: u8,
    /// Occurrence/event count
    pub count: u64,
    /// Triage status
    pub status: IssueStatus,
    /// Free-form labels attached by the provider
    pub tags: Vec<String>,
    /// "file:line" location, when the provider reports one
    pub location: Option<String>,
    /// External URL for the issue in the provider's own UI
    pub permalink: Option<String>,
    /// Repository this issue targets, when known
    pub target_repo: Option<TargetRepo>,
    /// Provider-specific extra fields we did not map
    pub metadata: serde_json::Value,
}

impl Issue {
    /// Grouping key for the repo dimension.
    ///
    /// Checked in order: `target_repo.full_name`, `target_repo.repo`, then a
    /// `target_repo` object embedded in metadata. Falls back to "Unknown".
    pub fn repo_key(&self) -> String {
        if let Some(repo) = &self.target_repo {
            if let Some(full) = repo.full_name.as_deref().filter(|s| !s.is_empty()) {
                return full.to_string();
            }
            if let Some(name) = repo.repo.as_deref().filter(|s| !s.is_empty()) {
                return name.to_string();
            }
        }
        if let Some(embedded) = self.metadata.get("target_repo") {
            for key in ["full_name", "fullName", "repo"] {
                if let Some(s) = embedded.get(key).and_then(|v| v.as_str()) {
                    if !s.is_empty() {
                        return s.to_string();
                    }
                }
            }
        }
        "Unknown".to_string()
    }
}

// ============================================
// Filtering
// ============================================

/// Occurrence-count bounds; either side may be unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl CountRange {
    pub fn contains(&self, count: u64) -> bool {
        self.min.map_or(true, |min| count >= min) && self.max.map_or(true, |max| count <= max)
    }

    pub fn is_default(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Compound predicate filter over a collection of issues.
///
/// An empty vector or default range on a dimension means "no constraint on
/// this dimension". Non-default dimensions are ANDed together; within a
/// multi-value dimension membership is ORed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub providers: Vec<String>,
    pub severities: Vec<Severity>,
    /// Inclusive on both bounds; `(0, 100)` passes everything
    pub priority_range: (u8, u8),
    pub statuses: Vec<IssueStatus>,
    pub tags: Vec<String>,
    pub count_range: CountRange,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            severities: Vec::new(),
            priority_range: (0, 100),
            statuses: Vec::new(),
            tags: Vec::new(),
            count_range: CountRange::default(),
        }
    }
}

impl FilterState {
    /// Set the priority range, silently clamping malformed input.
    ///
    /// Bounds are clamped to 0..=100 and swapped if inverted; filter input
    /// comes from generated UI state, so recovery is preferred over surfacing
    /// an error.
    pub fn set_priority_range(&mut self, min: u8, max: u8) {
        let min = min.min(100);
        let max = max.min(100);
        self.priority_range = if min <= max { (min, max) } else { (max, min) };
    }

    /// Toggle a provider in or out of the provider dimension.
    pub fn toggle_provider(&mut self, provider: &str) {
        toggle_value(&mut self.providers, provider.to_string());
    }

    /// Toggle a severity in or out of the severity dimension.
    pub fn toggle_severity(&mut self, severity: Severity) {
        toggle_value(&mut self.severities, severity);
    }

    /// Toggle a status in or out of the status dimension.
    pub fn toggle_status(&mut self, status: IssueStatus) {
        toggle_value(&mut self.statuses, status);
    }

    /// Toggle a tag in or out of the tag dimension.
    pub fn toggle_tag(&mut self, tag: &str) {
        toggle_value(&mut self.tags, tag.to_string());
    }

    /// Reset every dimension to its default.
    pub fn clear(&mut self) {
        *self = FilterState::default();
    }

    /// True iff any dimension deviates from its default.
    pub fn has_active_filters(&self) -> bool {
        self.active_filter_count() > 0
    }

    /// Number of dimensions with a non-default value.
    ///
    /// Counts dimensions, not individual selected values: two selected
    /// severities contribute 1, matching dimension-level chip display.
    pub fn active_filter_count(&self) -> usize {
        let mut count = 0;
        if !self.providers.is_empty() {
            count += 1;
        }
        if !self.severities.is_empty() {
            count += 1;
        }
        if self.priority_range != (0, 100) {
            count += 1;
        }
        if !self.statuses.is_empty() {
            count += 1;
        }
        if !self.tags.is_empty() {
            count += 1;
        }
        if !self.count_range.is_default() {
            count += 1;
        }
        count
    }
}

fn toggle_value<T: PartialEq>(values: &mut Vec<T>, value: T) {
    if let Some(pos) = values.iter().position(|v| *v == value) {
        values.remove(pos);
    } else {
        values.push(value);
    }
}

// ============================================
// Sorting
// ============================================

/// Field the issue list is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Priority,
    Count,
    Title,
    Provider,
    Severity,
    Repo,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Priority => "priority",
            SortField::Count => "count",
            SortField::Title => "title",
            SortField::Provider => "provider",
            SortField::Severity => "severity",
            SortField::Repo => "repo",
        }
    }

    /// Default direction when this field is newly selected: descending for
    /// the numeric-feeling fields (priority, count, severity rank), ascending
    /// for text fields.
    pub fn default_direction(&self) -> SortDirection {
        match self {
            SortField::Priority | SortField::Count | SortField::Severity => SortDirection::Desc,
            SortField::Title | SortField::Provider | SortField::Repo => SortDirection::Asc,
        }
    }
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priority" => Ok(SortField::Priority),
            "count" => Ok(SortField::Count),
            "title" => Ok(SortField::Title),
            "provider" => Ok(SortField::Provider),
            "severity" => Ok(SortField::Severity),
            "repo" => Ok(SortField::Repo),
            _ => Err(format!("unknown sort field: {}", s)),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(&self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// The one active sort: field plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            field: SortField::Priority,
            direction: SortField::Priority.default_direction(),
        }
    }
}

impl SortState {
    /// Toggle sort on `field`: re-selecting the active field flips direction,
    /// selecting a new field resets to that field's default direction.
    pub fn toggle(&mut self, field: SortField) {
        if self.field == field {
            self.direction = self.direction.flipped();
        } else {
            self.field = field;
            self.direction = field.default_direction();
        }
    }
}

// ============================================
// Grouping
// ============================================

/// Dimension used to partition the issue list for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Provider,
    Severity,
    Repo,
}

impl std::str::FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provider" => Ok(GroupBy::Provider),
            "severity" => Ok(GroupBy::Severity),
            "repo" => Ok(GroupBy::Repo),
            _ => Err(format!("unknown group dimension: {}", s)),
        }
    }
}

/// One labeled, ordered partition of the issue list.
///
/// Produced fresh on every grouping invocation; never persisted apart from
/// its source array.
#[derive(Debug, Clone, Serialize)]
pub struct IssueGroup {
    pub key: String,
    pub label: String,
    pub issues: Vec<Issue>,
    pub count: usize,
}

// ============================================
// Processing Sessions
// ============================================

/// Status of one automated fix-attempt run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Cancelled by the caller; terminal and distinct from `Failed`
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Processing => "processing",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    /// True for states with no outgoing transitions (besides a fresh run).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// Kind of activity within a session's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Message,
    Tool,
    Result,
    Error,
}

/// Resolution status of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// Tool invocation emitted but not yet resolved
    Pending,
    Success,
    Error,
}

/// One discrete log/tool/result event within a session.
///
/// `id` is unique per activity; re-ingesting an activity with the same `id`
/// updates it in place rather than duplicating, which is how a pending
/// tool-use entry later resolves to success or error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    pub details: String,
    pub status: ActivityStatus,
    /// Tool name, for `kind == Tool`
    pub tool: Option<String>,
}

/// Latest execution metrics snapshot for a session.
///
/// Fully replaced (not merged) on each metrics event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub iteration: u32,
    pub max_iterations: u32,
    pub cost_usd: f64,
    pub duration_ms: u64,
    pub total_cost_usd: f64,
    pub total_duration_ms: u64,
}

/// Lifecycle record of one automated fix-attempt run against an issue.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingSession {
    pub issue_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub activities: Vec<Activity>,
    pub metrics: Option<ExecutionMetrics>,
}

// ============================================
// Dispatch Options
// ============================================

/// What kind of run the fix agent should perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Produce a plan without touching the tree
    Plan,
    /// Apply the fix
    Build,
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plan" => Ok(RunMode::Plan),
            "build" => Ok(RunMode::Build),
            _ => Err(format!("unknown run mode: {}", s)),
        }
    }
}

/// Options passed along when dispatching issues to the fix agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOptions {
    pub mode: RunMode,
    /// Model selection; `None` lets the agent pick its default
    pub model: Option<String>,
    pub max_iterations: u32,
    pub auto_push: bool,
    pub ci_aware: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::Plan,
            model: None,
            max_iterations: 5,
            auto_push: false,
            ci_aware: true,
        }
    }
}
