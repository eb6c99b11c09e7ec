//! Stream reconciler for the fix agent's event feed.
//!
//! The agent emits newline-delimited output: each line is either a JSON
//! object with a `type` discriminator or opaque log text. The reconciler
//! decodes the known shapes into [`Activity`] / [`ExecutionMetrics`] and is
//! deliberately lossy-but-safe everywhere else:
//!
//! - **Malformed JSON or unknown `type`**: degraded to a plain log-line
//!   activity with `success` status. Never dropped, never fatal.
//!
//! - **Long content**: details over 200 characters are truncated with an
//!   ellipsis for display. The full text is not reconstructable from the
//!   activity; that is a known tradeoff.
//!
//! - **Tool-use entries**: the wire ID is kept as the activity ID, so a
//!   later re-emit with the same ID resolves the pending entry in place.
//!
//! One reconciler instance tracks a single run: the iteration counter and
//! running cost/duration totals reset with the reconciler, not per line.

use crate::types::{Activity, ActivityKind, ActivityStatus, ExecutionMetrics};
use chrono::Utc;
use serde::Deserialize;

/// Display cap for activity details, in characters.
const MAX_DETAIL_CHARS: usize = 200;

/// What one wire line folded into.
#[derive(Debug, Default)]
pub struct StreamUpdate {
    pub activity: Option<Activity>,
    pub metrics: Option<ExecutionMetrics>,
    /// Present when the line reported a run-level failure
    pub failure: Option<String>,
}

// ============================================
// Raw wire shapes (serde deserialization)
// ============================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawEvent {
    #[serde(rename = "assistant")]
    Assistant {
        #[serde(default)]
        message: RawMessage,
    },
    #[serde(rename = "content_block_start")]
    ContentBlockStart {
        #[serde(default)]
        content_block: RawBlock,
    },
    #[serde(rename = "result")]
    Result {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        cost_usd: Option<f64>,
        #[serde(default)]
        duration_ms: Option<u64>,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename = "heartbeat")]
    Heartbeat,
    // Catch-all for unknown discriminators
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawMessage {
    content: Vec<RawBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

impl Default for RawBlock {
    fn default() -> Self {
        RawBlock::Other
    }
}

// ============================================
// Reconciler
// ============================================

/// Folds one run's wire lines into activities and metrics snapshots.
pub struct StreamReconciler {
    max_iterations: u32,
    iteration: u32,
    total_cost_usd: f64,
    total_duration_ms: u64,
}

impl StreamReconciler {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            max_iterations,
            iteration: 0,
            total_cost_usd: 0.0,
            total_duration_ms: 0,
        }
    }

    /// Fold one wire line. Returns `None` for blank lines and heartbeats.
    pub fn parse_line(&mut self, raw_line: &str) -> Option<StreamUpdate> {
        let line = raw_line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }

        let event = match serde_json::from_str::<RawEvent>(line) {
            Ok(event) => event,
            // Opaque log text; surface it rather than dropping it
            Err(_) => return Some(log_line_update(line)),
        };

        match event {
            RawEvent::Assistant { message } => fold_assistant(message),
            RawEvent::ContentBlockStart { content_block } => fold_block_start(content_block),
            RawEvent::Result {
                subtype,
                is_error,
                result,
                cost_usd,
                duration_ms,
            } => Some(self.fold_result(subtype, is_error, result, cost_usd, duration_ms)),
            RawEvent::Error { message } => {
                let message = message.unwrap_or_else(|| "agent reported an error".to_string());
                Some(StreamUpdate {
                    activity: Some(Activity {
                        id: uuid::Uuid::new_v4().to_string(),
                        timestamp: Utc::now(),
                        kind: ActivityKind::Error,
                        details: truncate_details(&message),
                        status: ActivityStatus::Error,
                        tool: None,
                    }),
                    metrics: None,
                    failure: Some(message),
                })
            }
            RawEvent::Heartbeat => None,
            RawEvent::Unknown => Some(log_line_update(line)),
        }
    }

    fn fold_result(
        &mut self,
        subtype: Option<String>,
        is_error: bool,
        result: Option<String>,
        cost_usd: Option<f64>,
        duration_ms: Option<u64>,
    ) -> StreamUpdate {
        self.iteration += 1;
        let cost_usd = cost_usd.unwrap_or(0.0);
        let duration_ms = duration_ms.unwrap_or(0);
        self.total_cost_usd += cost_usd;
        self.total_duration_ms += duration_ms;

        let details = result
            .or(subtype)
            .unwrap_or_else(|| "iteration finished".to_string());

        StreamUpdate {
            activity: Some(Activity {
                id: uuid::Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                kind: ActivityKind::Result,
                details: truncate_details(&details),
                status: if is_error {
                    ActivityStatus::Error
                } else {
                    ActivityStatus::Success
                },
                tool: None,
            }),
            metrics: Some(ExecutionMetrics {
                iteration: self.iteration,
                max_iterations: self.max_iterations,
                cost_usd,
                duration_ms,
                total_cost_usd: self.total_cost_usd,
                total_duration_ms: self.total_duration_ms,
            }),
            failure: None,
        }
    }
}

fn fold_assistant(message: RawMessage) -> Option<StreamUpdate> {
    let text: Vec<&str> = message
        .content
        .iter()
        .filter_map(|block| match block {
            RawBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    let text = text.join("\n");
    if text.trim().is_empty() {
        // Tool-use blocks arrive via content_block_start; nothing to show
        return None;
    }

    Some(StreamUpdate {
        activity: Some(Activity {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind: ActivityKind::Message,
            details: truncate_details(&text),
            status: ActivityStatus::Success,
            tool: None,
        }),
        metrics: None,
        failure: None,
    })
}

fn fold_block_start(block: RawBlock) -> Option<StreamUpdate> {
    let RawBlock::ToolUse { id, name, input } = block else {
        return None;
    };
    let input_summary = if input.is_null() {
        String::new()
    } else {
        serde_json::to_string(&input).unwrap_or_default()
    };

    Some(StreamUpdate {
        activity: Some(Activity {
            // Wire ID preserved so a re-emit resolves this entry in place
            id,
            timestamp: Utc::now(),
            kind: ActivityKind::Tool,
            details: truncate_details(&input_summary),
            status: ActivityStatus::Pending,
            tool: Some(name),
        }),
        metrics: None,
        failure: None,
    })
}

/// Fallback for opaque log text and unrecognized shapes.
fn log_line_update(line: &str) -> StreamUpdate {
    StreamUpdate {
        activity: Some(Activity {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind: ActivityKind::Message,
            details: truncate_details(line),
            status: ActivityStatus::Success,
            tool: None,
        }),
        metrics: None,
        failure: None,
    }
}

/// Truncate to the display cap on a character boundary, with an ellipsis.
fn truncate_details(text: &str) -> String {
    if text.chars().count() <= MAX_DETAIL_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_DETAIL_CHARS).collect();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_text_becomes_message_activity() {
        let mut reconciler = StreamReconciler::new(5);
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"Looking at the handler"},{"type":"text","text":"Found it"}]}}"#;

        let update = reconciler.parse_line(line).unwrap();
        let activity = update.activity.unwrap();
        assert_eq!(activity.kind, ActivityKind::Message);
        assert_eq!(activity.status, ActivityStatus::Success);
        assert_eq!(activity.details, "Looking at the handler\nFound it");
        assert!(update.metrics.is_none());
        assert!(update.failure.is_none());
    }

    #[test]
    fn test_assistant_without_text_yields_nothing() {
        let mut reconciler = StreamReconciler::new(5);
        let line = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Bash","input":{}}]}}"#;
        assert!(reconciler.parse_line(line).is_none());
    }

    #[test]
    fn test_tool_use_keeps_wire_id_and_is_pending() {
        let mut reconciler = StreamReconciler::new(5);
        let line = r#"{"type":"content_block_start","content_block":{"type":"tool_use","id":"toolu_42","name":"Bash","input":{"command":"cargo check"}}}"#;

        let activity = reconciler.parse_line(line).unwrap().activity.unwrap();
        assert_eq!(activity.id, "toolu_42");
        assert_eq!(activity.kind, ActivityKind::Tool);
        assert_eq!(activity.status, ActivityStatus::Pending);
        assert_eq!(activity.tool.as_deref(), Some("Bash"));
        assert!(activity.details.contains("cargo check"));
    }

    #[test]
    fn test_result_produces_metrics_with_running_totals() {
        let mut reconciler = StreamReconciler::new(3);
        let first = r#"{"type":"result","subtype":"success","cost_usd":0.10,"duration_ms":1000,"result":"applied patch"}"#;
        let second = r#"{"type":"result","subtype":"success","cost_usd":0.25,"duration_ms":2000}"#;

        let update = reconciler.parse_line(first).unwrap();
        let metrics = update.metrics.unwrap();
        assert_eq!(metrics.iteration, 1);
        assert_eq!(metrics.max_iterations, 3);
        assert_eq!(metrics.cost_usd, 0.10);
        assert_eq!(metrics.total_duration_ms, 1000);
        assert_eq!(
            update.activity.unwrap().details,
            "applied patch"
        );

        let metrics = reconciler.parse_line(second).unwrap().metrics.unwrap();
        assert_eq!(metrics.iteration, 2);
        assert_eq!(metrics.cost_usd, 0.25);
        assert!((metrics.total_cost_usd - 0.35).abs() < 1e-9);
        assert_eq!(metrics.total_duration_ms, 3000);
    }

    #[test]
    fn test_error_result_yields_error_activity() {
        let mut reconciler = StreamReconciler::new(3);
        let line = r#"{"type":"result","subtype":"error_max_turns","is_error":true}"#;
        let update = reconciler.parse_line(line).unwrap();
        let activity = update.activity.unwrap();
        assert_eq!(activity.status, ActivityStatus::Error);
        assert_eq!(activity.details, "error_max_turns");
        // A failed iteration is not by itself a run failure
        assert!(update.failure.is_none());
    }

    #[test]
    fn test_error_event_carries_failure() {
        let mut reconciler = StreamReconciler::new(3);
        let line = r#"{"type":"error","message":"agent process exited unexpectedly"}"#;
        let update = reconciler.parse_line(line).unwrap();
        assert_eq!(
            update.failure.as_deref(),
            Some("agent process exited unexpectedly")
        );
        let activity = update.activity.unwrap();
        assert_eq!(activity.kind, ActivityKind::Error);
        assert_eq!(activity.status, ActivityStatus::Error);
    }

    #[test]
    fn test_opaque_text_degrades_to_log_line() {
        let mut reconciler = StreamReconciler::new(3);
        for line in [
            "compiling triagedeck v0.1.0",
            r#"{"type":"mystery","payload":1}"#,
            r#"{"not json"#,
        ] {
            let update = reconciler.parse_line(line).unwrap();
            let activity = update.activity.unwrap();
            assert_eq!(activity.kind, ActivityKind::Message, "line: {}", line);
            assert_eq!(activity.status, ActivityStatus::Success);
            assert!(update.failure.is_none());
        }
    }

    #[test]
    fn test_blank_and_heartbeat_yield_nothing() {
        let mut reconciler = StreamReconciler::new(3);
        assert!(reconciler.parse_line("").is_none());
        assert!(reconciler.parse_line("   \n").is_none());
        assert!(reconciler.parse_line(r#"{"type":"heartbeat"}"#).is_none());
    }

    #[test]
    fn test_details_truncated_on_char_boundary() {
        let long = "é".repeat(450);
        let truncated = truncate_details(&long);
        assert_eq!(truncated.chars().count(), MAX_DETAIL_CHARS + 1);
        assert!(truncated.ends_with('…'));

        let short = "fits";
        assert_eq!(truncate_details(short), "fits");
    }
}
