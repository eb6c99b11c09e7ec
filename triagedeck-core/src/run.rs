//! Run dispatch and stream handles.
//!
//! The fix agent itself runs in an external process; this module owns the
//! contract around it. [`Dispatcher::submit`] conflict-checks a batch
//! against the session store and hands back one [`RunHandle`] per issue.
//! Whatever supervises the agent process pipes its stdout lines into
//! [`RunHandle::ingest_line`] and reports the terminal outcome with
//! [`RunHandle::complete`] / [`RunHandle::fail`].
//!
//! Cancellation is an explicit [`CancelToken`], not a stored callback:
//! the handle flips the token (for the process supervisor to act on),
//! transitions the session to `cancelled`, and stops further delivery
//! synchronously — no events reach the store after [`RunHandle::cancel`]
//! returns.

use crate::error::Result;
use crate::session::{SessionEvent, SessionStore};
use crate::stream::StreamReconciler;
use crate::types::{Activity, ActivityKind, ActivityStatus, ProcessOptions};
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shared cancellation flag between a handle and the process supervisor.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

struct Liveness {
    last_event_at: DateTime<Utc>,
    reported_stale: bool,
}

/// Handle for one in-flight fix run.
pub struct RunHandle {
    issue_id: String,
    store: Arc<SessionStore>,
    reconciler: Mutex<StreamReconciler>,
    cancel: CancelToken,
    stale_after: Duration,
    liveness: Mutex<Liveness>,
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("issue_id", &self.issue_id)
            .finish_non_exhaustive()
    }
}

impl RunHandle {
    fn new(
        issue_id: String,
        store: Arc<SessionStore>,
        options: &ProcessOptions,
        stale_after: Duration,
    ) -> Self {
        Self {
            issue_id,
            store,
            reconciler: Mutex::new(StreamReconciler::new(options.max_iterations)),
            cancel: CancelToken::new(),
            stale_after,
            liveness: Mutex::new(Liveness {
                last_event_at: Utc::now(),
                reported_stale: false,
            }),
        }
    }

    pub fn issue_id(&self) -> &str {
        &self.issue_id
    }

    /// Token the process supervisor polls to know when to terminate the
    /// external agent.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Feed one wire line into the session.
    ///
    /// Every line, heartbeats included, refreshes liveness. Lines arriving
    /// after cancellation are discarded.
    pub fn ingest_line(&self, raw_line: &str) {
        if self.cancel.is_cancelled() {
            return;
        }
        {
            let mut liveness = self.liveness.lock().expect("liveness lock poisoned");
            liveness.last_event_at = Utc::now();
        }

        let update = {
            let mut reconciler = self.reconciler.lock().expect("reconciler lock poisoned");
            reconciler.parse_line(raw_line)
        };
        let Some(update) = update else {
            return;
        };

        if let Some(activity) = update.activity {
            self.store
                .record(&self.issue_id, SessionEvent::Activity(activity));
        }
        if let Some(metrics) = update.metrics {
            self.store
                .record(&self.issue_id, SessionEvent::Metrics(metrics));
        }
        if let Some(message) = update.failure {
            tracing::warn!(issue_id = %self.issue_id, %message, "run failed");
            self.store
                .record(&self.issue_id, SessionEvent::Failed { message });
        }
    }

    /// Record successful completion, called by the supervisor at clean exit.
    pub fn complete(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.store.record(&self.issue_id, SessionEvent::Completed);
    }

    /// Record a run failure (process exit, transport error).
    pub fn fail(&self, message: impl Into<String>) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.store.record(
            &self.issue_id,
            SessionEvent::Failed {
                message: message.into(),
            },
        );
    }

    /// Cancel the run: flips the token, stops delivery, and transitions the
    /// session to `cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.store.record(&self.issue_id, SessionEvent::Cancelled);
    }

    /// Treat prolonged silence as a dead connection.
    ///
    /// Absence of any line (heartbeats included) for longer than the stale
    /// interval records a transport failure: an error activity plus a
    /// `failed` transition, fired at most once per handle. Returns whether
    /// the failure fired.
    pub fn check_liveness(&self, now: DateTime<Utc>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        {
            let mut liveness = self.liveness.lock().expect("liveness lock poisoned");
            if liveness.reported_stale || now - liveness.last_event_at <= self.stale_after {
                return false;
            }
            liveness.reported_stale = true;
        }

        let message = format!(
            "no events from agent for {}s; treating connection as dead",
            self.stale_after.num_seconds()
        );
        tracing::warn!(issue_id = %self.issue_id, "stream went silent");
        self.store.record(
            &self.issue_id,
            SessionEvent::Activity(Activity {
                id: uuid::Uuid::new_v4().to_string(),
                timestamp: now,
                kind: ActivityKind::Error,
                details: message.clone(),
                status: ActivityStatus::Error,
                tool: None,
            }),
        );
        self.store
            .record(&self.issue_id, SessionEvent::Failed { message });
        true
    }
}

/// Accepts processing requests and hands out run handles.
pub struct Dispatcher {
    store: Arc<SessionStore>,
    stale_after: Duration,
}

impl Dispatcher {
    pub fn new(store: Arc<SessionStore>, stale_after_secs: u64) -> Self {
        Self {
            store,
            stale_after: Duration::seconds(stale_after_secs.min(i64::MAX as u64) as i64),
        }
    }

    /// Dispatch a batch of issues to the fix agent.
    ///
    /// All-or-nothing: if any issue already has a run in flight, the whole
    /// batch is rejected with the conflicting IDs and no session starts.
    pub fn submit(
        &self,
        issue_ids: &[String],
        options: &ProcessOptions,
    ) -> Result<Vec<Arc<RunHandle>>> {
        self.store.start_batch(issue_ids)?;
        tracing::info!(
            issues = issue_ids.len(),
            mode = ?options.mode,
            model = options.model.as_deref().unwrap_or("default"),
            max_iterations = options.max_iterations,
            auto_push = options.auto_push,
            ci_aware = options.ci_aware,
            "dispatched batch to fix agent"
        );

        Ok(issue_ids
            .iter()
            .map(|id| {
                Arc::new(RunHandle::new(
                    id.clone(),
                    Arc::clone(&self.store),
                    options,
                    self.stale_after,
                ))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{RunStatus, ActivityStatus};

    fn dispatcher() -> (Arc<SessionStore>, Dispatcher) {
        let store = Arc::new(SessionStore::default());
        let dispatcher = Dispatcher::new(Arc::clone(&store), 30);
        (store, dispatcher)
    }

    #[test]
    fn test_submit_rejects_conflicting_batch() {
        let (_store, dispatcher) = dispatcher();
        let first = dispatcher
            .submit(&["a".to_string()], &ProcessOptions::default())
            .unwrap();
        assert_eq!(first.len(), 1);

        let err = dispatcher
            .submit(
                &["a".to_string(), "b".to_string()],
                &ProcessOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[test]
    fn test_ingest_flows_into_session() {
        let (store, dispatcher) = dispatcher();
        let handles = dispatcher
            .submit(&["a".to_string()], &ProcessOptions::default())
            .unwrap();
        let handle = &handles[0];

        handle.ingest_line(r#"{"type":"assistant","message":{"content":[{"type":"text","text":"starting"}]}}"#);
        handle.ingest_line(r#"{"type":"content_block_start","content_block":{"type":"tool_use","id":"t1","name":"Edit","input":{}}}"#);
        handle.ingest_line(r#"{"type":"result","cost_usd":0.05,"duration_ms":500,"result":"done"}"#);
        handle.complete();

        let session = store.get("a").unwrap();
        assert_eq!(session.status, RunStatus::Completed);
        assert_eq!(session.activities.len(), 3);
        assert_eq!(session.metrics.unwrap().iteration, 1);
    }

    #[test]
    fn test_error_line_fails_session() {
        let (store, dispatcher) = dispatcher();
        let handles = dispatcher
            .submit(&["a".to_string()], &ProcessOptions::default())
            .unwrap();
        handles[0].ingest_line(r#"{"type":"error","message":"boom"}"#);

        let session = store.get("a").unwrap();
        assert_eq!(session.status, RunStatus::Failed);
        assert_eq!(session.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_cancel_stops_delivery_synchronously() {
        let (store, dispatcher) = dispatcher();
        let handles = dispatcher
            .submit(&["a".to_string()], &ProcessOptions::default())
            .unwrap();
        let handle = &handles[0];

        handle.ingest_line("warming up");
        handle.cancel();
        assert!(handle.cancel_token().is_cancelled());

        // Nothing recorded after cancel, including terminal overrides
        handle.ingest_line("straggler line");
        handle.complete();
        handle.fail("too late");

        let session = store.get("a").unwrap();
        assert_eq!(session.status, RunStatus::Cancelled);
        assert_eq!(session.activities.len(), 1);
    }

    #[test]
    fn test_liveness_failure_fires_once() {
        let (store, dispatcher) = dispatcher();
        let handles = dispatcher
            .submit(&["a".to_string()], &ProcessOptions::default())
            .unwrap();
        let handle = &handles[0];

        // Within the window: nothing happens
        assert!(!handle.check_liveness(Utc::now()));

        let later = Utc::now() + Duration::seconds(120);
        assert!(handle.check_liveness(later));
        // Second check does not fire again
        assert!(!handle.check_liveness(later));

        let session = store.get("a").unwrap();
        assert_eq!(session.status, RunStatus::Failed);
        let last = session.activities.last().unwrap();
        assert_eq!(last.status, ActivityStatus::Error);

        // Other sessions are unaffected by this failure
        dispatcher
            .submit(&["b".to_string()], &ProcessOptions::default())
            .unwrap();
        assert_eq!(store.get("b").unwrap().status, RunStatus::Pending);
    }

    #[test]
    fn test_heartbeat_refreshes_liveness() {
        let (_store, dispatcher) = dispatcher();
        let handles = dispatcher
            .submit(&["a".to_string()], &ProcessOptions::default())
            .unwrap();
        let handle = &handles[0];

        handle.ingest_line(r#"{"type":"heartbeat"}"#);
        // Heartbeat counted as traffic; no stale failure right after
        assert!(!handle.check_liveness(Utc::now()));
    }
}
