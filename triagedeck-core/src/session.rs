//! Processing session store
//!
//! Process-wide registry of in-flight and finished fix runs, one
//! [`ProcessingSession`] per issue. All mutation funnels through
//! [`SessionStore::start`] / [`SessionStore::record`]; the store serializes
//! internally with a single lock, so a multi-threaded embedding needs no
//! extra coordination. Subscribers are invoked synchronously on every event
//! recorded for their issue, outside the store lock so a callback may call
//! back into the store.
//!
//! State machine per issue:
//!
//! ```text
//! pending -> processing -> completed | failed | cancelled
//! ```
//!
//! Terminal states have no outgoing transitions; a new run for the same
//! issue replaces the old record with a fresh one. Trailing activity or
//! metrics events after a terminal transition are still accepted and
//! appended — a log line arriving after completion is not an error.

use crate::error::{Error, Result};
use crate::types::{Activity, ExecutionMetrics, ProcessingSession, RunStatus};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Default cap on retained activities per session.
pub const DEFAULT_ACTIVITY_RETENTION: usize = 500;

/// One event routed into a session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Activity(Activity),
    Metrics(ExecutionMetrics),
    Completed,
    Failed { message: String },
    Cancelled,
}

type Callback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

struct Subscriber {
    token: u64,
    callback: Callback,
}

/// Handle returned by [`SessionStore::subscribe`]; pass it back to
/// [`SessionStore::unsubscribe`] to stop delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    issue_id: String,
    token: u64,
}

struct Slot {
    session: ProcessingSession,
    /// Companion index for O(1) duplicate detection, pruned in lockstep
    /// with activity eviction.
    activity_ids: HashSet<String>,
}

impl Slot {
    fn new(issue_id: &str, status: RunStatus) -> Self {
        Self {
            session: ProcessingSession {
                issue_id: issue_id.to_string(),
                status,
                started_at: Utc::now(),
                completed_at: None,
                error: None,
                activities: Vec::new(),
                metrics: None,
            },
            activity_ids: HashSet::new(),
        }
    }
}

struct Inner {
    slots: HashMap<String, Slot>,
    subscribers: HashMap<String, Vec<Subscriber>>,
    next_token: u64,
    retention: usize,
}

/// Registry of processing sessions plus the event bus feeding them.
///
/// Constructed once per process and handed around explicitly (no ambient
/// globals); [`SessionStore::reset`] exists for test harnesses and
/// shutdown.
pub struct SessionStore {
    inner: Mutex<Inner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_RETENTION)
    }
}

impl SessionStore {
    /// Create a store retaining at most `retention` activities per session.
    pub fn new(retention: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                subscribers: HashMap::new(),
                next_token: 0,
                retention: retention.max(1),
            }),
        }
    }

    /// Accept a processing request for one issue.
    ///
    /// Rejects with [`Error::Conflict`] while a previous run for the same
    /// issue is still in flight. A new run after a terminal state replaces
    /// the old session record with a fresh one.
    pub fn start(&self, issue_id: &str) -> Result<()> {
        self.start_batch(&[issue_id.to_string()])
    }

    /// Accept a processing request for a batch of issues, all or nothing.
    ///
    /// If any issue already has a run in flight the whole batch is rejected
    /// and the error carries every conflicting ID.
    pub fn start_batch(&self, issue_ids: &[String]) -> Result<()> {
        let mut inner = self.inner.lock().expect("session store lock poisoned");

        let conflicts: Vec<String> = issue_ids
            .iter()
            .filter(|id| {
                inner
                    .slots
                    .get(id.as_str())
                    .map_or(false, |slot| !slot.session.status.is_terminal())
            })
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            return Err(Error::Conflict {
                issue_ids: conflicts,
            });
        }

        for id in issue_ids {
            tracing::debug!(issue_id = %id, "session started");
            inner.slots.insert(id.clone(), Slot::new(id, RunStatus::Pending));
        }
        Ok(())
    }

    /// Route one event into the session for `issue_id`.
    ///
    /// Events may arrive before the start call returns; an unknown ID
    /// creates an implicit session already in `processing` state rather
    /// than dropping the event.
    pub fn record(&self, issue_id: &str, event: SessionEvent) {
        let callbacks: Vec<Callback> = {
            let mut inner = self.inner.lock().expect("session store lock poisoned");
            let retention = inner.retention;

            let slot = inner.slots.entry(issue_id.to_string()).or_insert_with(|| {
                tracing::debug!(issue_id, "implicit session for early event");
                Slot::new(issue_id, RunStatus::Processing)
            });

            // First event promotes a pending session to processing.
            if slot.session.status == RunStatus::Pending {
                slot.session.status = RunStatus::Processing;
            }

            match &event {
                SessionEvent::Activity(activity) => {
                    apply_activity(slot, activity.clone(), retention);
                }
                SessionEvent::Metrics(metrics) => {
                    // Latest snapshot wins wholesale; no merging.
                    slot.session.metrics = Some(*metrics);
                }
                SessionEvent::Completed => {
                    finish(slot, RunStatus::Completed, None);
                }
                SessionEvent::Failed { message } => {
                    finish(slot, RunStatus::Failed, Some(message.clone()));
                }
                SessionEvent::Cancelled => {
                    finish(slot, RunStatus::Cancelled, None);
                }
            }

            inner
                .subscribers
                .get(issue_id)
                .map(|subs| subs.iter().map(|s| Arc::clone(&s.callback)).collect())
                .unwrap_or_default()
        };

        for callback in callbacks {
            callback(&event);
        }
    }

    /// Cancel the in-flight run for `issue_id`.
    pub fn cancel(&self, issue_id: &str) -> Result<()> {
        {
            let inner = self.inner.lock().expect("session store lock poisoned");
            if !inner.slots.contains_key(issue_id) {
                return Err(Error::SessionNotFound(issue_id.to_string()));
            }
        }
        self.record(issue_id, SessionEvent::Cancelled);
        Ok(())
    }

    /// Register a listener for every event recorded for `issue_id` from now
    /// on. Multiple subscribers per issue are supported.
    pub fn subscribe<F>(&self, issue_id: &str, callback: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().expect("session store lock poisoned");
        let token = inner.next_token;
        inner.next_token += 1;
        inner
            .subscribers
            .entry(issue_id.to_string())
            .or_default()
            .push(Subscriber {
                token,
                callback: Arc::new(callback),
            });
        Subscription {
            issue_id: issue_id.to_string(),
            token,
        }
    }

    /// Stop delivery for a subscription. Idempotent.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        let mut inner = self.inner.lock().expect("session store lock poisoned");
        if let Some(subs) = inner.subscribers.get_mut(&subscription.issue_id) {
            subs.retain(|s| s.token != subscription.token);
        }
    }

    /// Session for one issue, if any run has been recorded this lifetime.
    pub fn get(&self, issue_id: &str) -> Option<ProcessingSession> {
        let inner = self.inner.lock().expect("session store lock poisoned");
        inner.slots.get(issue_id).map(|slot| slot.session.clone())
    }

    /// Sessions still in flight (pending or processing).
    pub fn active(&self) -> Vec<ProcessingSession> {
        let inner = self.inner.lock().expect("session store lock poisoned");
        let mut sessions: Vec<_> = inner
            .slots
            .values()
            .filter(|slot| !slot.session.status.is_terminal())
            .map(|slot| slot.session.clone())
            .collect();
        sessions.sort_by(|a, b| a.issue_id.cmp(&b.issue_id));
        sessions
    }

    /// Every session recorded this lifetime, ordered by issue ID.
    pub fn all(&self) -> Vec<ProcessingSession> {
        let inner = self.inner.lock().expect("session store lock poisoned");
        let mut sessions: Vec<_> = inner
            .slots
            .values()
            .map(|slot| slot.session.clone())
            .collect();
        sessions.sort_by(|a, b| a.issue_id.cmp(&b.issue_id));
        sessions
    }

    /// Drop the session record for one issue. Sessions are never deleted
    /// automatically; this is the explicit UI clear.
    pub fn clear(&self, issue_id: &str) {
        let mut inner = self.inner.lock().expect("session store lock poisoned");
        inner.slots.remove(issue_id);
    }

    /// Drop all sessions and subscribers (test harness / shutdown).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("session store lock poisoned");
        inner.slots.clear();
        inner.subscribers.clear();
    }
}

/// Append or update one activity, enforcing the retention cap.
///
/// A repeated activity ID updates the existing entry in place — insertion
/// position preserved so UI list position stays stable across a
/// pending-to-resolved transition.
fn apply_activity(slot: &mut Slot, activity: Activity, retention: usize) {
    if slot.activity_ids.contains(&activity.id) {
        if let Some(existing) = slot
            .session
            .activities
            .iter_mut()
            .find(|a| a.id == activity.id)
        {
            *existing = activity;
        }
        return;
    }

    slot.activity_ids.insert(activity.id.clone());
    slot.session.activities.push(activity);

    while slot.session.activities.len() > retention {
        let evicted = slot.session.activities.remove(0);
        slot.activity_ids.remove(&evicted.id);
    }
}

fn finish(slot: &mut Slot, status: RunStatus, error: Option<String>) {
    if slot.session.status.is_terminal() {
        tracing::debug!(
            issue_id = %slot.session.issue_id,
            from = slot.session.status.as_str(),
            to = status.as_str(),
            "ignoring transition out of terminal state"
        );
        return;
    }
    slot.session.status = status;
    slot.session.completed_at = Some(Utc::now());
    slot.session.error = error;
}
