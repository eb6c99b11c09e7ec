//! # triagedeck-core
//!
//! Core library for triagedeck - an issue-triage and bulk-fix dashboard.
//!
//! This library provides:
//! - Canonical issue types normalized from external providers
//! - The view composition pipeline (search, filter, sort, group)
//! - Selection tracking for bulk actions
//! - The processing session store and fix-agent stream reconciliation
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows one way:
//!
//! ```text
//! provider payloads → normalize → Issue[] → view pipeline → rendered groups
//! user actions → SelectionTracker / Dispatcher
//! agent stream → StreamReconciler → SessionStore → subscribers
//! ```
//!
//! Issues are immutable once normalized; a refetch produces a new array.
//! The [`session::SessionStore`] is the single owner of run lifecycle
//! state, and the stream reconciler is the only writer into a session's
//! activity and metrics fields.
//!
//! ## Example
//!
//! ```rust
//! use triagedeck_core::normalize::normalize_batch;
//! use triagedeck_core::view::ViewState;
//!
//! let payloads = vec![serde_json::json!({
//!     "id": "z1",
//!     "title": "SQL Injection in login handler",
//!     "severity": "critical",
//!     "score": 95,
//! })];
//! let normalized = normalize_batch("zeropath", &payloads);
//! let view = ViewState::new();
//! let groups = view.compose(&normalized.issues);
//! assert_eq!(groups[0].issues.len(), 1);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use run::{CancelToken, Dispatcher, RunHandle};
pub use selection::SelectionTracker;
pub use session::{SessionEvent, SessionStore, Subscription};
pub use stream::{StreamReconciler, StreamUpdate};
pub use types::*;
pub use view::{SearchScope, ViewState};

// Public modules
pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod run;
pub mod selection;
pub mod session;
pub mod stream;
pub mod types;
pub mod view;
