//! # Pausas Scheduler
//!
//! Multi-tenant PVD pause scheduler: per-group concurrency-bounded queue
//! granting short visual-rest pauses to call-centre agents, with
//! confirmation timeouts, automatic promotion, and reconciliation across
//! a fleet of stateless workers sharing one on-disk state directory.
//!
//! ## Architecture
//! ```text
//! UI worker ──▶ API op (request/confirm/cancel/finish)
//!                 │  lock ▸ load ▸ mutate ▸ reconcile ▸ persist ▸ unlock
//!                 └──▶ events ──▶ Notifier (webhook / log, best-effort)
//!
//! Sweep (tokio interval, any worker)
//!   ├── tick()    → reconcile: expire offers, complete runs, promote FIFO
//!   └── compact() → janitor: trim old terminal entries
//! ```
//!
//! All scheduling decisions take `now` as an argument; the reconciler is
//! a pure function and every invariant is checkable in one place.

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod janitor;
pub mod model;
pub mod notify;
pub mod policy;
pub mod reconcile;
pub mod store;
pub mod sweep;

pub use dispatch::WebhookNotifier;
pub use engine::{AgentView, GroupStats, PauseScheduler};
pub use error::{Result, SchedulerError, StoreError};
pub use model::{
    DurationKind, GroupConfig, GroupsDoc, PauseRequest, QueueDoc, RequestState, SchedulerConfig,
};
pub use notify::{LogNotifier, Notifier, SchedulerEvent};
pub use reconcile::{ReconcileOutcome, reconcile};
pub use store::{CONFIG_DOC, FileStore, GROUPS_DOC, QUEUE_DOC};
pub use sweep::run_sweep;
