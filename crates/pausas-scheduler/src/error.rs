//! Error surface of the scheduler.
//!
//! Two layers: [`StoreError`] for persistence failures and
//! [`SchedulerError`] for the API operations. Logic errors carry the
//! agent's current authoritative request so the UI can redraw without a
//! second round trip; they are returned before anything is written, so
//! they never have side effects.

use thiserror::Error;

use crate::model::PauseRequest;

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient I/O failure. Safe to retry.
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] std::io::Error),

    /// The document exists but failed validation. The store refuses to
    /// return partial data; operator intervention required.
    #[error("document '{name}' corrupted: {detail}")]
    Corrupted { name: String, detail: String },
}

/// Errors returned by the API operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The agent already has a non-terminal request.
    #[error("agent {agent_id} already has an active pause request")]
    AlreadyActive {
        agent_id: String,
        current: Box<PauseRequest>,
    },

    /// The agent reached today's pause cap.
    #[error("agent {agent_id} reached the daily pause cap ({cap})")]
    DailyCapReached { agent_id: String, cap: u32 },

    /// `confirm_pause` called while the request is not `OFFERED`.
    #[error("agent {agent_id} has no pending offer to confirm")]
    NotOffered {
        agent_id: String,
        current: Option<Box<PauseRequest>>,
    },

    /// Operation on a request that is already `COMPLETED` or `CANCELLED`.
    #[error("pause request for agent {agent_id} is already terminal")]
    AlreadyTerminal {
        agent_id: String,
        current: Box<PauseRequest>,
    },

    /// Confirmation arrived after the offer deadline. The expired offer
    /// has already been cancelled and the next waiter promoted.
    #[error("offer for agent {agent_id} expired before confirmation")]
    OfferExpired {
        agent_id: String,
        current: Box<PauseRequest>,
    },

    /// `finish_pause` called while the request is not `RUNNING`.
    #[error("pause for agent {agent_id} is not running")]
    NotRunning {
        agent_id: String,
        current: Box<PauseRequest>,
    },

    /// The agent has no request the operation could apply to.
    #[error("agent {agent_id} has no pause request")]
    NoSuchRequest { agent_id: String },

    /// Persistence failure, surfaced verbatim.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl SchedulerError {
    /// The authoritative request snapshot attached to a logic error.
    pub fn current_request(&self) -> Option<&PauseRequest> {
        match self {
            Self::AlreadyActive { current, .. }
            | Self::AlreadyTerminal { current, .. }
            | Self::OfferExpired { current, .. }
            | Self::NotRunning { current, .. } => Some(current),
            Self::NotOffered { current, .. } => current.as_deref(),
            _ => None,
        }
    }

    /// True for transient failures where a retry is reasonable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(StoreError::Unavailable(_)))
    }
}

/// Convenience alias used across the scheduler crate.
pub type Result<T> = std::result::Result<T, SchedulerError>;
