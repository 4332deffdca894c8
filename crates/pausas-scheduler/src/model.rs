//! Data model — the persisted documents and the pause request lifecycle.
//!
//! Three JSON documents live in the shared state directory: the scheduler
//! config, the group capacities, and the queue itself. Field names are
//! stable; unknown fields survive a read-modify-write cycle so older and
//! newer workers can share one state directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How long the pause runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationKind {
    /// Short visual rest.
    Short,
    /// Long visual rest.
    Long,
}

/// Lifecycle state of a pause request.
///
/// One-way except `WAITING → RUNNING`, which always passes through
/// `OFFERED`. Any non-terminal state may move to `CANCELLED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    Waiting,
    Offered,
    Running,
    Completed,
    Cancelled,
}

impl RequestState {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// States that hold a concurrency slot in their group.
    pub fn holds_slot(self) -> bool {
        matches!(self, Self::Offered | Self::Running)
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::Offered => write!(f, "OFFERED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A single pause request, as persisted in the queue document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseRequest {
    /// Unique within the queue document.
    pub id: u64,
    pub agent_id: String,
    pub group_id: String,
    pub duration_kind: DurationKind,
    pub state: RequestState,
    /// Assigned once at creation; promotion order within a group is FIFO
    /// on this field and it is never updated afterwards.
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    /// True once the agent's UI session acknowledged delivery of the
    /// `Offered`/`PauseStarted` event. At-least-once: cleared on promotion.
    #[serde(default)]
    pub notified: bool,
    /// Fields written by other tools are carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PauseRequest {
    /// A fresh `WAITING` request.
    pub fn new(
        id: u64,
        agent_id: &str,
        group_id: &str,
        duration_kind: DurationKind,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            agent_id: agent_id.to_string(),
            group_id: group_id.to_string(),
            duration_kind,
            state: RequestState::Waiting,
            requested_at,
            promoted_at: None,
            confirmed_at: None,
            started_at: None,
            ended_at: None,
            cancel_reason: None,
            notified: false,
            extra: serde_json::Map::new(),
        }
    }
}

/// The canonical queue document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueDoc {
    #[serde(default)]
    pub requests: Vec<PauseRequest>,
    /// High-water mark for id allocation. Survives janitor compaction so
    /// ids are never reused.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub next_id: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl QueueDoc {
    /// Allocate a fresh, never-reused request id.
    pub fn allocate_id(&mut self) -> u64 {
        let floor = self
            .requests
            .iter()
            .map(|r| r.id + 1)
            .max()
            .unwrap_or(1);
        let id = self.next_id.max(floor);
        self.next_id = id + 1;
        id
    }

    /// The agent's non-terminal request, if one exists. Invariant: at most
    /// one per agent.
    pub fn active_for(&self, agent_id: &str) -> Option<&PauseRequest> {
        self.requests
            .iter()
            .find(|r| r.agent_id == agent_id && !r.state.is_terminal())
    }

    /// Mutable access to the agent's non-terminal request.
    pub fn active_for_mut(&mut self, agent_id: &str) -> Option<&mut PauseRequest> {
        self.requests
            .iter_mut()
            .find(|r| r.agent_id == agent_id && !r.state.is_terminal())
    }

    /// The agent's most recent request of any state, preferring an active
    /// one. Used by the read-only view.
    pub fn latest_for(&self, agent_id: &str) -> Option<&PauseRequest> {
        self.active_for(agent_id).or_else(|| {
            self.requests
                .iter()
                .filter(|r| r.agent_id == agent_id)
                .max_by_key(|r| (r.requested_at, r.id))
        })
    }

    /// Request by id.
    pub fn by_id(&self, id: u64) -> Option<&PauseRequest> {
        self.requests.iter().find(|r| r.id == id)
    }
}

/// Capacity settings for one agent cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Concurrency cap: running + offered requests never exceed this.
    pub max_concurrent: u32,
    /// Informational headcount, surfaced in admin views only.
    #[serde(default)]
    pub headcount: u32,
}

/// The groups document: `group_id → capacity`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupsDoc {
    #[serde(flatten)]
    pub groups: BTreeMap<String, GroupConfig>,
}

/// Admin-editable scheduler policy.
///
/// The five documented fields come from the original console; the
/// timezone offset and retention window carry serde defaults so a config
/// document written by an older tool still parses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_short_minutes")]
    pub short_minutes: u32,
    #[serde(default = "default_long_minutes")]
    pub long_minutes: u32,
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_seconds: u32,
    #[serde(default = "default_daily_cap")]
    pub daily_cap_per_agent: u32,
    #[serde(default = "default_retention_terminal")]
    pub retention_terminal: u32,
    /// Fixed civil timezone as minutes east of UTC. Daily caps reset at
    /// local midnight in this offset.
    #[serde(default = "default_tz_offset")]
    pub civil_tz_offset_minutes: i32,
    /// Janitor window: terminal entries older than this are dropped.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_short_minutes() -> u32 {
    5
}
fn default_long_minutes() -> u32 {
    10
}
fn default_confirm_timeout() -> u32 {
    60
}
fn default_daily_cap() -> u32 {
    3
}
fn default_retention_terminal() -> u32 {
    200
}
fn default_tz_offset() -> i32 {
    60
}
fn default_retention_days() -> u32 {
    7
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            short_minutes: default_short_minutes(),
            long_minutes: default_long_minutes(),
            confirm_timeout_seconds: default_confirm_timeout(),
            daily_cap_per_agent: default_daily_cap(),
            retention_terminal: default_retention_terminal(),
            civil_tz_offset_minutes: default_tz_offset(),
            retention_days: default_retention_days(),
        }
    }
}
