//! Notification events and the delivery seam.
//!
//! Delivery is best-effort and happens outside the store lock: the
//! scheduler never blocks on a channel and never fails an operation
//! because a notification did not go out. The `notified` flag on a
//! request is recorded only after `emit` returns `Ok`, so delivery is
//! at-least-once — an offer may be re-notified after a crash.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Events delivered to an agent's UI session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// A slot is held for the agent; confirm before `deadline` or lose it.
    Offered {
        agent_id: String,
        request_id: u64,
        deadline: DateTime<Utc>,
    },
    /// The pause is running and ends at `ends_at`.
    PauseStarted {
        agent_id: String,
        request_id: u64,
        ends_at: DateTime<Utc>,
    },
}

impl SchedulerEvent {
    /// The request this event is about.
    pub fn request_id(&self) -> u64 {
        match self {
            Self::Offered { request_id, .. } | Self::PauseStarted { request_id, .. } => *request_id,
        }
    }

    /// The agent this event is addressed to.
    pub fn agent_id(&self) -> &str {
        match self {
            Self::Offered { agent_id, .. } | Self::PauseStarted { agent_id, .. } => agent_id,
        }
    }
}

/// Fire-and-forget delivery channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one event. `Ok(())` means the channel accepted it; errors
    /// are logged and swallowed by the caller.
    async fn emit(&self, event: &SchedulerEvent) -> Result<(), String>;
}

/// Notifier that only writes to the log. Default when no webhook target
/// is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn emit(&self, event: &SchedulerEvent) -> Result<(), String> {
        match event {
            SchedulerEvent::Offered {
                agent_id, deadline, ..
            } => {
                tracing::info!("🔔 offer for agent {agent_id}, confirm before {deadline}");
            }
            SchedulerEvent::PauseStarted {
                agent_id, ends_at, ..
            } => {
                tracing::info!("▶️ pause started for agent {agent_id}, ends at {ends_at}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn events_serialize_with_type_tag() {
        let ev = SchedulerEvent::Offered {
            agent_id: "a1".into(),
            request_id: 7,
            deadline: Utc.with_ymd_and_hms(2026, 2, 10, 9, 1, 0).unwrap(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "offered");
        assert_eq!(json["agent_id"], "a1");
        assert_eq!(json["request_id"], 7);
    }
}
