//! The reconciler — a pure transition function that advances the whole
//! queue from one consistent state to the next.
//!
//! Every API operation and every sweep runs this after its own mutation,
//! always in the same step order: expire overdue offers, complete elapsed
//! runs, then promote waiters into the slots both steps just freed.
//! Calling it twice with the same `now` changes nothing the second time.

use chrono::{DateTime, Duration, Utc};

use crate::model::{GroupsDoc, QueueDoc, RequestState, SchedulerConfig};
use crate::notify::SchedulerEvent;
use crate::policy;

/// Reason recorded on offers the reconciler cancels.
pub const OFFER_EXPIRED_REASON: &str = "offer_expired";

/// What one reconcile cycle did.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// True when any request changed state; callers persist iff set.
    pub changed: bool,
    /// `Offered` events for requests promoted in this cycle.
    pub events: Vec<SchedulerEvent>,
}

/// Advance the queue to `now`.
pub fn reconcile(
    queue: &mut QueueDoc,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
    groups: &GroupsDoc,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();
    let confirm_timeout = Duration::seconds(i64::from(config.confirm_timeout_seconds));

    // Step 1: expire offers whose confirmation window has passed. Strictly
    // greater: a confirmation arriving exactly at the deadline still wins.
    for req in &mut queue.requests {
        if req.state != RequestState::Offered {
            continue;
        }
        let Some(promoted_at) = req.promoted_at else {
            continue;
        };
        if now - promoted_at > confirm_timeout {
            req.state = RequestState::Cancelled;
            req.cancel_reason = Some(OFFER_EXPIRED_REASON.to_string());
            req.ended_at = Some(now);
            outcome.changed = true;
            tracing::info!(
                request_id = req.id,
                agent_id = %req.agent_id,
                "offer expired without confirmation"
            );
        }
    }

    // Step 2: complete runs whose duration has elapsed. Inclusive boundary:
    // a pause started at t with duration d completes at t + d exactly.
    for req in &mut queue.requests {
        if req.state != RequestState::Running {
            continue;
        }
        let Some(started_at) = req.started_at else {
            continue;
        };
        let duration =
            Duration::minutes(i64::from(policy::duration_minutes(req.duration_kind, config)));
        if now - started_at >= duration {
            req.state = RequestState::Completed;
            req.ended_at = Some(started_at + duration);
            outcome.changed = true;
            tracing::info!(
                request_id = req.id,
                agent_id = %req.agent_id,
                "pause completed"
            );
        }
    }

    // Step 3: promote waiters, group by group, FIFO on requested_at with
    // id as the tie-break. Groups are independent of each other.
    let mut group_ids: Vec<String> = queue
        .requests
        .iter()
        .filter(|r| r.state == RequestState::Waiting)
        .map(|r| r.group_id.clone())
        .collect();
    group_ids.sort();
    group_ids.dedup();

    for group_id in group_ids {
        let cap = policy::slot_cap(&group_id, groups);
        let used = queue
            .requests
            .iter()
            .filter(|r| r.group_id == group_id && r.state.holds_slot())
            .count();
        let free = (cap as usize).saturating_sub(used);
        if free == 0 {
            continue;
        }

        let mut waiting: Vec<usize> = queue
            .requests
            .iter()
            .enumerate()
            .filter(|(_, r)| r.group_id == group_id && r.state == RequestState::Waiting)
            .map(|(i, _)| i)
            .collect();
        waiting.sort_by_key(|&i| (queue.requests[i].requested_at, queue.requests[i].id));

        for &i in waiting.iter().take(free) {
            let req = &mut queue.requests[i];
            req.state = RequestState::Offered;
            req.promoted_at = Some(now);
            req.notified = false;
            outcome.changed = true;
            let deadline = now + confirm_timeout;
            outcome.events.push(SchedulerEvent::Offered {
                agent_id: req.agent_id.clone(),
                request_id: req.id,
                deadline,
            });
            tracing::info!(
                request_id = req.id,
                agent_id = %req.agent_id,
                group_id = %group_id,
                %deadline,
                "waiter promoted to offer"
            );
        }
    }

    outcome
}
