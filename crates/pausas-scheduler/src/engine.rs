//! The scheduler API — the operations the console maps onto its UI.
//!
//! Every mutating operation runs inside the queue write lock: load,
//! apply, reconcile, persist. Notifications are delivered after the lock
//! is released, and the `notified` flag is recorded in a second short
//! locked write only for events the channel accepted.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;

use pausas_core::Clock;

use crate::error::{Result, SchedulerError};
use crate::janitor;
use crate::model::{DurationKind, GroupsDoc, PauseRequest, QueueDoc, RequestState, SchedulerConfig};
use crate::notify::{Notifier, SchedulerEvent};
use crate::policy;
use crate::reconcile::reconcile;
use crate::store::{CONFIG_DOC, FileStore, GROUPS_DOC, QUEUE_DOC};

/// Per-group occupancy as seen by the read-only view.
#[derive(Debug, Clone, Serialize)]
pub struct GroupStats {
    pub group_id: String,
    pub running: usize,
    pub offered: usize,
    pub waiting: usize,
    pub max_concurrent: u32,
}

/// What `view_state` returns: the agent's own request plus occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct AgentView {
    /// The agent's active request, or the most recent terminal one.
    pub request: Option<PauseRequest>,
    /// 1-based position among `WAITING` in the agent's group, when the
    /// agent is waiting.
    pub position: Option<usize>,
    pub groups: Vec<GroupStats>,
}

/// Result of one locked mutation: the caller-facing outcome plus the
/// events to deliver once the lock is gone.
type OpOutput = (Result<PauseRequest>, Vec<SchedulerEvent>);

/// The scheduler itself. Cheap to clone per worker task; all shared state
/// lives in the store.
#[derive(Clone)]
pub struct PauseScheduler {
    store: FileStore,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl PauseScheduler {
    pub fn new(store: FileStore, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            clock,
            notifier,
        }
    }

    fn load_policy(&self) -> Result<(SchedulerConfig, GroupsDoc)> {
        let config = self.store.load(CONFIG_DOC)?;
        let groups = self.store.load(GROUPS_DOC)?;
        Ok((config, groups))
    }

    /// Enqueue a new pause request for the agent.
    ///
    /// If a slot is free the request is promoted to `OFFERED` within the
    /// same cycle and the returned snapshot already reflects that.
    pub async fn request_pause(
        &self,
        agent_id: &str,
        group_id: &str,
        kind: DurationKind,
    ) -> Result<PauseRequest> {
        let now = self.clock.now();
        let (config, groups) = self.load_policy()?;

        let (result, events) = self
            .store
            .with_write_lock(QUEUE_DOC, |queue: &mut QueueDoc| -> (bool, OpOutput) {
                if let Err(e) = policy::check_eligibility(agent_id, queue, now, &config) {
                    return (false, (Err(e), Vec::new()));
                }
                let id = queue.allocate_id();
                queue
                    .requests
                    .push(PauseRequest::new(id, agent_id, group_id, kind, now));
                reconcile(queue, now, &config, &groups);
                let events = undelivered_events(queue, &config);
                (true, (snapshot(queue, id, agent_id), events))
            })?;

        self.deliver(events).await;
        result
    }

    /// Confirm a pending offer, starting the pause.
    pub async fn confirm_pause(&self, agent_id: &str) -> Result<PauseRequest> {
        let now = self.clock.now();
        let (config, groups) = self.load_policy()?;
        let confirm_timeout = Duration::seconds(i64::from(config.confirm_timeout_seconds));

        let (result, events) = self
            .store
            .with_write_lock(QUEUE_DOC, |queue: &mut QueueDoc| -> (bool, OpOutput) {
                let Some(active) = queue.active_for(agent_id) else {
                    // Confirmation after cancellation or completion.
                    let err = match queue.latest_for(agent_id) {
                        Some(latest) => SchedulerError::AlreadyTerminal {
                            agent_id: agent_id.to_string(),
                            current: Box::new(latest.clone()),
                        },
                        None => SchedulerError::NotOffered {
                            agent_id: agent_id.to_string(),
                            current: None,
                        },
                    };
                    return (false, (Err(err), Vec::new()));
                };

                if active.state != RequestState::Offered {
                    let err = SchedulerError::NotOffered {
                        agent_id: agent_id.to_string(),
                        current: Some(Box::new(active.clone())),
                    };
                    return (false, (Err(err), Vec::new()));
                }

                let id = active.id;
                let expired = active
                    .promoted_at
                    .is_some_and(|promoted| now - promoted > confirm_timeout);

                if expired {
                    // Let the reconciler cancel the stale offer and hand
                    // the slot to the next waiter in the same cycle.
                    reconcile(queue, now, &config, &groups);
                    let events = undelivered_events(queue, &config);
                    let err = match queue.by_id(id) {
                        Some(current) => SchedulerError::OfferExpired {
                            agent_id: agent_id.to_string(),
                            current: Box::new(current.clone()),
                        },
                        None => SchedulerError::NoSuchRequest {
                            agent_id: agent_id.to_string(),
                        },
                    };
                    return (true, (Err(err), events));
                }

                if let Some(req) = queue.active_for_mut(agent_id) {
                    req.state = RequestState::Running;
                    req.confirmed_at = Some(now);
                    req.started_at = Some(now);
                    req.notified = false;
                }
                reconcile(queue, now, &config, &groups);
                let events = undelivered_events(queue, &config);
                (true, (snapshot(queue, id, agent_id), events))
            })?;

        self.deliver(events).await;
        result
    }

    /// Cancel the agent's active request. Idempotent: cancelling an
    /// already-terminal request returns its current state without error.
    pub async fn cancel_pause(&self, agent_id: &str, reason: &str) -> Result<PauseRequest> {
        let now = self.clock.now();
        let (config, groups) = self.load_policy()?;

        let (result, events) = self
            .store
            .with_write_lock(QUEUE_DOC, |queue: &mut QueueDoc| -> (bool, OpOutput) {
                let Some(active) = queue.active_for_mut(agent_id) else {
                    let result = match queue.latest_for(agent_id) {
                        Some(latest) => Ok(latest.clone()),
                        None => Err(SchedulerError::NoSuchRequest {
                            agent_id: agent_id.to_string(),
                        }),
                    };
                    return (false, (result, Vec::new()));
                };

                let id = active.id;
                active.state = RequestState::Cancelled;
                active.cancel_reason = Some(reason.to_string());
                active.ended_at = Some(now);
                reconcile(queue, now, &config, &groups);
                let events = undelivered_events(queue, &config);
                (true, (snapshot(queue, id, agent_id), events))
            })?;

        self.deliver(events).await;
        result
    }

    /// Finalise a running pause early.
    pub async fn finish_pause(&self, agent_id: &str) -> Result<PauseRequest> {
        let now = self.clock.now();
        let (config, groups) = self.load_policy()?;

        let (result, events) = self
            .store
            .with_write_lock(QUEUE_DOC, |queue: &mut QueueDoc| -> (bool, OpOutput) {
                let Some(active) = queue.active_for_mut(agent_id) else {
                    let result = match queue.latest_for(agent_id) {
                        // Idempotent when the pause already completed.
                        Some(r) if r.state == RequestState::Completed => Ok(r.clone()),
                        Some(r) => Err(SchedulerError::AlreadyTerminal {
                            agent_id: agent_id.to_string(),
                            current: Box::new(r.clone()),
                        }),
                        None => Err(SchedulerError::NoSuchRequest {
                            agent_id: agent_id.to_string(),
                        }),
                    };
                    return (false, (result, Vec::new()));
                };

                if active.state != RequestState::Running {
                    let err = SchedulerError::NotRunning {
                        agent_id: agent_id.to_string(),
                        current: Box::new(active.clone()),
                    };
                    return (false, (Err(err), Vec::new()));
                }

                let id = active.id;
                active.state = RequestState::Completed;
                active.ended_at = Some(now);
                reconcile(queue, now, &config, &groups);
                let events = undelivered_events(queue, &config);
                (true, (snapshot(queue, id, agent_id), events))
            })?;

        self.deliver(events).await;
        result
    }

    /// Read-only view: no lock, no mutation. May trail a writer that just
    /// committed; every write re-reads under the lock, so that is safe.
    pub fn view_state(&self, agent_id: &str) -> Result<AgentView> {
        let queue: QueueDoc = self.store.load(QUEUE_DOC)?;
        let groups: GroupsDoc = self.store.load(GROUPS_DOC)?;

        let request = queue.latest_for(agent_id).cloned();
        let position = request
            .as_ref()
            .filter(|r| r.state == RequestState::Waiting)
            .map(|r| waiting_position(&queue, r));

        let mut group_ids: Vec<String> = groups.groups.keys().cloned().collect();
        for r in &queue.requests {
            if !group_ids.contains(&r.group_id) {
                group_ids.push(r.group_id.clone());
            }
        }
        group_ids.sort();

        let group_stats = group_ids
            .into_iter()
            .map(|group_id| {
                let count = |state: RequestState| {
                    queue
                        .requests
                        .iter()
                        .filter(|r| r.group_id == group_id && r.state == state)
                        .count()
                };
                GroupStats {
                    running: count(RequestState::Running),
                    offered: count(RequestState::Offered),
                    waiting: count(RequestState::Waiting),
                    max_concurrent: policy::slot_cap(&group_id, &groups),
                    group_id,
                }
            })
            .collect();

        Ok(AgentView {
            request,
            position,
            groups: group_stats,
        })
    }

    /// Clock-driven sweep: advance timers and promotions with no user
    /// action. Returns true when the cycle changed the queue.
    pub async fn tick(&self) -> Result<bool> {
        let now = self.clock.now();
        let (config, groups) = self.load_policy()?;

        let (changed, events) = self
            .store
            .with_write_lock(QUEUE_DOC, |queue: &mut QueueDoc| {
                let outcome = reconcile(queue, now, &config, &groups);
                if !outcome.events.is_empty() {
                    tracing::debug!("sweep promoted {} request(s)", outcome.events.len());
                }
                let events = undelivered_events(queue, &config);
                (outcome.changed, (outcome.changed, events))
            })?;

        self.deliver(events).await;
        Ok(changed)
    }

    /// Janitor pass: trim old terminal entries. Returns how many were
    /// dropped.
    pub async fn compact(&self) -> Result<usize> {
        let now = self.clock.now();
        let (config, _groups) = self.load_policy()?;

        let removed = self
            .store
            .with_write_lock(QUEUE_DOC, |queue: &mut QueueDoc| {
                let removed = janitor::compact(queue, now, &config);
                (removed > 0, removed)
            })?;
        if removed > 0 {
            tracing::info!("🧹 janitor dropped {removed} terminal request(s)");
        }
        Ok(removed)
    }

    /// Emit events outside the lock, then record which ones the channel
    /// accepted. Failures are logged and swallowed; the queue already
    /// committed and a later cycle will retry delivery.
    async fn deliver(&self, events: Vec<SchedulerEvent>) {
        if events.is_empty() {
            return;
        }
        let mut accepted: Vec<SchedulerEvent> = Vec::new();
        for event in events {
            match self.notifier.emit(&event).await {
                Ok(()) => accepted.push(event),
                Err(e) => {
                    tracing::warn!(
                        "⚠️ notification for agent {} dropped: {e}",
                        event.agent_id()
                    );
                }
            }
        }
        if accepted.is_empty() {
            return;
        }

        let marked = self
            .store
            .with_write_lock(QUEUE_DOC, |queue: &mut QueueDoc| {
                let mut changed = false;
                for event in &accepted {
                    let Some(req) = queue
                        .requests
                        .iter_mut()
                        .find(|r| r.id == event.request_id())
                    else {
                        continue;
                    };
                    // Only mark when the request is still in the state the
                    // event described; a fresher transition re-arms delivery.
                    let still_matches = matches!(
                        (event, req.state),
                        (SchedulerEvent::Offered { .. }, RequestState::Offered)
                            | (SchedulerEvent::PauseStarted { .. }, RequestState::Running)
                    );
                    if still_matches && !req.notified {
                        req.notified = true;
                        changed = true;
                    }
                }
                (changed, ())
            });
        if let Err(e) = marked {
            tracing::warn!("failed to record notification delivery: {e}");
        }
    }
}

/// Clone the request back out of the queue after a mutation.
fn snapshot(queue: &QueueDoc, id: u64, agent_id: &str) -> Result<PauseRequest> {
    queue
        .by_id(id)
        .cloned()
        .ok_or_else(|| SchedulerError::NoSuchRequest {
            agent_id: agent_id.to_string(),
        })
}

/// Events whose delivery has not been recorded yet: fresh promotions plus
/// anything a crashed worker never managed to send.
fn undelivered_events(queue: &QueueDoc, config: &SchedulerConfig) -> Vec<SchedulerEvent> {
    let confirm_timeout = Duration::seconds(i64::from(config.confirm_timeout_seconds));
    queue
        .requests
        .iter()
        .filter(|r| !r.notified)
        .filter_map(|r| match r.state {
            RequestState::Offered => r.promoted_at.map(|promoted| SchedulerEvent::Offered {
                agent_id: r.agent_id.clone(),
                request_id: r.id,
                deadline: promoted + confirm_timeout,
            }),
            RequestState::Running => r.started_at.map(|started| {
                let minutes = policy::duration_minutes(r.duration_kind, config);
                SchedulerEvent::PauseStarted {
                    agent_id: r.agent_id.clone(),
                    request_id: r.id,
                    ends_at: started + Duration::minutes(i64::from(minutes)),
                }
            }),
            _ => None,
        })
        .collect()
}

/// 1-based position of a waiting request among the waiters of its group.
fn waiting_position(queue: &QueueDoc, request: &PauseRequest) -> usize {
    queue
        .requests
        .iter()
        .filter(|r| r.group_id == request.group_id && r.state == RequestState::Waiting)
        .filter(|r| (r.requested_at, r.id) < (request.requested_at, request.id))
        .count()
        + 1
}
