//! Janitor — periodic compaction of the queue document.
//!
//! Terminal entries are history, not state: the scheduler only needs
//! enough of them to answer today's daily-cap question. The janitor drops
//! everything older than the retention window and keeps at most
//! `retention_terminal` recent entries per terminal state. Non-terminal
//! entries are never touched.

use chrono::{DateTime, Duration, Utc};

use crate::model::{QueueDoc, RequestState, SchedulerConfig};

/// Trim old terminal entries in place. Returns how many were removed.
pub fn compact(queue: &mut QueueDoc, now: DateTime<Utc>, config: &SchedulerConfig) -> usize {
    let cutoff = now - Duration::days(i64::from(config.retention_days));
    let cap = config.retention_terminal as usize;

    let mut keep_ids: Vec<u64> = Vec::new();
    for state in [RequestState::Completed, RequestState::Cancelled] {
        let mut entries: Vec<(DateTime<Utc>, u64)> = queue
            .requests
            .iter()
            .filter(|r| r.state == state)
            .map(|r| (r.ended_at.unwrap_or(r.requested_at), r.id))
            .filter(|(when, _)| *when >= cutoff)
            .collect();
        // Newest first, keep the cap's worth.
        entries.sort_by(|a, b| b.cmp(a));
        keep_ids.extend(entries.into_iter().take(cap).map(|(_, id)| id));
    }

    let before = queue.requests.len();
    queue
        .requests
        .retain(|r| !r.state.is_terminal() || keep_ids.contains(&r.id));
    before - queue.requests.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DurationKind, PauseRequest};
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn terminal(id: u64, state: RequestState, ended_at: DateTime<Utc>) -> PauseRequest {
        let mut r = PauseRequest::new(id, &format!("a{id}"), "g1", DurationKind::Short, ended_at);
        r.state = state;
        r.ended_at = Some(ended_at);
        r
    }

    #[test]
    fn drops_entries_beyond_the_window() {
        let mut config = SchedulerConfig::default();
        config.retention_days = 7;
        let mut queue = QueueDoc::default();
        queue.requests.push(terminal(
            1,
            RequestState::Completed,
            t(0) - Duration::days(8),
        ));
        queue
            .requests
            .push(terminal(2, RequestState::Completed, t(0) - Duration::days(1)));

        let removed = compact(&mut queue, t(0), &config);
        assert_eq!(removed, 1);
        assert_eq!(queue.requests.len(), 1);
        assert_eq!(queue.requests[0].id, 2);
    }

    #[test]
    fn caps_recent_entries_per_terminal_state() {
        let mut config = SchedulerConfig::default();
        config.retention_terminal = 2;
        let mut queue = QueueDoc::default();
        for id in 1..=4 {
            queue
                .requests
                .push(terminal(id, RequestState::Completed, t(id as i64)));
        }
        for id in 5..=7 {
            queue
                .requests
                .push(terminal(id, RequestState::Cancelled, t(id as i64)));
        }

        let removed = compact(&mut queue, t(100), &config);
        assert_eq!(removed, 3);
        let ids: Vec<u64> = queue.requests.iter().map(|r| r.id).collect();
        // Two newest per state survive.
        assert_eq!(ids, vec![3, 4, 6, 7]);
    }

    #[test]
    fn never_touches_non_terminal_entries() {
        let mut config = SchedulerConfig::default();
        config.retention_terminal = 0;
        config.retention_days = 0;
        let mut queue = QueueDoc::default();
        let ancient = t(0) - Duration::days(365);
        queue
            .requests
            .push(PauseRequest::new(1, "a1", "g1", DurationKind::Short, ancient));
        let mut running = PauseRequest::new(2, "a2", "g1", DurationKind::Short, ancient);
        running.state = RequestState::Running;
        running.started_at = Some(ancient);
        queue.requests.push(running);
        queue.requests.push(terminal(3, RequestState::Completed, t(0)));

        let removed = compact(&mut queue, t(0), &config);
        assert_eq!(removed, 1);
        assert_eq!(queue.requests.len(), 2);
        assert!(queue.requests.iter().all(|r| !r.state.is_terminal()));
    }
}
