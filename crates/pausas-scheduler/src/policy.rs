//! Policy — pure functions over config and groups. No I/O, no clock
//! access; `now` always arrives as an argument.

use chrono::{DateTime, Duration, FixedOffset, Offset, TimeZone, Utc};

use crate::error::SchedulerError;
use crate::model::{DurationKind, GroupsDoc, QueueDoc, RequestState, SchedulerConfig};

/// Pause length in minutes for the given kind.
pub fn duration_minutes(kind: DurationKind, config: &SchedulerConfig) -> u32 {
    match kind {
        DurationKind::Short => config.short_minutes,
        DurationKind::Long => config.long_minutes,
    }
}

/// Concurrency cap for a group. Unknown groups get a single slot.
pub fn slot_cap(group_id: &str, groups: &GroupsDoc) -> u32 {
    groups
        .groups
        .get(group_id)
        .map(|g| g.max_concurrent.max(1))
        .unwrap_or(1)
}

/// The civil-day window `[start, end)` containing `now`, computed in the
/// configured fixed offset and returned in UTC.
pub fn civil_day_bounds(now: DateTime<Utc>, offset_minutes: i32) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = FixedOffset::east_opt(offset_minutes * 60)
        .unwrap_or_else(|| Utc.fix());
    let local_midnight = now
        .with_timezone(&offset)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default();
    let start = offset
        .from_local_datetime(&local_midnight)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now);
    (start, start + Duration::days(1))
}

/// How many pauses the agent has consumed in the civil day containing
/// `now`: COMPLETED requests plus CANCELLED ones that had reached
/// RUNNING. Cancelled-before-run never counts.
pub fn today_counter(
    agent_id: &str,
    queue: &QueueDoc,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> u32 {
    let (start, end) = civil_day_bounds(now, config.civil_tz_offset_minutes);
    queue
        .requests
        .iter()
        .filter(|r| r.agent_id == agent_id)
        .filter(|r| match r.state {
            RequestState::Completed => true,
            RequestState::Cancelled => r.started_at.is_some(),
            _ => false,
        })
        .filter(|r| {
            let when = r.ended_at.unwrap_or(r.requested_at);
            start <= when && when < end
        })
        .count() as u32
}

/// Whether the agent may enqueue a new request right now.
pub fn check_eligibility(
    agent_id: &str,
    queue: &QueueDoc,
    now: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Result<(), SchedulerError> {
    if let Some(active) = queue.active_for(agent_id) {
        return Err(SchedulerError::AlreadyActive {
            agent_id: agent_id.to_string(),
            current: Box::new(active.clone()),
        });
    }
    if today_counter(agent_id, queue, now, config) >= config.daily_cap_per_agent {
        return Err(SchedulerError::DailyCapReached {
            agent_id: agent_id.to_string(),
            cap: config.daily_cap_per_agent,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PauseRequest;
    use chrono::TimeZone;

    fn config() -> SchedulerConfig {
        SchedulerConfig::default()
    }

    fn completed(id: u64, agent: &str, ended_at: DateTime<Utc>) -> PauseRequest {
        let mut r = PauseRequest::new(id, agent, "g1", DurationKind::Short, ended_at);
        r.state = RequestState::Completed;
        r.started_at = Some(ended_at);
        r.ended_at = Some(ended_at);
        r
    }

    #[test]
    fn durations_follow_config() {
        let mut config = config();
        config.short_minutes = 5;
        config.long_minutes = 12;
        assert_eq!(duration_minutes(DurationKind::Short, &config), 5);
        assert_eq!(duration_minutes(DurationKind::Long, &config), 12);
    }

    #[test]
    fn unknown_group_gets_one_slot() {
        let groups = GroupsDoc::default();
        assert_eq!(slot_cap("nowhere", &groups), 1);
    }

    #[test]
    fn zero_cap_is_clamped_to_one() {
        let mut groups = GroupsDoc::default();
        groups.groups.insert(
            "g1".into(),
            crate::model::GroupConfig {
                max_concurrent: 0,
                headcount: 4,
            },
        );
        assert_eq!(slot_cap("g1", &groups), 1);
    }

    #[test]
    fn civil_day_respects_offset() {
        // 23:30 UTC on the 10th is already the 11th at +60 east.
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 23, 30, 0).unwrap();
        let (start, end) = civil_day_bounds(now, 60);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 2, 10, 23, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 2, 11, 23, 0, 0).unwrap());
    }

    #[test]
    fn counter_excludes_cancelled_before_run() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let mut queue = QueueDoc::default();
        queue.requests.push(completed(1, "a1", now));
        let mut never_ran = PauseRequest::new(2, "a1", "g1", DurationKind::Short, now);
        never_ran.state = RequestState::Cancelled;
        never_ran.ended_at = Some(now);
        queue.requests.push(never_ran);
        let mut ran_then_cancelled = PauseRequest::new(3, "a1", "g1", DurationKind::Short, now);
        ran_then_cancelled.state = RequestState::Cancelled;
        ran_then_cancelled.started_at = Some(now);
        ran_then_cancelled.ended_at = Some(now);
        queue.requests.push(ran_then_cancelled);

        assert_eq!(today_counter("a1", &queue, now, &config()), 2);
    }

    #[test]
    fn counter_ignores_yesterday() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let yesterday = now - Duration::days(1);
        let mut queue = QueueDoc::default();
        queue.requests.push(completed(1, "a1", yesterday));
        assert_eq!(today_counter("a1", &queue, now, &config()), 0);
    }

    #[test]
    fn eligibility_rejects_active_then_cap() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let mut config = config();
        config.daily_cap_per_agent = 1;

        let mut queue = QueueDoc::default();
        queue
            .requests
            .push(PauseRequest::new(1, "a1", "g1", DurationKind::Short, now));
        assert!(matches!(
            check_eligibility("a1", &queue, now, &config),
            Err(SchedulerError::AlreadyActive { .. })
        ));

        let mut queue = QueueDoc::default();
        queue.requests.push(completed(1, "a1", now));
        assert!(matches!(
            check_eligibility("a1", &queue, now, &config),
            Err(SchedulerError::DailyCapReached { cap: 1, .. })
        ));

        assert!(check_eligibility("a2", &queue, now, &config).is_ok());
    }
}
