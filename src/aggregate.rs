use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::store::{Store, StoreError};

/// Windowed per-group activity summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub active_user_count: usize,
    /// `(user_id, total_count)` sorted by count descending, ties broken by
    /// user_id ascending so repeated calls are deterministic.
    pub ranked_members: Vec<(String, u64)>,
}

/// Same-day aggregate for "today so far" style queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySnapshot {
    /// Distinct users with at least one message (no min-messages filter).
    pub active_user_count: usize,
    pub total_message_count: u64,
}

/// Sum per-user message counts over the calendar days intersecting
/// `[now - window_hours, now]`, keep users with at least `min_messages`,
/// and rank them. A group with no records in range yields an empty summary.
pub fn summarize(
    store: &Store,
    group_id: &str,
    window_hours: u32,
    min_messages: u64,
    now: NaiveDateTime,
) -> Result<GroupSummary, StoreError> {
    let start_date = (now - Duration::hours(i64::from(window_hours))).date();
    let records = store.query_activity_range(group_id, start_date, now.date())?;

    let mut totals: HashMap<String, u64> = HashMap::new();
    for record in records {
        *totals.entry(record.user_id).or_insert(0) += record.message_count;
    }

    let mut ranked_members: Vec<(String, u64)> = totals
        .into_iter()
        .filter(|(_, count)| *count >= min_messages)
        .collect();
    ranked_members.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Ok(GroupSummary {
        active_user_count: ranked_members.len(),
        ranked_members,
    })
}

pub fn snapshot_for_day(
    store: &Store,
    group_id: &str,
    date: NaiveDate,
) -> Result<DaySnapshot, StoreError> {
    let records = store.query_activity_day(group_id, date)?;
    let total_message_count = records.iter().map(|r| r.message_count).sum();
    let active_user_count = records.iter().filter(|r| r.message_count > 0).count();

    Ok(DaySnapshot {
        active_user_count,
        total_message_count,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn open_store(name: &str) -> (tempfile::TempDir, Store) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Store::open(tmp.path().join(name).to_str().unwrap()).expect("open store");
        (tmp, store)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bump(store: &Store, group: &str, user: &str, day: NaiveDate, times: u64) {
        for _ in 0..times {
            store.increment_activity(group, user, day).unwrap();
        }
    }

    #[test]
    fn filters_below_min_messages() {
        let (_tmp, store) = open_store("agg_filter.sled");
        let today = date(2024, 5, 10);
        bump(&store, "g", "u1", today, 5);
        bump(&store, "g", "u2", today, 2);

        let now = today.and_hms_opt(12, 0, 0).unwrap();
        let summary = summarize(&store, "g", 24, 3, now).unwrap();

        assert_eq!(summary.active_user_count, 1);
        assert_eq!(summary.ranked_members, vec![("u1".to_string(), 5)]);
    }

    #[test]
    fn ranks_by_count_desc_then_user_asc() {
        let (_tmp, store) = open_store("agg_rank.sled");
        let today = date(2024, 5, 10);
        bump(&store, "g", "c", today, 5);
        bump(&store, "g", "a", today, 5);
        bump(&store, "g", "b", today, 5);
        bump(&store, "g", "z", today, 9);

        let now = today.and_hms_opt(12, 0, 0).unwrap();
        let summary = summarize(&store, "g", 24, 1, now).unwrap();

        assert_eq!(
            summary.ranked_members,
            vec![
                ("z".to_string(), 9),
                ("a".to_string(), 5),
                ("b".to_string(), 5),
                ("c".to_string(), 5),
            ]
        );
    }

    #[test]
    fn sums_across_days_in_window() {
        let (_tmp, store) = open_store("agg_sum.sled");
        bump(&store, "g", "u1", date(2024, 5, 9), 2);
        bump(&store, "g", "u1", date(2024, 5, 10), 2);

        let now = date(2024, 5, 10).and_hms_opt(12, 0, 0).unwrap();
        let summary = summarize(&store, "g", 48, 3, now).unwrap();

        assert_eq!(summary.ranked_members, vec![("u1".to_string(), 4)]);
    }

    #[test]
    fn window_edge_day_is_included_one_day_older_is_not() {
        let (_tmp, store) = open_store("agg_edge.sled");
        bump(&store, "g", "edge", date(2024, 5, 9), 3);
        bump(&store, "g", "older", date(2024, 5, 8), 3);

        // now 为 5 月 10 日零点，24h 窗口边界恰好落在 5 月 9 日零点：
        // 边界日 5/9 计入，再早一秒已属 5/8，排除。
        let now = date(2024, 5, 10).and_hms_opt(0, 0, 0).unwrap();
        let summary = summarize(&store, "g", 24, 1, now).unwrap();

        assert_eq!(summary.ranked_members, vec![("edge".to_string(), 3)]);
    }

    #[test]
    fn empty_group_yields_empty_summary() {
        let (_tmp, store) = open_store("agg_empty.sled");
        let now = date(2024, 5, 10).and_hms_opt(12, 0, 0).unwrap();
        let summary = summarize(&store, "ghost", 24, 3, now).unwrap();

        assert_eq!(summary.active_user_count, 0);
        assert!(summary.ranked_members.is_empty());
    }

    #[test]
    fn summarize_is_idempotent_without_new_increments() {
        let (_tmp, store) = open_store("agg_idem.sled");
        let today = date(2024, 5, 10);
        bump(&store, "g", "u1", today, 4);
        bump(&store, "g", "u2", today, 3);

        let now = today.and_hms_opt(12, 0, 0).unwrap();
        let first = summarize(&store, "g", 24, 3, now).unwrap();
        let second = summarize(&store, "g", 24, 3, now).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn day_snapshot_counts_distinct_users_and_totals() {
        let (_tmp, store) = open_store("agg_snapshot.sled");
        let today = date(2024, 5, 10);
        bump(&store, "g", "u1", today, 5);
        bump(&store, "g", "u2", today, 1);
        bump(&store, "g", "u3", date(2024, 5, 9), 4);

        let snapshot = snapshot_for_day(&store, "g", today).unwrap();
        assert_eq!(snapshot.active_user_count, 2);
        assert_eq!(snapshot.total_message_count, 6);
    }
}
