use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

/// One (group, user, calendar day) counter. The triple is the primary key;
/// `message_count` only grows while the day is current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub group_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub message_count: u64,
}

fn decode_count(raw: &[u8]) -> u64 {
    match raw.try_into() {
        Ok(bytes) => u64::from_be_bytes(bytes),
        Err(_) => 0,
    }
}

impl Store {
    /// Add 1 to the counter for `(group_id, user_id, date)`, creating the
    /// record on first message. Returns the new count.
    ///
    /// `update_and_fetch` 对单 key 做 CAS 循环，并发自增不会丢更新。
    pub fn increment_activity(
        &self,
        group_id: &str,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<u64, StoreError> {
        let key = keys::activity_key(group_id, date, user_id);
        let raw = self.activity.update_and_fetch(key.as_bytes(), |old| {
            let count = old.map(decode_count).unwrap_or(0).saturating_add(1);
            Some(count.to_be_bytes().to_vec())
        })?;
        Ok(raw.as_deref().map(decode_count).unwrap_or(0))
    }

    /// All records for a group in the inclusive date range. No ordering
    /// guarantee beyond what the key layout happens to produce.
    pub fn query_activity_range(
        &self,
        group_id: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        let start = keys::activity_date_prefix(group_id, date_from);
        let mut records = Vec::new();

        for item in self.activity.range(start.as_bytes()..) {
            let (key, value) = item?;
            let Some((group, date, user)) = keys::parse_activity_key(&key) else {
                continue;
            };
            if group != group_id || date > date_to {
                break;
            }
            records.push(ActivityRecord {
                group_id: group,
                user_id: user,
                date,
                message_count: decode_count(&value),
            });
        }

        Ok(records)
    }

    pub fn query_activity_day(
        &self,
        group_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        self.query_activity_range(group_id, date, date)
    }

    /// Delete all activity records with `date < cutoff_date`, across all
    /// groups. The cutoff is always strictly in the past, so a purge never
    /// races with an increment for a still-current day on the same key.
    /// Returns the number of removed records.
    pub fn purge_activity_older_than(&self, cutoff_date: NaiveDate) -> Result<u64, StoreError> {
        let mut stale = Vec::new();
        for item in self.activity.iter() {
            let (key, _) = item?;
            match keys::parse_activity_key(&key) {
                Some((_, date, _)) if date < cutoff_date => stale.push(key),
                Some(_) => {}
                // 无法解析的 key 一并清除，避免脏数据永久残留
                None => stale.push(key),
            }
        }

        let mut removed = 0u64;
        for key in stale {
            if self.activity.remove(&key)?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
