use crate::store::keys;
use crate::store::{Store, StoreError};

fn decode_millis(raw: &[u8]) -> i64 {
    match raw.try_into() {
        Ok(bytes) => i64::from_be_bytes(bytes),
        Err(_) => 0,
    }
}

impl Store {
    /// Record that a user was just seen in a group (message timestamp in
    /// epoch millis). Overwrites any previous last-seen value.
    pub fn touch_presence(
        &self,
        group_id: &str,
        user_id: &str,
        seen_at_ms: i64,
    ) -> Result<(), StoreError> {
        let key = keys::presence_key(group_id, user_id);
        self.presence
            .insert(key.as_bytes(), &seen_at_ms.to_be_bytes())?;
        Ok(())
    }

    /// Count distinct users in a group whose last message is at or after
    /// `cutoff_ms`. This is the "online" approximation.
    pub fn online_count(&self, group_id: &str, cutoff_ms: i64) -> Result<u64, StoreError> {
        let prefix = keys::presence_group_prefix(group_id);
        let mut count = 0u64;
        for item in self.presence.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            if decode_millis(&value) >= cutoff_ms {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Drop presence entries last seen before `cutoff_ms` (retention).
    pub fn purge_presence_older_than(&self, cutoff_ms: i64) -> Result<u64, StoreError> {
        let mut stale = Vec::new();
        for item in self.presence.iter() {
            let (key, value) = item?;
            if decode_millis(&value) < cutoff_ms {
                stale.push(key);
            }
        }

        let mut removed = 0u64;
        for key in stale {
            if self.presence.remove(&key)?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
