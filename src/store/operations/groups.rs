use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

/// Registry entry for a group the monitor has seen traffic from.
/// Feeds the admin group list and `push_scope = all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntry {
    pub group_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Store {
    pub fn register_group(&self, group_id: &str, seen_at: DateTime<Utc>) -> Result<(), StoreError> {
        let key = keys::group_key(group_id);
        let entry = match self.groups.get(key.as_bytes())? {
            Some(raw) => {
                let mut entry: GroupEntry = Self::deserialize(&raw)?;
                entry.last_seen = seen_at;
                entry
            }
            None => GroupEntry {
                group_id: group_id.to_string(),
                first_seen: seen_at,
                last_seen: seen_at,
            },
        };
        self.groups.insert(key.as_bytes(), Self::serialize(&entry)?)?;
        Ok(())
    }

    pub fn list_groups(&self) -> Result<Vec<GroupEntry>, StoreError> {
        let mut entries = Vec::new();
        for item in self.groups.iter() {
            let (_, raw) = item?;
            match Self::deserialize::<GroupEntry>(&raw) {
                Ok(entry) => entries.push(entry),
                Err(error) => {
                    tracing::warn!(error = %error, "Skipping corrupt group entry");
                }
            }
        }
        Ok(entries)
    }
}
