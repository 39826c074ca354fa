use crate::constants::MAX_ID_LENGTH;

/// Parsed `HH:MM` time-of-day for the daily report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushTime {
    pub hour: u8,
    pub minute: u8,
}

/// Parse a `HH:MM` push time. Hour must be in [0,23], minute in [0,59].
pub fn parse_push_time(raw: &str) -> Option<PushTime> {
    let (h, m) = raw.trim().split_once(':')?;
    let hour = h.parse::<u8>().ok()?;
    let minute = m.parse::<u8>().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(PushTime { hour, minute })
}

/// Normalize an opaque group/user identifier.
///
/// 标识符作为 sled key 的分段使用，不允许包含分隔符 `:`。
pub fn normalize_id(raw: &str) -> Option<String> {
    let id = raw.trim();
    if id.is_empty() || id.len() > MAX_ID_LENGTH || id.contains(':') {
        return None;
    }
    Some(id.to_string())
}

/// Coerce an arbitrary JSON value into a normalized group-id set.
/// Non-list input (or a missing field) becomes the empty set.
pub fn coerce_group_list(value: &serde_json::Value) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    let mut groups: Vec<String> = items
        .iter()
        .filter_map(|item| match item {
            serde_json::Value::String(s) => normalize_id(s),
            serde_json::Value::Number(n) => normalize_id(&n.to_string()),
            _ => None,
        })
        .collect();
    groups.sort();
    groups.dedup();
    groups
}
