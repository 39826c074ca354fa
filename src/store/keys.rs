use chrono::NaiveDate;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Activity counter key: `{group}:{YYYY-MM-DD}:{user}`.
///
/// ISO 日期定长且按字典序排序，同一群组内的 key 天然按日期有序，
/// 日期范围查询可以直接用 sled range 扫描。
pub fn activity_key(group_id: &str, date: NaiveDate, user_id: &str) -> String {
    format!("{}:{}:{}", group_id, date.format(DATE_FORMAT), user_id)
}

pub fn activity_date_prefix(group_id: &str, date: NaiveDate) -> String {
    format!("{}:{}:", group_id, date.format(DATE_FORMAT))
}

/// Parse `(group_id, date, user_id)` back out of an activity key.
/// Returns `None` for malformed keys, which callers skip.
pub fn parse_activity_key(key: &[u8]) -> Option<(String, NaiveDate, String)> {
    let text = std::str::from_utf8(key).ok()?;
    let mut parts = text.splitn(3, ':');
    let group_id = parts.next()?;
    let date = NaiveDate::parse_from_str(parts.next()?, DATE_FORMAT).ok()?;
    let user_id = parts.next()?;
    if group_id.is_empty() || user_id.is_empty() {
        return None;
    }
    Some((group_id.to_string(), date, user_id.to_string()))
}

pub fn presence_key(group_id: &str, user_id: &str) -> String {
    format!("{}:{}", group_id, user_id)
}

pub fn presence_group_prefix(group_id: &str) -> String {
    format!("{}:", group_id)
}

pub fn group_key(group_id: &str) -> String {
    group_id.to_string()
}

pub fn config_latest_key(config_type: &str) -> String {
    format!("{}:latest", config_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn activity_keys_order_by_date_within_group() {
        let k_old = activity_key("g1", date(2024, 5, 9), "u1");
        let k_new = activity_key("g1", date(2024, 5, 10), "u1");
        assert!(k_old < k_new);
    }

    #[test]
    fn activity_key_round_trips() {
        let key = activity_key("g1", date(2024, 5, 10), "u42");
        let (group, parsed_date, user) = parse_activity_key(key.as_bytes()).unwrap();
        assert_eq!(group, "g1");
        assert_eq!(parsed_date, date(2024, 5, 10));
        assert_eq!(user, "u42");
    }

    #[test]
    fn malformed_activity_keys_are_rejected() {
        assert!(parse_activity_key(b"no-separators").is_none());
        assert!(parse_activity_key(b"g1:not-a-date:u1").is_none());
        assert!(parse_activity_key(b"g1:2024-05-10:").is_none());
    }
}
