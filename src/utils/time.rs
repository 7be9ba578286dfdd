use chrono::{DateTime, Utc};

/// Current UTC timestamp in RFC3339, the format used by every persisted record.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Current UNIX time in milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Milliseconds elapsed since an RFC3339 timestamp, or `None` if it does not parse.
pub fn millis_since(rfc3339: &str) -> Option<i64> {
    let parsed = DateTime::parse_from_rfc3339(rfc3339).ok()?;
    Some(Utc::now().timestamp_millis() - parsed.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_since() {
        let past = (Utc::now() - chrono::Duration::seconds(2)).to_rfc3339();
        let elapsed = millis_since(&past).unwrap();
        assert!(elapsed >= 2000);

        assert!(millis_since("not a timestamp").is_none());
    }
}
