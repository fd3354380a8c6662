use chrono::{DateTime, NaiveDate, Utc};

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn to_date(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Calendar date for "today" in UTC. Age and export rendering key off this.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Render an epoch-ms timestamp as `YYYY-MM-DD` for exports.
pub fn format_ms_date(ms: i64) -> String {
    to_date(ms).date_naive().format("%Y-%m-%d").to_string()
}
