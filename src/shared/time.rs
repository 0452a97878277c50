use chrono::{SecondsFormat, Utc};

/// Current UTC instant as ISO-8601 with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
