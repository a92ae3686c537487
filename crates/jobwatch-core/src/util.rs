use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Render a timestamp in `tz` as `YYYY-MM-DD hh:mm:ss AM`.
pub fn format_timestamp(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%Y-%m-%d %I:%M:%S %p").to_string()
}

/// Truncate to at most `max_len` characters, ending in `...` when cut.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}
