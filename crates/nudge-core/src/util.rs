//! Shared utility functions used across multiple modules.

use chrono::{DateTime, Utc};

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Convert epoch milliseconds into a UTC instant, clamping out-of-range values to the epoch.
pub fn instant_from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Render an offset in milliseconds as a short human duration (`1h`, `1day`).
pub fn describe_offset(offset_millis: i64) -> String {
    let millis = u64::try_from(offset_millis.max(0)).unwrap_or_default();
    humantime::format_duration(std::time::Duration::from_millis(millis)).to_string()
}
