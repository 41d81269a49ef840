//! Expiry timestamps
//!
//! The authorization server reports absolute expiries as
//! `2018-08-23 18:45:29Z`. RFC 3339 is accepted too. Relative lifetimes
//! (`expires_in`) are whole seconds.

use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Utc};

const SERVER_FORMAT: &str = "%Y-%m-%d %H:%M:%SZ";
const SERVER_FORMAT_NO_ZONE: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a server-reported expiry. Returns `None` for anything unrecognized.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    [SERVER_FORMAT, SERVER_FORMAT_NO_ZONE]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Render an expiry in the server's format.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(SERVER_FORMAT).to_string()
}

/// `now + seconds`, or `None` if the lifetime does not fit a timestamp.
pub fn expires_after(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    now.checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

/// Expired means the clock has reached the expiry; the boundary instant counts.
pub fn is_expired_at(expires_at: &DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= *expires_at
}
