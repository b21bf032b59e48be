//! HiPS date strings.

use chrono::{NaiveDate, NaiveDateTime};

/// Modified Julian Date of the Unix epoch.
const MJD_UNIX_EPOCH: f64 = 40587.0;

const SECONDS_PER_DAY: f64 = 86400.0;

/// Parse a HiPS date (`2019-01-02T15:27Z`) into a Modified Julian Date.
///
/// Seconds and a bare date are also accepted. Anything else yields `0.0`,
/// which callers treat as "unknown".
pub fn parse_date(s: &str) -> f64 {
    let s = s.trim();
    let datetime = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%MZ")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        });

    match datetime {
        Ok(dt) => dt.and_utc().timestamp() as f64 / SECONDS_PER_DAY + MJD_UNIX_EPOCH,
        Err(_) => 0.0,
    }
}
