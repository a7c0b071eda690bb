//! Time helpers for business-timezone conversion.
//!
//! Date/time conversion happens at the handler and service layer; the
//! repository layer only ever sees `i64` Unix millis.

use chrono::{NaiveDate, TimeZone};
use chrono_tz::Tz;

use super::{AppError, AppResult};

/// Parse a date string (YYYY-MM-DD).
pub fn parse_date(date: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("Invalid date format: {}", date)))
}

/// Today's date in the business timezone.
pub fn today(tz: Tz) -> NaiveDate {
    chrono::Utc::now().with_timezone(&tz).date_naive()
}

/// Start of a date (00:00:00) as Unix millis in the business timezone.
///
/// DST gap fallback: if local midnight does not exist, fall back to UTC.
pub fn day_start_millis(date: NaiveDate, tz: Tz) -> i64 {
    let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    tz.from_local_datetime(&naive)
        .latest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| naive.and_utc().timestamp_millis())
}

/// End of a date as the next day's 00:00:00 Unix millis. Callers use the
/// exclusive `< end` convention.
pub fn day_end_millis(date: NaiveDate, tz: Tz) -> i64 {
    let next_day = date.succ_opt().unwrap_or(date);
    day_start_millis(next_day, tz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_dates() {
        assert!(parse_date("2026-08-27").is_ok());
        assert!(parse_date("27/08/2026").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn day_bounds_are_24h_apart_outside_dst() {
        let tz: Tz = "America/Mexico_City".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 8, 27).unwrap();
        let start = day_start_millis(date, tz);
        let end = day_end_millis(date, tz);
        assert_eq!(end - start, 24 * 60 * 60 * 1000);
    }
}
