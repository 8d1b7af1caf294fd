//! Calendar-day helpers
//!
//! Every daily aggregate is keyed by a calendar date. Which date a unix
//! timestamp falls on depends on the configured zone, so all date math goes
//! through [`Calendar`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, Utc};
use chrono_tz::Tz;

/// Date format used for every `date` column
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time zone that defines calendar-day boundaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Calendar {
    /// The host's local zone
    #[default]
    Local,
    Zone(Tz),
}

impl Calendar {
    pub fn utc() -> Self {
        Self::Zone(Tz::UTC)
    }

    /// Calendar date a unix timestamp (seconds) falls on
    pub fn date_of(&self, unix_secs: i64) -> NaiveDate {
        let utc = DateTime::<Utc>::from_timestamp(unix_secs, 0).unwrap_or_else(|| {
            tracing::warn!(unix_secs, "Invalid timestamp, using epoch");
            DateTime::UNIX_EPOCH
        });
        match self {
            Self::Local => utc.with_timezone(&Local).date_naive(),
            Self::Zone(tz) => utc.with_timezone(tz).date_naive(),
        }
    }

    /// Today's date in this calendar
    pub fn today(&self) -> NaiveDate {
        self.date_of(Utc::now().timestamp())
    }
}

impl FromStr for Calendar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        trimmed
            .parse::<Tz>()
            .map(Self::Zone)
            .map_err(|_| format!("Unknown time zone '{}'. Use 'local' or an IANA name", s))
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Zone(tz) => write!(f, "{}", tz.name()),
        }
    }
}

/// Format a date for storage
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a stored or user-supplied `YYYY-MM-DD` date
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// The calendar day before `date`
pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}

/// First date of an N-day window ending at `end` (inclusive)
pub fn window_start(end: NaiveDate, days: u32) -> NaiveDate {
    end.checked_sub_days(chrono::Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-10 09:00:00 UTC
    const TS: i64 = 1_704_877_200;

    #[test]
    fn test_date_of_utc() {
        let date = Calendar::utc().date_of(TS);
        assert_eq!(format_date(date), "2024-01-10");
    }

    #[test]
    fn test_date_of_shifts_with_zone() {
        // 23:30 UTC on the 10th is already the 11th in Shanghai
        let late = 1_704_929_400;
        let utc: Calendar = "UTC".parse().unwrap();
        let shanghai: Calendar = "Asia/Shanghai".parse().unwrap();
        assert_eq!(format_date(utc.date_of(late)), "2024-01-10");
        assert_eq!(format_date(shanghai.date_of(late)), "2024-01-11");
    }

    #[test]
    fn test_parse_local() {
        assert_eq!("local".parse::<Calendar>().unwrap(), Calendar::Local);
        assert_eq!(" LOCAL ".parse::<Calendar>().unwrap(), Calendar::Local);
    }

    #[test]
    fn test_parse_unknown_zone() {
        let err = "Mars/Olympus".parse::<Calendar>().unwrap_err();
        assert!(err.contains("Mars/Olympus"));
    }

    #[test]
    fn test_display_roundtrip() {
        let cal: Calendar = "Europe/Berlin".parse().unwrap();
        assert_eq!(cal.to_string(), "Europe/Berlin");
        assert_eq!(Calendar::Local.to_string(), "local");
    }

    #[test]
    fn test_previous_day_crosses_month() {
        let d = parse_date("2024-03-01").unwrap();
        assert_eq!(format_date(previous_day(d)), "2024-02-29");
    }

    #[test]
    fn test_window_start() {
        let end = parse_date("2024-01-10").unwrap();
        assert_eq!(format_date(window_start(end, 7)), "2024-01-04");
        assert_eq!(window_start(end, 1), end);
        assert_eq!(window_start(end, 0), end);
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("2024/01/10").is_none());
        assert!(parse_date("").is_none());
    }
}
