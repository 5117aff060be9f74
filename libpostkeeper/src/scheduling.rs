//! Schedule string parsing
//!
//! Turns what an operator types after `pk-track schedule ID` into a UTC
//! timestamp. All interpretation happens in UTC.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::{PostkeeperError, Result};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y_%m_%d"];
const DATE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Parse a schedule string relative to `now`
///
/// Tried in order:
/// - A calendar date, `2025-06-10` or `2025_06_10` (midnight UTC)
/// - A date and time, `2025-06-10 09:30`
/// - A relative duration, `30m`, `2h`, `1 day`
/// - Natural language, `tomorrow 9am`, `next friday`
pub fn parse_schedule(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PostkeeperError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    if let Some(dt) = parse_absolute(input) {
        return Ok(dt);
    }

    if let Ok(duration) = parse_duration(input) {
        return Ok(now + duration);
    }

    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Uk).map_err(|_| {
        PostkeeperError::InvalidInput(format!("Could not parse schedule string: {}", input))
    })
}

fn parse_absolute(input: &str) -> Option<DateTime<Utc>> {
    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(input, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_duration(input: &str) -> Result<Duration> {
    let std_duration = humantime::parse_duration(input)
        .map_err(|e| PostkeeperError::InvalidInput(format!("Could not parse duration: {}", e)))?;

    i64::try_from(std_duration.as_secs())
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| PostkeeperError::InvalidInput("Duration out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_dash_date_is_midnight_utc() {
        let dt = parse_schedule("2025-06-10", now()).unwrap();
        assert_eq!(dt.timestamp(), 1_749_513_600);
    }

    #[test]
    fn test_underscore_date_matches_folder_style() {
        let dt = parse_schedule("2025_06_10", now()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_date_and_time() {
        let dt = parse_schedule("2025-06-10 09:30", now()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 6, 10, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_relative_durations() {
        assert_eq!(parse_schedule("30m", now()).unwrap(), now() + Duration::minutes(30));
        assert_eq!(parse_schedule("2h", now()).unwrap(), now() + Duration::hours(2));
        assert_eq!(parse_schedule("1day", now()).unwrap(), now() + Duration::days(1));
    }

    #[test]
    fn test_natural_language_tomorrow() {
        let dt = parse_schedule("tomorrow", now()).unwrap();
        let hours = (dt - now()).num_hours();
        assert!((0..=36).contains(&hours), "Expected within a day and a half, got {}h", hours);
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert!(parse_schedule("  2025-06-10  ", now()).is_ok());
    }

    #[test]
    fn test_empty_rejected() {
        let result = parse_schedule("   ", now());
        assert!(matches!(result, Err(PostkeeperError::InvalidInput(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        let result = parse_schedule("whenever you like", now());
        match result {
            Err(PostkeeperError::InvalidInput(msg)) => {
                assert!(msg.contains("whenever you like"));
            }
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_calendar_date_rejected() {
        assert!(parse_schedule("2025-02-30", now()).is_err());
    }
}
