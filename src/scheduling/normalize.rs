//! Schedule shorthand normalization.
//!
//! Operators may write a schedule three ways, tried in this order:
//!
//! | input        | meaning                         | canonical     |
//! |--------------|---------------------------------|---------------|
//! | `0 3 * * *`  | any valid 5-field expression    | `0 3 * * *`   |
//! | `3`          | daily at hour 3                 | `0 3 * * *`   |
//! | `0@2`        | weekly on day 0 (Sunday) at 2   | `0 2 * * 0`   |

use super::cron::CronExpr;
use crate::error::{Result, SnapError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated schedule in canonical 5-field form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Schedule {
    canonical: String,
    expr: CronExpr,
}

impl Schedule {
    /// Normalize user shorthand into a canonical schedule.
    pub fn normalize(input: &str) -> Result<Self> {
        let trimmed = input.trim();

        if trimmed.split_whitespace().count() > 1 {
            let expr =
                CronExpr::parse(trimmed).map_err(|e| SnapError::schedule(input, e.to_string()))?;
            return Ok(Self::from_expr(expr));
        }

        if let Some(hour) = parse_digits(trimmed) {
            let hour = check_hour(input, hour)?;
            return Self::shorthand(input, format!("0 {} * * *", hour));
        }

        if let Some((day, hour)) = trimmed.split_once('@') {
            let day = match parse_digits(day) {
                Some(d) if d <= 6 => d,
                _ => {
                    return Err(SnapError::schedule(
                        input,
                        "weekday before '@' must be 0-6 (0 = Sunday)",
                    ))
                }
            };
            let hour = parse_digits(hour)
                .ok_or_else(|| SnapError::schedule(input, "hour after '@' must be 0-23"))?;
            let hour = check_hour(input, hour)?;
            return Self::shorthand(input, format!("0 {} * * {}", hour, day));
        }

        Err(SnapError::schedule(
            input,
            "expected 5 cron fields, an hour (e.g. 3) or weekday@hour (e.g. 0@2)",
        ))
    }

    fn shorthand(input: &str, expanded: String) -> Result<Self> {
        let expr =
            CronExpr::parse(&expanded).map_err(|e| SnapError::schedule(input, e.to_string()))?;
        Ok(Self::from_expr(expr))
    }

    fn from_expr(expr: CronExpr) -> Self {
        Self {
            canonical: expr.canonical(),
            expr,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Next time the external scheduler should fire this schedule, in UTC.
    pub fn next_run(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expr.next_run(after)
    }
}

fn check_hour(input: &str, hour: u32) -> Result<u32> {
    if hour > 23 {
        return Err(SnapError::schedule(input, "hour must be 0-23"));
    }
    Ok(hour)
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl FromStr for Schedule {
    type Err = SnapError;

    fn from_str(s: &str) -> Result<Self> {
        Self::normalize(s)
    }
}

impl TryFrom<String> for Schedule {
    type Error = SnapError;

    fn try_from(s: String) -> Result<Self> {
        Self::normalize(&s)
    }
}

impl From<Schedule> for String {
    fn from(schedule: Schedule) -> Self {
        schedule.canonical
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn norm(s: &str) -> String {
        Schedule::normalize(s).unwrap().to_string()
    }

    #[test]
    fn test_bare_hour_is_daily() {
        assert_eq!(norm("3"), "0 3 * * *");
        assert_eq!(norm("0"), "0 0 * * *");
        assert_eq!(norm(" 23 "), "0 23 * * *");
    }

    #[test]
    fn test_day_at_hour_is_weekly() {
        assert_eq!(norm("0@2"), "0 2 * * 0");
        assert_eq!(norm("6@23"), "0 23 * * 6");
    }

    #[test]
    fn test_canonical_is_idempotent() {
        assert_eq!(norm("0 3 * * *"), "0 3 * * *");
        assert_eq!(norm("*/15  1-5 * * 1,3"), "*/15 1-5 * * 1,3");
        let once = norm("30 2 1 * *");
        assert_eq!(norm(&once), once);
    }

    #[test]
    fn test_rejections_name_the_input() {
        for bad in [
            "not a schedule",
            "",
            "24",
            "7@2",
            "1@24",
            "x@2",
            "1@",
            "0 3 * *",
            "0 3 * * * *",
            "61 3 * * *",
            "1/4294967295 * * * *",
            "daily",
        ] {
            match Schedule::normalize(bad) {
                Err(SnapError::ScheduleFormat { input, .. }) => assert_eq!(input, bad),
                other => panic!("expected ScheduleFormat for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_next_run_of_shorthand() {
        let schedule = Schedule::normalize("2").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 5, 0, 0).unwrap();
        assert_eq!(
            schedule.next_run(&now),
            Some(Utc.with_ymd_and_hms(2024, 3, 2, 2, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_serde_round_trip_as_string() {
        let schedule = Schedule::normalize("0@2").unwrap();
        let json = serde_json::to_string(&schedule).unwrap();
        assert_eq!(json, "\"0 2 * * 0\"");
        assert!(serde_json::from_str::<Schedule>("\"bogus\"").is_err());
    }
}
