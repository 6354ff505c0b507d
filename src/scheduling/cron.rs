//! Cron expression parsing and evaluation.
//!
//! Supports standard 5-field cron expressions:
//! ```text
//! ┌───────────── minute (0-59)
//! │ ┌───────────── hour (0-23)
//! │ │ ┌───────────── day of month (1-31)
//! │ │ │ ┌───────────── month (1-12)
//! │ │ │ │ ┌───────────── day of week (0-6, 0 = Sunday, 7 also = Sunday)
//! │ │ │ │ │
//! * * * * *
//! ```
//!
//! Only numeric fields are accepted; month and weekday names are not, since
//! snapkeep writes the expression back verbatim into the scheduler file.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing cron expressions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CronParseError {
    #[error("expected 5 fields, got {0}")]
    InvalidFieldCount(usize),
    #[error("invalid {field} field '{expr}': {reason}")]
    InvalidField {
        field: &'static str,
        expr: String,
        reason: String,
    },
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("invalid {field} range {start}-{end}")]
    InvalidRange {
        field: &'static str,
        start: u32,
        end: u32,
    },
    #[error("invalid {field} step '{step}'")]
    InvalidStep { field: &'static str, step: String },
}

/// Which of the five positions a field occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl FieldKind {
    fn name(self) -> &'static str {
        match self {
            FieldKind::Minute => "minute",
            FieldKind::Hour => "hour",
            FieldKind::DayOfMonth => "day-of-month",
            FieldKind::Month => "month",
            FieldKind::DayOfWeek => "day-of-week",
        }
    }

    /// Inclusive bounds accepted in the expression text.
    fn bounds(self) -> (u32, u32) {
        match self {
            FieldKind::Minute => (0, 59),
            FieldKind::Hour => (0, 23),
            FieldKind::DayOfMonth => (1, 31),
            FieldKind::Month => (1, 12),
            FieldKind::DayOfWeek => (0, 7),
        }
    }
}

/// A single field in a cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronField {
    /// Field text as written.
    pub expr: String,
    /// The set of values this field matches.
    pub values: BTreeSet<u32>,
    /// Whether the field was a bare `*`.
    pub wildcard: bool,
}

impl CronField {
    /// Parse a field expression.
    fn parse(kind: FieldKind, expr: &str) -> Result<Self, CronParseError> {
        let mut values = BTreeSet::new();
        for part in expr.split(',') {
            Self::parse_part(kind, part, &mut values)?;
        }
        if kind == FieldKind::DayOfWeek && values.remove(&7) {
            values.insert(0);
        }
        Ok(Self {
            expr: expr.to_string(),
            values,
            wildcard: expr == "*",
        })
    }

    /// Parse a single comma-separated part (value, range, `*`, optional step).
    fn parse_part(
        kind: FieldKind,
        part: &str,
        values: &mut BTreeSet<u32>,
    ) -> Result<(), CronParseError> {
        let (min, max) = kind.bounds();
        let invalid = |reason: &str| CronParseError::InvalidField {
            field: kind.name(),
            expr: part.to_string(),
            reason: reason.to_string(),
        };

        if part.is_empty() {
            return Err(invalid("empty list element"));
        }

        // Handle step values (e.g., */5, 0-30/5)
        let (range_part, step) = match part.split_once('/') {
            Some((range, step_str)) => {
                let step = parse_number(step_str)
                    .filter(|s| *s > 0 && *s <= max)
                    .ok_or_else(|| CronParseError::InvalidStep {
                        field: kind.name(),
                        step: step_str.to_string(),
                    })?;
                (range, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if range_part == "*" {
            (min, max)
        } else if let Some((lo, hi)) = range_part.split_once('-') {
            let start = parse_number(lo).ok_or_else(|| invalid("invalid start of range"))?;
            let end = parse_number(hi).ok_or_else(|| invalid("invalid end of range"))?;
            if start > end {
                return Err(CronParseError::InvalidRange {
                    field: kind.name(),
                    start,
                    end,
                });
            }
            (start, end)
        } else {
            let value = parse_number(range_part).ok_or_else(|| invalid("invalid value"))?;
            // `5/10` means "from 5 to the end, every 10"
            match step {
                Some(_) => (value, max),
                None => (value, value),
            }
        };

        for value in [start, end] {
            if value < min || value > max {
                return Err(CronParseError::OutOfRange {
                    field: kind.name(),
                    value,
                    min,
                    max,
                });
            }
        }

        let step = step.unwrap_or(1);
        let mut value = start;
        while value <= end {
            values.insert(value);
            value = match value.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }

        Ok(())
    }

    /// Check if a value matches this field.
    pub fn matches(&self, value: u32) -> bool {
        self.values.contains(&value)
    }
}

fn parse_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// A parsed, validated cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    /// Minute field (0-59).
    pub minute: CronField,
    /// Hour field (0-23).
    pub hour: CronField,
    /// Day of month field (1-31).
    pub day_of_month: CronField,
    /// Month field (1-12).
    pub month: CronField,
    /// Day of week field (0-6, 0 = Sunday).
    pub day_of_week: CronField,
}

impl CronExpr {
    /// Parse a cron expression string.
    pub fn parse(expr: &str) -> Result<Self, CronParseError> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(CronParseError::InvalidFieldCount(parts.len()));
        }

        Ok(Self {
            minute: CronField::parse(FieldKind::Minute, parts[0])?,
            hour: CronField::parse(FieldKind::Hour, parts[1])?,
            day_of_month: CronField::parse(FieldKind::DayOfMonth, parts[2])?,
            month: CronField::parse(FieldKind::Month, parts[3])?,
            day_of_week: CronField::parse(FieldKind::DayOfWeek, parts[4])?,
        })
    }

    /// Canonical text: the five fields joined by single spaces.
    pub fn canonical(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.minute.expr,
            self.hour.expr,
            self.day_of_month.expr,
            self.month.expr,
            self.day_of_week.expr
        )
    }

    /// Check if a datetime matches this cron expression.
    ///
    /// Like cron, when both day-of-month and day-of-week are restricted a
    /// datetime matches if either one does.
    pub fn matches(&self, dt: &DateTime<Utc>) -> bool {
        self.minute.matches(dt.minute())
            && self.hour.matches(dt.hour())
            && self.month.matches(dt.month())
            && self.matches_day(dt)
    }

    /// Calculate the next run time strictly after the given datetime.
    pub fn next_run(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut current = *after + Duration::minutes(1);
        current = current
            .with_second(0)
            .and_then(|dt| dt.with_nanosecond(0))
            .unwrap_or(current);

        // Search up to 4 years ahead (Feb 29 schedules)
        let limit = *after + Duration::days(4 * 366);

        while current <= limit {
            if !self.month.matches(current.month()) {
                current = start_of_next_month(&current)?;
                continue;
            }
            if !self.matches_day(&current) {
                current = start_of_next_day(&current)?;
                continue;
            }
            if !self.hour.matches(current.hour()) {
                current = start_of_next_hour(&current)?;
                continue;
            }
            if self.minute.matches(current.minute()) {
                return Some(current);
            }
            current += Duration::minutes(1);
        }

        None
    }

    fn matches_day(&self, dt: &DateTime<Utc>) -> bool {
        let dom = self.day_of_month.matches(dt.day());
        let dow = self.day_of_week.matches(dt.weekday().num_days_from_sunday());
        match (self.day_of_month.wildcard, self.day_of_week.wildcard) {
            (false, false) => dom || dow,
            _ => dom && dow,
        }
    }
}

fn at_midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(NaiveDateTime::new(date, NaiveTime::from_hms_opt(0, 0, 0)?).and_utc())
}

fn start_of_next_month(dt: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if dt.month() == 12 {
        (dt.year() + 1, 1)
    } else {
        (dt.year(), dt.month() + 1)
    };
    at_midnight(NaiveDate::from_ymd_opt(year, month, 1)?)
}

fn start_of_next_day(dt: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    at_midnight(dt.date_naive().succ_opt()?)
}

fn start_of_next_hour(dt: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    let truncated = dt.with_minute(0)?;
    Some(truncated + Duration::hours(1))
}

impl FromStr for CronExpr {
    type Err = CronParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CronExpr::parse(s)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}
