//! Recurrence evaluation
//!
//! Turns a [`RecurrenceDescriptor`] into concrete calendar dates. The
//! evaluator sits behind a trait so the inference core can be driven by an
//! alternative rule engine; [`CalendarEvaluator`] is the shipped default.

use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};

use crate::error::{Error, Result};
use crate::models::{Frequency, RecurrenceDescriptor, RecurrencePattern};

/// Evaluates recurrence descriptors into occurrence dates.
///
/// Implementations must be deterministic for a given descriptor and return
/// dates in ascending order, starting at or after the descriptor's `start`.
pub trait RecurrenceEvaluator: Send + Sync {
    /// The first `count` occurrence dates of `config`, ascending.
    fn occurrences(&self, config: &RecurrenceDescriptor, count: usize) -> Result<Vec<NaiveDate>>;
}

/// Pure-chrono recurrence evaluator.
///
/// Supports weekly/monthly/yearly frequencies, an `interval` multiplier, and
/// monthly `patterns` for numeric day-of-month (negative = from end of
/// month) and ordinal weekday-of-month rules. Patterns on non-monthly
/// frequencies are rejected rather than silently ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarEvaluator;

impl CalendarEvaluator {
    pub fn new() -> Self {
        Self
    }
}

// Safety cap on period stepping when patterns can skip months
// (e.g. day 31 in a 30-day month).
const MAX_PERIODS: u32 = 1200;

impl RecurrenceEvaluator for CalendarEvaluator {
    fn occurrences(&self, config: &RecurrenceDescriptor, count: usize) -> Result<Vec<NaiveDate>> {
        validate(config)?;

        if count == 0 {
            return Ok(Vec::new());
        }

        let mut dates = Vec::with_capacity(count);
        for period in 0..MAX_PERIODS {
            let period_start = step(config.start, config.frequency, config.interval, period)?;

            if config.patterns.is_empty() {
                dates.push(period_start);
            } else {
                // Pattern dates within this period's month, in day order
                let mut in_month: Vec<NaiveDate> = config
                    .patterns
                    .iter()
                    .filter_map(|p| pattern_date(period_start.year(), period_start.month(), p))
                    .filter(|d| *d >= config.start)
                    .collect();
                in_month.sort();
                in_month.dedup();
                dates.extend(in_month);
            }

            if dates.len() >= count {
                dates.truncate(count);
                return Ok(dates);
            }
        }

        Err(Error::InvalidDescriptor(format!(
            "no {} occurrences within {} periods of {}",
            count, MAX_PERIODS, config.start
        )))
    }
}

fn validate(config: &RecurrenceDescriptor) -> Result<()> {
    if config.interval == 0 {
        return Err(Error::InvalidDescriptor(
            "interval must be positive".to_string(),
        ));
    }
    if !config.patterns.is_empty() && config.frequency != Frequency::Monthly {
        return Err(Error::InvalidDescriptor(format!(
            "patterns are only supported for monthly frequency, got {}",
            config.frequency
        )));
    }
    for pattern in &config.patterns {
        match *pattern {
            RecurrencePattern::Day { value } => {
                if value == 0 || value > 31 || value < -31 {
                    return Err(Error::InvalidDescriptor(format!(
                        "day pattern out of range: {}",
                        value
                    )));
                }
            }
            RecurrencePattern::Weekday { ordinal, .. } => {
                if ordinal == 0 || ordinal > 5 || ordinal < -5 {
                    return Err(Error::InvalidDescriptor(format!(
                        "weekday ordinal out of range: {}",
                        ordinal
                    )));
                }
            }
        }
    }
    Ok(())
}

/// The start of period number `period` (0-based) for a descriptor.
fn step(start: NaiveDate, frequency: Frequency, interval: u32, period: u32) -> Result<NaiveDate> {
    let n = interval
        .checked_mul(period)
        .ok_or_else(|| Error::DateOutOfRange(format!("period {} overflow", period)))?;
    let stepped = match frequency {
        Frequency::Weekly => start.checked_add_signed(Duration::weeks(n as i64)),
        Frequency::Monthly => start.checked_add_months(Months::new(n)),
        Frequency::Yearly => n
            .checked_mul(12)
            .and_then(|months| start.checked_add_months(Months::new(months))),
    };
    stepped.ok_or_else(|| Error::DateOutOfRange(format!("{} + {} {}", start, n, frequency)))
}

/// Resolve one pattern within a month, or None when the month has no such day.
fn pattern_date(year: i32, month: u32, pattern: &RecurrencePattern) -> Option<NaiveDate> {
    match *pattern {
        RecurrencePattern::Day { value } => {
            let last = days_in_month(year, month);
            if value > 0 {
                let day = value as u32;
                if day > last {
                    return None; // not every month has this day
                }
                NaiveDate::from_ymd_opt(year, month, day)
            } else {
                // -1 = last day, -2 = second-to-last, ...
                let day = last as i32 + 1 + value;
                if day < 1 {
                    return None;
                }
                NaiveDate::from_ymd_opt(year, month, day as u32)
            }
        }
        RecurrencePattern::Weekday { weekday, ordinal } => {
            nth_weekday_of_month(year, month, weekday, ordinal)
        }
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    // First of the month always exists; the day before next month's first
    // is this month's last day.
    next.map(|d| (d - Duration::days(1)).day())
        .unwrap_or(31)
}

/// The nth (1-based, or -1 = last) given weekday of a month.
fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, ordinal: i32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (7 + weekday.num_days_from_monday() as i64
        - first.weekday().num_days_from_monday() as i64)
        % 7;
    let first_match = first + Duration::days(offset);
    let last = days_in_month(year, month);

    if ordinal > 0 {
        let candidate = first_match + Duration::days(7 * (ordinal as i64 - 1));
        (candidate.month() == month).then_some(candidate)
    } else {
        // Count matches in the month, then index from the end
        let matches = (last - first_match.day()) / 7 + 1;
        let idx = matches as i32 + ordinal;
        if idx < 0 {
            return None;
        }
        Some(first_match + Duration::days(7 * idx as i64))
    }
}
