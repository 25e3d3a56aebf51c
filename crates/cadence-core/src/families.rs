//! Pattern families
//!
//! Each family pairs a lookback scan (where to start trying start-date
//! offsets, and how many consecutive day offsets to try) with a descriptor
//! builder. Builders return an explicit outcome so an offset can be
//! excluded without a sentinel value, e.g. monthly offsets past the 28th,
//! which not every month has.

use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};

use crate::error::{Error, Result};
use crate::models::{Frequency, RecurrenceDescriptor, RecurrencePattern};

/// Result of building a descriptor at one start-date offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorOutcome {
    Candidate(RecurrenceDescriptor),
    /// No candidate at this offset
    Skip,
}

/// One contiguous range of start-date offsets to scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyScan {
    /// First offset date to try
    pub base_start: NaiveDate,
    /// Number of consecutive day offsets to try
    pub num_days: u32,
}

/// The fixed catalog of recurrence shapes the core evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternFamily {
    Weekly,
    EveryTwoWeeks,
    Monthly,
    MonthlyLastDay,
    MonthlyFirstOrThirdWeekday,
    MonthlySecondOrFourthWeekday,
}

impl PatternFamily {
    pub const ALL: [PatternFamily; 6] = [
        PatternFamily::Weekly,
        PatternFamily::EveryTwoWeeks,
        PatternFamily::Monthly,
        PatternFamily::MonthlyLastDay,
        PatternFamily::MonthlyFirstOrThirdWeekday,
        PatternFamily::MonthlySecondOrFourthWeekday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::EveryTwoWeeks => "every-2-weeks",
            Self::Monthly => "monthly",
            Self::MonthlyLastDay => "monthly-last-day",
            Self::MonthlyFirstOrThirdWeekday => "monthly-1st-or-3rd-weekday",
            Self::MonthlySecondOrFourthWeekday => "monthly-2nd-or-4th-weekday",
        }
    }

    /// Scan ranges for this family, seeded from the account's most recent
    /// transaction date. Most families scan one sliding window; the
    /// last-day family probes two independent single-offset anchors.
    pub fn scans(&self, seed: NaiveDate) -> Result<Vec<FamilyScan>> {
        let scans = match self {
            Self::Weekly => vec![FamilyScan {
                base_start: sub_weeks(seed, 4)?,
                num_days: 14,
            }],
            Self::EveryTwoWeeks => vec![FamilyScan {
                base_start: sub_weeks(seed, 7)?,
                num_days: 14,
            }],
            Self::Monthly => vec![FamilyScan {
                base_start: sub_months(seed, 4)?,
                num_days: 62,
            }],
            Self::MonthlyLastDay => vec![
                FamilyScan {
                    base_start: sub_months(seed, 3)?,
                    num_days: 1,
                },
                FamilyScan {
                    base_start: sub_months(seed, 4)?,
                    num_days: 1,
                },
            ],
            Self::MonthlyFirstOrThirdWeekday => vec![FamilyScan {
                base_start: sub_weeks(seed, 8)?,
                num_days: 14,
            }],
            Self::MonthlySecondOrFourthWeekday => vec![FamilyScan {
                base_start: sub_months(seed, 8)?,
                num_days: 14,
            }],
        };
        Ok(scans)
    }

    /// Build this family's descriptor for one offset date.
    ///
    /// `reference_weekday` feeds the ordinal-weekday families. It is the
    /// weekday of the discovery run's reference date, not of the offset
    /// being tested; that mirrors the original system's behavior.
    pub fn build(&self, offset: NaiveDate, reference_weekday: Weekday) -> DescriptorOutcome {
        match self {
            Self::Weekly => {
                DescriptorOutcome::Candidate(RecurrenceDescriptor::new(Frequency::Weekly, offset))
            }
            Self::EveryTwoWeeks => DescriptorOutcome::Candidate(
                RecurrenceDescriptor::new(Frequency::Weekly, offset).with_interval(2),
            ),
            Self::Monthly => {
                if offset.day() > 28 {
                    // Not every month has this day
                    DescriptorOutcome::Skip
                } else {
                    DescriptorOutcome::Candidate(RecurrenceDescriptor::new(
                        Frequency::Monthly,
                        offset,
                    ))
                }
            }
            Self::MonthlyLastDay => DescriptorOutcome::Candidate(
                RecurrenceDescriptor::new(Frequency::Monthly, offset)
                    .with_patterns(vec![RecurrencePattern::Day { value: -1 }]),
            ),
            Self::MonthlyFirstOrThirdWeekday => DescriptorOutcome::Candidate(
                RecurrenceDescriptor::new(Frequency::Monthly, offset).with_patterns(vec![
                    RecurrencePattern::Weekday {
                        weekday: reference_weekday,
                        ordinal: 1,
                    },
                    RecurrencePattern::Weekday {
                        weekday: reference_weekday,
                        ordinal: 3,
                    },
                ]),
            ),
            Self::MonthlySecondOrFourthWeekday => DescriptorOutcome::Candidate(
                RecurrenceDescriptor::new(Frequency::Monthly, offset).with_patterns(vec![
                    RecurrencePattern::Weekday {
                        weekday: reference_weekday,
                        ordinal: 2,
                    },
                    RecurrencePattern::Weekday {
                        weekday: reference_weekday,
                        ordinal: 4,
                    },
                ]),
            ),
        }
    }
}

impl std::fmt::Display for PatternFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn sub_weeks(date: NaiveDate, weeks: i64) -> Result<NaiveDate> {
    date.checked_sub_signed(Duration::weeks(weeks))
        .ok_or_else(|| Error::DateOutOfRange(format!("{} - {} weeks", date, weeks)))
}

fn sub_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_sub_months(Months::new(months))
        .ok_or_else(|| Error::DateOutOfRange(format!("{} - {} months", date, months)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_scan_parameters() {
        let seed = day("2024-03-29");

        let weekly = PatternFamily::Weekly.scans(seed).unwrap();
        assert_eq!(weekly, vec![FamilyScan { base_start: day("2024-03-01"), num_days: 14 }]);

        let biweekly = PatternFamily::EveryTwoWeeks.scans(seed).unwrap();
        assert_eq!(biweekly[0].base_start, day("2024-02-09"));
        assert_eq!(biweekly[0].num_days, 14);

        let monthly = PatternFamily::Monthly.scans(seed).unwrap();
        assert_eq!(monthly, vec![FamilyScan { base_start: day("2023-11-29"), num_days: 62 }]);

        let last_day = PatternFamily::MonthlyLastDay.scans(seed).unwrap();
        assert_eq!(
            last_day,
            vec![
                FamilyScan { base_start: day("2023-12-29"), num_days: 1 },
                FamilyScan { base_start: day("2023-11-29"), num_days: 1 },
            ]
        );

        let first_third = PatternFamily::MonthlyFirstOrThirdWeekday.scans(seed).unwrap();
        assert_eq!(first_third[0].base_start, day("2024-02-02"));

        let second_fourth = PatternFamily::MonthlySecondOrFourthWeekday.scans(seed).unwrap();
        assert_eq!(second_fourth[0].base_start, day("2023-07-29"));
        assert_eq!(second_fourth[0].num_days, 14);
    }

    #[test]
    fn test_monthly_skips_offsets_past_28() {
        for offset in ["2024-01-29", "2024-01-30", "2024-01-31"] {
            assert_eq!(
                PatternFamily::Monthly.build(day(offset), Weekday::Mon),
                DescriptorOutcome::Skip
            );
        }
        assert!(matches!(
            PatternFamily::Monthly.build(day("2024-01-28"), Weekday::Mon),
            DescriptorOutcome::Candidate(_)
        ));
    }

    #[test]
    fn test_weekday_families_use_reference_weekday() {
        // The weekday comes from the run's reference date, not the offset
        // date: 2024-01-03 is a Wednesday, but the builder is handed Friday.
        let outcome =
            PatternFamily::MonthlyFirstOrThirdWeekday.build(day("2024-01-03"), Weekday::Fri);
        let DescriptorOutcome::Candidate(config) = outcome else {
            panic!("expected a candidate");
        };
        assert_eq!(
            config.patterns,
            vec![
                RecurrencePattern::Weekday { weekday: Weekday::Fri, ordinal: 1 },
                RecurrencePattern::Weekday { weekday: Weekday::Fri, ordinal: 3 },
            ]
        );
    }

    #[test]
    fn test_biweekly_descriptor_shape() {
        let DescriptorOutcome::Candidate(config) =
            PatternFamily::EveryTwoWeeks.build(day("2024-01-01"), Weekday::Mon)
        else {
            panic!("expected a candidate");
        };
        assert_eq!(config.frequency, Frequency::Weekly);
        assert_eq!(config.interval, 2);
        assert_eq!(config.start, day("2024-01-01"));
    }

    #[test]
    fn test_last_day_descriptor_shape() {
        let DescriptorOutcome::Candidate(config) =
            PatternFamily::MonthlyLastDay.build(day("2024-01-15"), Weekday::Mon)
        else {
            panic!("expected a candidate");
        };
        assert_eq!(config.patterns, vec![RecurrencePattern::Day { value: -1 }]);
    }
}
