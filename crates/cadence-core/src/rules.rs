//! Scoring and tolerance rules
//!
//! Pure helpers shared by the matcher, the condition translator, and the
//! backtracker: the date closeness score and the approximate-amount
//! threshold.

use chrono::NaiveDate;

/// Fuzzy-match tolerance around a calendar date, in days (inclusive both
/// ways). Shared by the occurrence-window fetch and the `isapprox` date
/// condition.
pub const DATE_TOLERANCE_DAYS: i64 = 2;

/// Closeness score for two calendar dates.
///
/// Same-day scores exactly 1.0, one day off scores 0.5, and the score
/// decreases monotonically with distance without ever reaching zero, so an
/// otherwise-valid match always contributes positively to an aggregate rank
/// while exact alignment wins by strict ordering.
pub fn date_rank(day1: NaiveDate, day2: NaiveDate) -> f64 {
    let diff = (day1 - day2).num_days().abs();
    1.0 / (diff as f64 + 1.0)
}

/// Absolute tolerance for "approximately this amount", in minor units.
///
/// 7.5% of the magnitude, rounded. Monotonically non-decreasing in
/// magnitude: larger amounts tolerate larger absolute deviation.
pub fn approx_amount_threshold(amount: i64) -> i64 {
    (amount.abs() as f64 * 0.075).round() as i64
}
