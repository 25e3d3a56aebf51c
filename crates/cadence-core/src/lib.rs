//! Cadence Core Library
//!
//! Infers recurring-payment schedules from a ledger of historical
//! transactions, without any schedule having been declared up front:
//! - Candidate recurrence descriptors over sliding start-date offsets
//! - Fuzzy date/amount matching of real transactions to generated occurrences
//! - Rank aggregation and per-payee winner selection
//! - Backward extension of a winning schedule's start date
//!
//! Storage and recurrence evaluation sit behind pluggable traits
//! ([`Ledger`], [`RecurrenceEvaluator`]); the crate ships a pure-chrono
//! evaluator and an in-memory test ledger.

pub mod backtrack;
pub mod conditions;
pub mod discover;
pub mod error;
pub mod families;
pub mod ledger;
pub mod matcher;
pub mod models;
pub mod recurrence;
pub mod rules;

/// Test utilities including the in-memory ledger
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use backtrack::{step_back_one_period, Backtracker, BacktrackStep};
pub use conditions::{conditions_to_filter, ConditionError, TranslateOptions};
pub use discover::{DiscoveryConfig, ScheduleDiscovery};
pub use error::{Error, Result};
pub use families::{DescriptorOutcome, FamilyScan, PatternFamily};
pub use ledger::{CancelToken, Filter, Ledger, QueryOptions};
pub use matcher::match_windows;
pub use models::{
    Account, CandidateMatch, ConditionField, ConditionOp, ConditionValue, FinalizedSchedule,
    Frequency, OccurrenceWindow, RecurrenceDescriptor, RecurrencePattern, ScheduleCondition,
    Transaction,
};
pub use recurrence::{CalendarEvaluator, RecurrenceEvaluator};
pub use rules::{approx_amount_threshold, date_rank, DATE_TOLERANCE_DAYS};
