//! Start-date backtracking
//!
//! A winning schedule starts where the candidate scan happened to anchor
//! it. The backtracker pushes the start one period further into the past at
//! a time, re-querying the ledger for evidence, and stops at the first
//! period with none. Modeled as an explicit state machine so the commit /
//! revert / abort transitions are testable in isolation.

use chrono::{Duration, Months};
use tracing::{debug, warn};

use crate::conditions::{conditions_to_filter, ConditionError, TranslateOptions};
use crate::error::{Error, Result};
use crate::ledger::{Ledger, QueryOptions};
use crate::models::{
    ConditionField, ConditionValue, FinalizedSchedule, Frequency, RecurrenceDescriptor,
    ScheduleCondition,
};
use crate::recurrence::RecurrenceEvaluator;

/// Outcome of one backtracking transition
#[derive(Debug)]
pub enum BacktrackStep {
    /// Evidence found one period back; the stepped-back config becomes current
    Commit(RecurrenceDescriptor),
    /// No evidence one period back; the current config is the true earliest start
    Revert,
    /// Condition translation failed; keep the last known-good config
    Abort(Vec<ConditionError>),
}

/// Move a descriptor's start back by one interval-sized period.
///
/// A non-positive interval is a programmer error in descriptor construction
/// and is reported as fatal for the schedule being backtracked.
pub fn step_back_one_period(config: &RecurrenceDescriptor) -> Result<RecurrenceDescriptor> {
    if config.interval == 0 {
        return Err(Error::InvalidDescriptor(
            "cannot step back a descriptor with a zero interval".to_string(),
        ));
    }

    let start = match config.frequency {
        Frequency::Weekly => config
            .start
            .checked_sub_signed(Duration::weeks(config.interval as i64)),
        Frequency::Monthly => config.start.checked_sub_months(Months::new(config.interval)),
        Frequency::Yearly => config
            .start
            .checked_sub_months(Months::new(config.interval * 12)),
    };

    let start = start.ok_or_else(|| {
        Error::DateOutOfRange(format!(
            "{} - {} {}",
            config.start, config.interval, config.frequency
        ))
    })?;

    Ok(RecurrenceDescriptor {
        start,
        ..config.clone()
    })
}

/// Extends a winning schedule's start date backward in time
pub struct Backtracker<'a> {
    ledger: &'a dyn Ledger,
    evaluator: &'a dyn RecurrenceEvaluator,
}

impl<'a> Backtracker<'a> {
    pub fn new(ledger: &'a dyn Ledger, evaluator: &'a dyn RecurrenceEvaluator) -> Self {
        Self { ledger, evaluator }
    }

    /// Try one transition: step the date condition back a period, translate
    /// the rewritten conditions, and look for matching transactions.
    pub async fn step(
        &self,
        conditions: &[ScheduleCondition],
        current: &RecurrenceDescriptor,
    ) -> Result<BacktrackStep> {
        let candidate = step_back_one_period(current)?;
        let rewritten = rewrite_date_condition(conditions, &candidate);

        let filter = match conditions_to_filter(
            &rewritten,
            self.evaluator,
            TranslateOptions {
                recurring_date_bounds: Some(1),
            },
        ) {
            Ok(filter) => filter,
            Err(errors) => return Ok(BacktrackStep::Abort(errors)),
        };

        let rows = self
            .ledger
            .query_transactions(&filter, QueryOptions::suppress_children())
            .await?;

        if rows.is_empty() {
            Ok(BacktrackStep::Revert)
        } else {
            Ok(BacktrackStep::Commit(candidate))
        }
    }

    /// Run transitions until a terminal state, then rewrite the schedule's
    /// date and date condition to the earliest supported config.
    ///
    /// Translator errors are recoverable here: the last known-good config is
    /// kept. A fatal descriptor defect propagates as `Err` and the caller
    /// decides what to do with the schedule.
    pub async fn extend_start_date(&self, schedule: FinalizedSchedule) -> Result<FinalizedSchedule> {
        let Some(date_cond) = schedule.date_condition() else {
            return Ok(schedule);
        };
        let ConditionValue::Date(initial) = date_cond.value.clone() else {
            return Ok(schedule);
        };

        let mut current = initial;
        loop {
            match self.step(&schedule.conditions, &current).await? {
                BacktrackStep::Commit(candidate) => {
                    debug!(schedule = schedule.id, start = %candidate.start, "committed earlier start");
                    current = candidate;
                }
                BacktrackStep::Revert => break,
                BacktrackStep::Abort(errors) => {
                    warn!(
                        schedule = schedule.id,
                        errors = errors.len(),
                        "condition translation failed, keeping last known-good start"
                    );
                    break;
                }
            }
        }

        let conditions = rewrite_date_condition(&schedule.conditions, &current);
        Ok(FinalizedSchedule {
            date: current,
            conditions,
            ..schedule
        })
    }
}

fn rewrite_date_condition(
    conditions: &[ScheduleCondition],
    config: &RecurrenceDescriptor,
) -> Vec<ScheduleCondition> {
    conditions
        .iter()
        .map(|c| {
            if c.field == ConditionField::Date {
                ScheduleCondition {
                    value: ConditionValue::Date(config.clone()),
                    ..c.clone()
                }
            } else {
                c.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConditionOp;
    use crate::recurrence::CalendarEvaluator;
    use crate::test_utils::{transaction, MemoryLedger};
    use chrono::NaiveDate;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_step_back_weekly() {
        let config = RecurrenceDescriptor::new(Frequency::Weekly, day("2024-02-05")).with_interval(2);
        let stepped = step_back_one_period(&config).unwrap();
        assert_eq!(stepped.start, day("2024-01-22"));
        assert_eq!(stepped.interval, 2);
    }

    #[test]
    fn test_step_back_monthly_and_yearly() {
        let monthly = RecurrenceDescriptor::new(Frequency::Monthly, day("2024-03-31"));
        assert_eq!(step_back_one_period(&monthly).unwrap().start, day("2024-02-29"));

        let yearly = RecurrenceDescriptor::new(Frequency::Yearly, day("2024-06-15"));
        assert_eq!(step_back_one_period(&yearly).unwrap().start, day("2023-06-15"));
    }

    #[test]
    fn test_step_back_zero_interval_is_fatal() {
        let mut config = RecurrenceDescriptor::new(Frequency::Weekly, day("2024-01-01"));
        config.interval = 0;
        assert!(matches!(
            step_back_one_period(&config),
            Err(Error::InvalidDescriptor(_))
        ));
    }

    fn schedule_for(config: RecurrenceDescriptor, date_op: ConditionOp) -> FinalizedSchedule {
        FinalizedSchedule {
            id: 1,
            account_id: 1,
            payee_id: 7,
            date: config.clone(),
            amount: -500,
            conditions: vec![
                ScheduleCondition::new(ConditionOp::Is, ConditionField::Account, ConditionValue::Id(1)),
                ScheduleCondition::new(ConditionOp::Is, ConditionField::Payee, ConditionValue::Id(7)),
                ScheduleCondition::new(date_op, ConditionField::Date, ConditionValue::Date(config)),
                ScheduleCondition::new(
                    ConditionOp::Is,
                    ConditionField::Amount,
                    ConditionValue::Amount(-500),
                ),
            ],
        }
    }

    #[tokio::test]
    async fn test_revert_on_first_empty_period_keeps_initial_start() {
        // No transactions at all: the very first step finds no evidence
        let ledger = MemoryLedger::new();
        let config = RecurrenceDescriptor::new(Frequency::Weekly, day("2024-02-05"));
        let schedule = schedule_for(config.clone(), ConditionOp::Is);

        let result = Backtracker::new(&ledger, &CalendarEvaluator)
            .extend_start_date(schedule)
            .await
            .unwrap();
        assert_eq!(result.date, config);
    }

    #[tokio::test]
    async fn test_commits_while_evidence_exists() {
        let mut ledger = MemoryLedger::new();
        // Weekly charges on 2024-01-01, 01-08, 01-15; schedule anchored at 01-15
        for (id, date) in ["2024-01-01", "2024-01-08", "2024-01-15"].iter().enumerate() {
            ledger.add_transaction(transaction(id as i64 + 1, 1, 7, -500, date));
        }
        let config = RecurrenceDescriptor::new(Frequency::Weekly, day("2024-01-15"));
        let schedule = schedule_for(config, ConditionOp::Is);

        let result = Backtracker::new(&ledger, &CalendarEvaluator)
            .extend_start_date(schedule)
            .await
            .unwrap();
        assert_eq!(result.date.start, day("2024-01-01"));

        // The date condition was rewritten along with the schedule date
        let date_cond = result.date_condition().unwrap();
        assert_eq!(date_cond.value, ConditionValue::Date(result.date.clone()));
    }

    #[tokio::test]
    async fn test_abort_on_translation_error_keeps_current() {
        let mut ledger = MemoryLedger::new();
        ledger.add_transaction(transaction(1, 1, 7, -500, "2024-01-08"));
        let config = RecurrenceDescriptor::new(Frequency::Weekly, day("2024-01-15"));
        let mut schedule = schedule_for(config.clone(), ConditionOp::Is);
        // Break the account condition: isapprox is not valid there, so the
        // translator rejects the set on the first transition.
        schedule.conditions[0].op = ConditionOp::IsApprox;

        let result = Backtracker::new(&ledger, &CalendarEvaluator)
            .extend_start_date(schedule)
            .await
            .unwrap();
        assert_eq!(result.date, config, "abort keeps the schedule untouched");
    }

    #[tokio::test]
    async fn test_approx_date_condition_tolerates_nearby_evidence() {
        let mut ledger = MemoryLedger::new();
        // Evidence one day off the stepped-back occurrence
        ledger.add_transaction(transaction(1, 1, 7, -500, "2024-01-09"));
        let config = RecurrenceDescriptor::new(Frequency::Weekly, day("2024-01-15"));
        let schedule = schedule_for(config, ConditionOp::IsApprox);

        let result = Backtracker::new(&ledger, &CalendarEvaluator)
            .extend_start_date(schedule)
            .await
            .unwrap();
        assert_eq!(result.date.start, day("2024-01-08"));
    }
}
