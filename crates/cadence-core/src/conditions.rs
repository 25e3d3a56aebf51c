//! Schedule-condition translation
//!
//! Turns a finalized schedule's structured rule conditions into a ledger
//! [`Filter`]. Validation problems are reported as a non-empty error list
//! rather than a partial filter; callers treat that as "do not query".

use chrono::Duration;

use crate::ledger::Filter;
use crate::models::{ConditionField, ConditionOp, ConditionValue, ScheduleCondition};
use crate::recurrence::RecurrenceEvaluator;
use crate::rules::{approx_amount_threshold, DATE_TOLERANCE_DAYS};

/// One validation problem found while translating conditions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionError {
    pub field: ConditionField,
    pub message: String,
}

impl std::fmt::Display for ConditionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Options for condition translation
#[derive(Debug, Clone, Copy, Default)]
pub struct TranslateOptions {
    /// When set, a recurring date condition expands to this many upcoming
    /// occurrence dates (exact for `is`, ±2 days for `isapprox`) combined
    /// with `$or`. When unset the descriptor's start date is used directly.
    pub recurring_date_bounds: Option<usize>,
}

/// Translate schedule conditions into a ledger filter.
///
/// Returns the combined `$and` filter, or every validation error found.
pub fn conditions_to_filter(
    conditions: &[ScheduleCondition],
    evaluator: &dyn RecurrenceEvaluator,
    options: TranslateOptions,
) -> std::result::Result<Filter, Vec<ConditionError>> {
    let mut filters = Vec::with_capacity(conditions.len());
    let mut errors = Vec::new();

    for cond in conditions {
        match translate_condition(cond, evaluator, options) {
            Ok(filter) => filters.push(filter),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(Filter::And(filters))
    } else {
        Err(errors)
    }
}

fn translate_condition(
    cond: &ScheduleCondition,
    evaluator: &dyn RecurrenceEvaluator,
    options: TranslateOptions,
) -> std::result::Result<Filter, ConditionError> {
    let err = |message: String| ConditionError {
        field: cond.field,
        message,
    };

    match (cond.field, &cond.value) {
        (ConditionField::Account, ConditionValue::Id(id)) => match cond.op {
            ConditionOp::Is => Ok(Filter::AccountEq(*id)),
            ConditionOp::IsApprox => Err(err("account only supports the is operator".to_string())),
        },
        (ConditionField::Payee, ConditionValue::Id(id)) => match cond.op {
            ConditionOp::Is => Ok(Filter::PayeeEq(*id)),
            ConditionOp::IsApprox => Err(err("payee only supports the is operator".to_string())),
        },
        (ConditionField::Amount, ConditionValue::Amount(amount)) => match cond.op {
            ConditionOp::Is => Ok(Filter::AmountEq(*amount)),
            ConditionOp::IsApprox => {
                let threshold = approx_amount_threshold(*amount);
                Ok(Filter::And(vec![
                    Filter::AmountGte(amount - threshold),
                    Filter::AmountLte(amount + threshold),
                ]))
            }
        },
        (ConditionField::Date, ConditionValue::Date(config)) => {
            let dates = match options.recurring_date_bounds {
                Some(count) => evaluator
                    .occurrences(config, count)
                    .map_err(|e| err(e.to_string()))?,
                None => vec![config.start],
            };
            if dates.is_empty() {
                return Err(err("recurrence produced no occurrence dates".to_string()));
            }

            let mut bounds: Vec<Filter> = dates
                .into_iter()
                .map(|date| match cond.op {
                    ConditionOp::Is => Filter::DateEq(date),
                    ConditionOp::IsApprox => Filter::And(vec![
                        Filter::DateGte(date - Duration::days(DATE_TOLERANCE_DAYS)),
                        Filter::DateLte(date + Duration::days(DATE_TOLERANCE_DAYS)),
                    ]),
                })
                .collect();

            if bounds.len() == 1 {
                Ok(bounds.remove(0))
            } else {
                Ok(Filter::Or(bounds))
            }
        }
        _ => Err(err(format!(
            "value type does not match field {}",
            cond.field
        ))),
    }
}
