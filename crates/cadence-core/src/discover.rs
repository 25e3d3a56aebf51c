//! Schedule discovery orchestration
//!
//! Drives the whole inference run: per open account, seed from the latest
//! transaction, scan every pattern family's start-date offsets, score the
//! occurrence windows, pick the best candidate per payee, and extend each
//! winner's start date backward.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use tracing::{debug, info, warn};

use crate::backtrack::Backtracker;
use crate::error::{Error, Result};
use crate::families::{DescriptorOutcome, PatternFamily};
use crate::ledger::{CancelToken, Filter, Ledger, QueryOptions};
use crate::matcher::match_windows;
use crate::models::{
    CandidateMatch, ConditionField, ConditionOp, ConditionValue, FinalizedSchedule,
    OccurrenceWindow, RecurrenceDescriptor, ScheduleCondition, Transaction,
};
use crate::recurrence::RecurrenceEvaluator;
use crate::rules::DATE_TOLERANCE_DAYS;

// Cap on forward re-anchoring shifts per scanned offset; the deepest family
// lookback is 8 months, so this is never reached in practice.
const MAX_ALIGN_SHIFTS: usize = 512;

/// Discovery configuration
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Occurrence dates generated per candidate descriptor
    pub occurrence_count: usize,
    /// Reference date for the run; defaults to today. Feeds the weekday
    /// used by the ordinal-weekday families.
    pub reference_date: Option<NaiveDate>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            occurrence_count: 3,
            reference_date: None,
        }
    }
}

/// Main driver that infers recurring schedules from ledger history
pub struct ScheduleDiscovery<'a> {
    ledger: &'a dyn Ledger,
    evaluator: &'a dyn RecurrenceEvaluator,
    config: DiscoveryConfig,
    cancel: CancelToken,
}

impl<'a> ScheduleDiscovery<'a> {
    pub fn new(ledger: &'a dyn Ledger, evaluator: &'a dyn RecurrenceEvaluator) -> Self {
        Self {
            ledger,
            evaluator,
            config: DiscoveryConfig::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_config(
        ledger: &'a dyn Ledger,
        evaluator: &'a dyn RecurrenceEvaluator,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            ledger,
            evaluator,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Attach an external cancellation signal, checked between ledger
    /// round-trips. A cancelled run returns the schedules finalized so far.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the full inference and return one schedule per qualifying payee
    pub async fn discover(&self) -> Result<Vec<FinalizedSchedule>> {
        let reference_date = self
            .config
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());
        let reference_weekday = reference_date.weekday();

        let accounts = self.ledger.open_accounts().await?;
        let mut candidates: Vec<CandidateMatch> = Vec::new();

        for account in &accounts {
            if self.cancel.is_cancelled() {
                break;
            }

            let Some(seed) = self.ledger.latest_transaction_date(account.id).await? else {
                debug!(account = account.id, "no transaction history, skipping");
                continue;
            };

            for family in PatternFamily::ALL {
                let found = self
                    .scan_family(family, account.id, seed, reference_weekday)
                    .await?;
                if !found.is_empty() {
                    debug!(
                        account = account.id,
                        family = %family,
                        candidates = found.len(),
                        "family scan complete"
                    );
                }
                candidates.extend(found);
            }
        }

        let winners = select_winners(&candidates);
        let backtracker = Backtracker::new(self.ledger, self.evaluator);
        let mut finalized = Vec::with_capacity(winners.len());

        for (idx, winner) in winners.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }

            let schedule = FinalizedSchedule {
                id: idx as i64 + 1,
                account_id: winner.account_id,
                payee_id: winner.payee_id,
                date: winner.date.clone(),
                amount: winner.amount,
                conditions: winner_conditions(winner),
            };

            match backtracker.extend_start_date(schedule.clone()).await {
                Ok(extended) => finalized.push(extended),
                // Descriptor defects abort only this schedule's backtracking
                Err(e @ (Error::InvalidDescriptor(_) | Error::DateOutOfRange(_))) => {
                    warn!(
                        payee = schedule.payee_id,
                        error = %e,
                        "backtracking aborted, keeping schedule as discovered"
                    );
                    finalized.push(schedule);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            accounts = accounts.len(),
            candidates = candidates.len(),
            schedules = finalized.len(),
            cancelled = self.cancel.is_cancelled(),
            "Schedule discovery complete"
        );

        Ok(finalized)
    }

    /// Scan one pattern family's start-date offsets for one account
    async fn scan_family(
        &self,
        family: PatternFamily,
        account_id: i64,
        seed: NaiveDate,
        reference_weekday: Weekday,
    ) -> Result<Vec<CandidateMatch>> {
        let mut out = Vec::new();

        for scan in family.scans(seed)? {
            for day_offset in 0..scan.num_days {
                if self.cancel.is_cancelled() {
                    return Ok(out);
                }

                let offset = scan.base_start + Duration::days(day_offset as i64);
                let config = match family.build(offset, reference_weekday) {
                    DescriptorOutcome::Candidate(config) => config,
                    DescriptorOutcome::Skip => continue,
                };
                let config = self.align_to_seed(config, seed)?;

                let occurrences = self
                    .evaluator
                    .occurrences(&config, self.config.occurrence_count)?;

                let mut windows = Vec::with_capacity(occurrences.len());
                for date in occurrences {
                    let transactions = self.fetch_window(account_id, date).await?;
                    windows.push(OccurrenceWindow { date, transactions });
                }

                out.extend(match_windows(&windows, &config));
            }
        }

        Ok(out)
    }

    /// Re-anchor a scanned descriptor against the seed date.
    ///
    /// The scanned offset fixes the descriptor's phase (weekday, day of
    /// month, cycle alignment); the start is then advanced by whole periods
    /// so the enumerated occurrences are the most recent ones not after the
    /// seed. Without this, deep-lookback families would only ever test
    /// occurrence runs ending well before the account's newest activity.
    fn align_to_seed(
        &self,
        config: RecurrenceDescriptor,
        seed: NaiveDate,
    ) -> Result<RecurrenceDescriptor> {
        let count = self.config.occurrence_count;
        if count == 0 {
            return Ok(config);
        }

        let mut current = config;
        // Bounded: every accepted shift moves the start strictly forward
        // toward the seed.
        for _ in 0..MAX_ALIGN_SHIFTS {
            let occurrences = self.evaluator.occurrences(&current, count + 1)?;
            match occurrences.get(count) {
                Some(next) if *next <= seed => {
                    current = RecurrenceDescriptor {
                        start: occurrences[1],
                        ..current
                    };
                }
                _ => return Ok(current),
            }
        }
        Ok(current)
    }

    /// Fetch the real transactions within the date tolerance of one
    /// generated occurrence: same account, not yet scheduled, payee not a
    /// transfer counterpart, split children suppressed.
    async fn fetch_window(&self, account_id: i64, date: NaiveDate) -> Result<Vec<Transaction>> {
        let filter = Filter::And(vec![
            Filter::AccountEq(account_id),
            Filter::DateGte(date - Duration::days(DATE_TOLERANCE_DAYS)),
            Filter::DateLte(date + Duration::days(DATE_TOLERANCE_DAYS)),
            Filter::ScheduleIsNull,
            Filter::TransferAccountIsNull,
        ]);
        self.ledger
            .query_transactions(&filter, QueryOptions::suppress_children())
            .await
    }
}

/// Pick the highest-ranked candidate per payee.
///
/// Stable grouped-max rather than a full sort: a candidate replaces the
/// incumbent only on a strictly greater rank, so ties keep the
/// earlier-generated candidate. Output preserves first-seen payee order.
fn select_winners(candidates: &[CandidateMatch]) -> Vec<&CandidateMatch> {
    let mut order: Vec<i64> = Vec::new();
    let mut best: HashMap<i64, usize> = HashMap::new();

    for (idx, candidate) in candidates.iter().enumerate() {
        match best.entry(candidate.payee_id) {
            Entry::Vacant(e) => {
                e.insert(idx);
                order.push(candidate.payee_id);
            }
            Entry::Occupied(mut e) => {
                if candidate.rank > candidates[*e.get()].rank {
                    e.insert(idx);
                }
            }
        }
    }

    order.iter().map(|payee| &candidates[best[payee]]).collect()
}

/// Translate a winning candidate into its schedule conditions
fn winner_conditions(winner: &CandidateMatch) -> Vec<ScheduleCondition> {
    let date_op = if winner.exact_date {
        ConditionOp::Is
    } else {
        ConditionOp::IsApprox
    };
    let amount_op = if winner.exact_amount {
        ConditionOp::Is
    } else {
        ConditionOp::IsApprox
    };

    vec![
        ScheduleCondition::new(
            ConditionOp::Is,
            ConditionField::Account,
            ConditionValue::Id(winner.account_id),
        ),
        ScheduleCondition::new(
            ConditionOp::Is,
            ConditionField::Payee,
            ConditionValue::Id(winner.payee_id),
        ),
        ScheduleCondition::new(
            date_op,
            ConditionField::Date,
            ConditionValue::Date(winner.date.clone()),
        ),
        ScheduleCondition::new(
            amount_op,
            ConditionField::Amount,
            ConditionValue::Amount(winner.amount),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frequency, RecurrenceDescriptor};
    use crate::recurrence::CalendarEvaluator;
    use crate::test_utils::MemoryLedger;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn candidate(payee_id: i64, rank: f64, start: &str) -> CandidateMatch {
        CandidateMatch {
            rank,
            amount: -500,
            account_id: 1,
            payee_id,
            date: RecurrenceDescriptor::new(Frequency::Weekly, day(start)),
            exact_date: true,
            exact_amount: true,
        }
    }

    #[test]
    fn test_winner_is_highest_rank() {
        let candidates = vec![
            candidate(7, 3.0, "2024-01-01"),
            candidate(7, 2.5, "2024-01-02"),
            candidate(7, 2.5, "2024-01-03"),
        ];
        let winners = select_winners(&candidates);
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].rank, 3.0);
        assert_eq!(winners[0].date.start, day("2024-01-01"));
    }

    #[test]
    fn test_tied_top_ranks_keep_earlier_candidate() {
        let candidates = vec![
            candidate(7, 2.5, "2024-01-01"),
            candidate(7, 2.5, "2024-01-02"),
            candidate(7, 3.0, "2024-01-03"),
            candidate(7, 3.0, "2024-01-04"),
        ];
        let winners = select_winners(&candidates);
        assert_eq!(winners[0].date.start, day("2024-01-03"));
    }

    #[test]
    fn test_winners_grouped_by_payee_in_first_seen_order() {
        let candidates = vec![
            candidate(7, 1.5, "2024-01-01"),
            candidate(9, 3.0, "2024-01-02"),
            candidate(7, 2.0, "2024-01-03"),
        ];
        let winners = select_winners(&candidates);
        let picked: Vec<(i64, f64)> = winners.iter().map(|w| (w.payee_id, w.rank)).collect();
        assert_eq!(picked, vec![(7, 2.0), (9, 3.0)]);
    }

    #[test]
    fn test_inexact_winner_gets_isapprox_conditions() {
        let mut c = candidate(7, 2.5, "2024-01-01");
        c.exact_date = false;
        c.exact_amount = false;
        let conditions = winner_conditions(&c);
        assert_eq!(conditions[0].op, ConditionOp::Is); // account
        assert_eq!(conditions[1].op, ConditionOp::Is); // payee
        assert_eq!(conditions[2].op, ConditionOp::IsApprox); // date
        assert_eq!(conditions[3].op, ConditionOp::IsApprox); // amount
    }

    #[tokio::test]
    async fn test_empty_account_is_skipped() {
        let mut ledger = MemoryLedger::new();
        ledger.add_account(1, "Checking", false);

        let discovery = ScheduleDiscovery::with_config(
            &ledger,
            &CalendarEvaluator,
            DiscoveryConfig {
                occurrence_count: 3,
                reference_date: Some(day("2024-01-29")),
            },
        );
        let schedules = discovery.discover().await.unwrap();
        assert!(schedules.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_returns_partial_results() {
        let mut ledger = MemoryLedger::new();
        ledger.add_account(1, "Checking", false);

        let token = CancelToken::new();
        token.cancel();

        let discovery = ScheduleDiscovery::new(&ledger, &CalendarEvaluator)
            .with_cancel_token(token);
        let schedules = discovery.discover().await.unwrap();
        assert!(schedules.is_empty());
    }
}
