//! Occurrence-window pattern matching
//!
//! Given the occurrence windows generated for one recurrence descriptor,
//! finds per-transaction chains of matching transactions across the windows
//! and scores them. The most recent window acts as the base; every base
//! transaction must find a same-payee, amount-tolerant counterpart in every
//! older window or it yields no candidate.

use tracing::debug;

use crate::models::{CandidateMatch, OccurrenceWindow, RecurrenceDescriptor, Transaction};
use crate::rules::{approx_amount_threshold, date_rank};

/// Match occurrence windows against each other and emit scored candidates.
///
/// `windows` must be in the chronological order they were generated in.
/// One candidate is emitted per base-window transaction whose chain is
/// complete; a single older window with no qualifying transaction
/// invalidates the whole chain.
pub fn match_windows(
    windows: &[OccurrenceWindow],
    config: &RecurrenceDescriptor,
) -> Vec<CandidateMatch> {
    let reversed: Vec<&OccurrenceWindow> = windows.iter().rev().collect();
    let Some((base, older)) = reversed.split_first() else {
        return Vec::new();
    };

    let mut candidates = Vec::new();

    for trans in &base.transactions {
        let threshold = approx_amount_threshold(trans.amount);

        let found: Vec<Option<&Transaction>> = older
            .iter()
            .map(|occur| {
                // First transaction within the amount tolerance wins; the
                // payee check applies to that one, not to later candidates.
                let matched = occur.transactions.iter().find(|t| {
                    t.amount >= trans.amount - threshold && t.amount <= trans.amount + threshold
                });
                matched.filter(|t| t.payee_id == trans.payee_id)
            })
            .collect();

        if found.iter().any(|m| m.is_none()) {
            debug!(
                payee = trans.payee_id,
                base_date = %base.date,
                "chain broken: an occurrence window has no qualifying transaction"
            );
            continue;
        }

        // The base transaction is scored against its own window date (1.0
        // unless it sat a day or two off the occurrence); each older match
        // adds its date closeness.
        let mut rank = date_rank(base.date, trans.date);
        let mut exact_amount = true;
        for (occur, matched) in older.iter().zip(&found) {
            let Some(matched) = matched else { continue };
            rank += date_rank(occur.date, matched.date);
            exact_amount = exact_amount && matched.amount == trans.amount;
        }

        // Rank tops out at the window count only when every occurrence
        // matched on the identical calendar day.
        let exact_date = rank == (older.len() + 1) as f64;

        candidates.push(CandidateMatch {
            rank,
            amount: trans.amount,
            account_id: trans.account_id,
            payee_id: trans.payee_id,
            date: config.clone(),
            exact_date,
            exact_amount,
        });
    }

    candidates
}
