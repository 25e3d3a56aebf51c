//! Ledger query boundary
//!
//! The inference core never touches storage directly; it issues read-only
//! queries through the [`Ledger`] trait using a small typed filter
//! expression. Implementations may be backed by SQL, an API, or the
//! in-memory ledger in `test_utils`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Account, Transaction};

/// Filter expression over ledger transactions.
///
/// Mirrors the query engine's supported surface: field comparisons with
/// `$gte`/`$lte`/equality, null checks on `schedule` and the payee's
/// transfer account, and `$and`/`$or` combinators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    AccountEq(i64),
    PayeeEq(i64),
    /// Payee is not a transfer counterpart
    TransferAccountIsNull,
    /// Transaction is not yet linked to a schedule
    ScheduleIsNull,
    DateEq(NaiveDate),
    DateGte(NaiveDate),
    DateLte(NaiveDate),
    AmountEq(i64),
    AmountGte(i64),
    AmountLte(i64),
}

impl Filter {
    /// Whether a transaction satisfies this filter
    pub fn matches(&self, tx: &Transaction) -> bool {
        match self {
            Filter::And(inner) => inner.iter().all(|f| f.matches(tx)),
            Filter::Or(inner) => inner.iter().any(|f| f.matches(tx)),
            Filter::AccountEq(id) => tx.account_id == *id,
            Filter::PayeeEq(id) => tx.payee_id == *id,
            Filter::TransferAccountIsNull => tx.transfer_account_id.is_none(),
            Filter::ScheduleIsNull => tx.schedule_id.is_none(),
            Filter::DateEq(d) => tx.date == *d,
            Filter::DateGte(d) => tx.date >= *d,
            Filter::DateLte(d) => tx.date <= *d,
            Filter::AmountEq(a) => tx.amount == *a,
            Filter::AmountGte(a) => tx.amount >= *a,
            Filter::AmountLte(a) => tx.amount <= *a,
        }
    }
}

/// Options applied to a transaction query
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryOptions {
    /// Drop split-children from the result set
    pub suppress_children: bool,
}

impl QueryOptions {
    pub fn suppress_children() -> Self {
        Self {
            suppress_children: true,
        }
    }
}

/// Read-only ledger query interface.
///
/// All methods are async I/O calls; the core issues and awaits them
/// sequentially (no retries, failures propagate).
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Transactions matching `filter`, in a deterministic order
    async fn query_transactions(
        &self,
        filter: &Filter,
        options: QueryOptions,
    ) -> Result<Vec<Transaction>>;

    /// Date of the latest top-level (non-split-child) transaction on an
    /// account, or None when the account has no history
    async fn latest_transaction_date(&self, account_id: i64) -> Result<Option<NaiveDate>>;

    /// All accounts not marked closed
    async fn open_accounts(&self) -> Result<Vec<Account>>;
}

/// Cooperative cancellation signal for a discovery run.
///
/// Cloneable handle over a shared flag; the orchestrator checks it between
/// ledger round-trips and returns whatever was already finalized.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(amount: i64, date: &str) -> Transaction {
        Transaction {
            id: 1,
            account_id: 10,
            payee_id: 20,
            amount,
            date: date.parse().unwrap(),
            is_parent: false,
            is_child: false,
            transfer_account_id: None,
            schedule_id: None,
        }
    }

    #[test]
    fn test_filter_and_or() {
        let t = tx(-500, "2024-01-15");
        let range = Filter::And(vec![
            Filter::DateGte("2024-01-13".parse().unwrap()),
            Filter::DateLte("2024-01-17".parse().unwrap()),
        ]);
        assert!(range.matches(&t));

        let either = Filter::Or(vec![
            Filter::DateEq("2024-01-01".parse().unwrap()),
            Filter::DateEq("2024-01-15".parse().unwrap()),
        ]);
        assert!(either.matches(&t));
        assert!(!Filter::Or(vec![]).matches(&t));
        assert!(Filter::And(vec![]).matches(&t));
    }

    #[test]
    fn test_filter_null_checks() {
        let mut t = tx(-500, "2024-01-15");
        assert!(Filter::ScheduleIsNull.matches(&t));
        assert!(Filter::TransferAccountIsNull.matches(&t));
        t.schedule_id = Some(7);
        t.transfer_account_id = Some(3);
        assert!(!Filter::ScheduleIsNull.matches(&t));
        assert!(!Filter::TransferAccountIsNull.matches(&t));
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
