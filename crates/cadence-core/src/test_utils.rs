//! Test utilities for cadence-core
//!
//! Provides an in-memory ledger implementing the [`Ledger`] trait, used by
//! unit and integration tests and available to downstream crates through
//! the `test-utils` feature.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::ledger::{Filter, Ledger, QueryOptions};
use crate::models::{Account, Transaction};

/// In-memory ledger backed by plain vectors.
///
/// Queries interpret the filter expression directly and return results in
/// the ledger's canonical order: date descending, id ascending as the
/// tiebreak (most recent first, matching the external query engine).
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&mut self, id: i64, name: &str, closed: bool) {
        self.accounts.push(Account {
            id,
            name: name.to_string(),
            closed,
        });
    }

    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }
}

/// Build a plain top-level transaction for tests
pub fn transaction(id: i64, account_id: i64, payee_id: i64, amount: i64, date: &str) -> Transaction {
    Transaction {
        id,
        account_id,
        payee_id,
        amount,
        date: date.parse().expect("valid test date"),
        is_parent: false,
        is_child: false,
        transfer_account_id: None,
        schedule_id: None,
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn query_transactions(
        &self,
        filter: &Filter,
        options: QueryOptions,
    ) -> Result<Vec<Transaction>> {
        let mut rows: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|tx| !(options.suppress_children && tx.is_child))
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn latest_transaction_date(&self, account_id: i64) -> Result<Option<NaiveDate>> {
        Ok(self
            .transactions
            .iter()
            .filter(|tx| tx.account_id == account_id && !tx.is_child)
            .map(|tx| tx.date)
            .max())
    }

    async fn open_accounts(&self) -> Result<Vec<Account>> {
        Ok(self
            .accounts
            .iter()
            .filter(|a| !a.closed)
            .cloned()
            .collect())
    }
}
