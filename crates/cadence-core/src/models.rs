//! Domain models for Cadence

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// A ledger account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    /// Closed accounts are excluded from schedule discovery
    pub closed: bool,
}

/// A ledger transaction, as consumed by the inference core.
///
/// Amounts are signed integers in minor units (cents). Fields beyond these
/// exist in the ledger but are not read here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    pub payee_id: i64,
    /// Signed amount in minor units (negative for outflows)
    pub amount: i64,
    pub date: NaiveDate,
    /// Parent row of a split transaction
    pub is_parent: bool,
    /// Child row of a split transaction
    pub is_child: bool,
    /// Set when the payee is the counterpart of a transfer
    pub transfer_account_id: Option<i64>,
    /// Set when the transaction is already linked to a schedule
    pub schedule_id: Option<i64>,
}

/// Recurrence frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of a descriptor's `patterns` list.
///
/// Patterns refine which day within each period an occurrence falls on.
/// They are honored for monthly frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecurrencePattern {
    /// Numeric day of month; -1 means the last day of the month
    Day { value: i32 },
    /// Ordinal weekday of month (1 = first, 3 = third, -1 = last)
    Weekday { weekday: Weekday, ordinal: i32 },
}

/// A candidate recurrence rule: "every `interval` `frequency` from `start`",
/// optionally refined by `patterns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceDescriptor {
    pub frequency: Frequency,
    /// Period multiplier; defaults to 1 when absent in serialized form
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Always a calendar day, never a timestamp
    pub start: NaiveDate,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<RecurrencePattern>,
}

fn default_interval() -> u32 {
    1
}

impl RecurrenceDescriptor {
    pub fn new(frequency: Frequency, start: NaiveDate) -> Self {
        Self {
            frequency,
            interval: 1,
            start,
            patterns: Vec::new(),
        }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_patterns(mut self, patterns: Vec<RecurrencePattern>) -> Self {
        self.patterns = patterns;
        self
    }
}

/// The real transactions found within the date tolerance of one generated
/// occurrence date
#[derive(Debug, Clone)]
pub struct OccurrenceWindow {
    pub date: NaiveDate,
    pub transactions: Vec<Transaction>,
}

/// One scored candidate schedule for a payee.
///
/// `rank` is a sum of per-occurrence closeness scores, strictly positive,
/// bounded above by the number of occurrence windows considered.
#[derive(Debug, Clone)]
pub struct CandidateMatch {
    pub rank: f64,
    pub amount: i64,
    pub account_id: i64,
    pub payee_id: i64,
    pub date: RecurrenceDescriptor,
    /// Every occurrence matched on the identical calendar day
    pub exact_date: bool,
    /// Every matched transaction's amount equals the base amount exactly
    pub exact_amount: bool,
}

/// Condition operator for a finalized schedule rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOp {
    Is,
    IsApprox,
}

impl ConditionOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::IsApprox => "isapprox",
        }
    }
}

impl std::fmt::Display for ConditionOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Field a schedule condition applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionField {
    Account,
    Payee,
    Date,
    Amount,
}

impl ConditionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Payee => "payee",
            Self::Date => "date",
            Self::Amount => "amount",
        }
    }
}

impl std::fmt::Display for ConditionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed condition value, matching its field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Id(i64),
    Amount(i64),
    Date(RecurrenceDescriptor),
}

/// One structured rule condition of a finalized schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleCondition {
    pub op: ConditionOp,
    pub field: ConditionField,
    pub value: ConditionValue,
}

impl ScheduleCondition {
    pub fn new(op: ConditionOp, field: ConditionField, value: ConditionValue) -> Self {
        Self { op, field, value }
    }
}

/// The inferred schedule for one payee, the orchestrator's sole output.
///
/// Never mutated after backtracking completes; persistence is external.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizedSchedule {
    pub id: i64,
    pub account_id: i64,
    pub payee_id: i64,
    pub date: RecurrenceDescriptor,
    pub amount: i64,
    pub conditions: Vec<ScheduleCondition>,
}

impl FinalizedSchedule {
    /// The descriptor held by this schedule's date condition, if any
    pub fn date_condition(&self) -> Option<&ScheduleCondition> {
        self.conditions
            .iter()
            .find(|c| c.field == ConditionField::Date)
    }
}
