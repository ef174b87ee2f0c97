use std::{fmt::Display, sync::Arc};

use rust_decimal::Decimal;
use serde::Serialize;
use time::{Date, OffsetDateTime};

use crate::storage::StoreError;

pub mod category;

pub type TransactionId = i64;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Milliseconds since the Unix epoch, the unit of `created_at`.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Expense,
    Income,
}

impl Direction {
    /// Value of the `bill_type` column.
    pub fn code(self) -> i64 {
        match self {
            Direction::Expense => 0,
            Direction::Income => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Direction> {
        match code {
            0 => Some(Direction::Expense),
            1 => Some(Direction::Income),
            _ => None,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Expense => f.write_str("expense"),
            Direction::Income => f.write_str("income"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "expense" | "0" => Ok(Direction::Expense),
            "income" | "1" => Ok(Direction::Income),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// A persisted income or expense record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub category: Arc<str>,
    pub amount: Decimal,
    pub direction: Direction,
    pub memo: Option<Arc<str>>,
    #[serde(with = "iso_date")]
    pub date: Date,
    /// Fixed at creation, never touched by an update.
    pub created_at: i64,
}

impl Transaction {
    pub fn validate(&self) -> Result<(), StoreError> {
        validate_fields(&self.category, self.amount)
    }

    /// Applies the editable fields of `draft`, keeping id, date and creation time.
    pub fn apply_draft(&self, draft: TransactionDraft) -> Transaction {
        Transaction {
            id: self.id,
            category: draft.category,
            amount: draft.amount,
            direction: draft.direction,
            memo: draft.memo,
            date: self.date,
            created_at: self.created_at,
        }
    }
}

/// A transaction that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub category: Arc<str>,
    pub amount: Decimal,
    pub direction: Direction,
    pub memo: Option<Arc<str>>,
    pub date: Date,
    pub created_at: i64,
}

impl NewTransaction {
    /// Creates a record stamped with the current time.
    pub fn new(category: impl Into<Arc<str>>, amount: Decimal, direction: Direction, date: Date) -> Self {
        Self {
            category: category.into(),
            amount,
            direction,
            memo: None,
            date,
            created_at: now_millis(),
        }
    }

    pub fn with_memo(mut self, memo: impl Into<Arc<str>>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        validate_fields(&self.category, self.amount)
    }

    pub fn into_transaction(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            category: self.category,
            amount: self.amount,
            direction: self.direction,
            memo: self.memo,
            date: self.date,
            created_at: self.created_at,
        }
    }
}

/// The fields a user may change when editing an existing transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub category: Arc<str>,
    pub amount: Decimal,
    pub direction: Direction,
    pub memo: Option<Arc<str>>,
}

fn validate_fields(category: &str, amount: Decimal) -> Result<(), StoreError> {
    if category.trim().is_empty() {
        return Err(StoreError::InvalidRecord("category must not be empty".to_string()));
    }
    if amount <= Decimal::ZERO {
        return Err(StoreError::InvalidRecord(format!("amount must be positive, got {}", amount)));
    }
    Ok(())
}

/// Income, expense and balance over one date window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowStatistics {
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

/// Sum and count of one category, as produced by a store's grouped scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotal {
    pub category: Arc<str>,
    pub amount: Decimal,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStatistic {
    pub category: Arc<str>,
    pub amount: Decimal,
    pub count: u32,
    /// Share of the result set's total, in percent.
    pub percentage: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::date;

    #[test]
    fn test_direction_codes() {
        assert_eq!(Direction::Expense.code(), 0);
        assert_eq!(Direction::Income.code(), 1);
        assert_eq!(Direction::from_code(1), Some(Direction::Income));
        assert_eq!(Direction::from_code(7), None);
        assert_eq!("Income".parse::<Direction>(), Ok(Direction::Income));
    }

    #[test]
    fn test_validation() {
        let ok = NewTransaction::new("餐饮", dec!(50.00), Direction::Expense, date!(2024 - 05 - 01));
        assert!(ok.validate().is_ok());

        let zero = NewTransaction { amount: Decimal::ZERO, ..ok.clone() };
        assert!(matches!(zero.validate(), Err(StoreError::InvalidRecord(_))));

        let blank = NewTransaction { category: Arc::from("  "), ..ok };
        assert!(matches!(blank.validate(), Err(StoreError::InvalidRecord(_))));
    }

    #[test]
    fn test_apply_draft_keeps_date_and_created_at() {
        let tx = NewTransaction::new("餐饮", dec!(12), Direction::Expense, date!(2024 - 01 - 02))
            .with_created_at(1_000)
            .into_transaction(9);
        let edited = tx.apply_draft(TransactionDraft {
            category: Arc::from("交通"),
            amount: dec!(30),
            direction: Direction::Expense,
            memo: Some(Arc::from("taxi")),
        });
        assert_eq!(edited.id, 9);
        assert_eq!(edited.date, date!(2024 - 01 - 02));
        assert_eq!(edited.created_at, 1_000);
        assert_eq!(&*edited.category, "交通");
    }
}
