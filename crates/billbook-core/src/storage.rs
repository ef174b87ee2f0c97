use time::Date;

use crate::models::{CategoryTotal, Direction, NewTransaction, Transaction, TransactionId};
use crate::window::DateWindow;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(String),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("corrupt row {id}: {reason}")]
    Corrupt { id: TransactionId, reason: String },
    #[error("{0}")]
    Other(String),
}

/// Date filter accepted by grouped scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupFilter {
    /// `YYYY-MM` or `YYYY`, matched as a prefix of the stored date.
    DatePrefix(String),
    /// Inclusive on both ends.
    DateRange { start: Date, end: Date },
}

/// Durable keyed collection of transactions.
///
/// Every call is self-contained: implementations acquire whatever handle they
/// need and release it before returning, so calls from several pool workers
/// never hold conflicting handles open. A failed call leaves no partially
/// applied mutation behind.
pub trait TransactionStore: Send + Sync {
    /// Stores `tx` and returns the positive id assigned to it.
    fn insert(&self, tx: &NewTransaction) -> Result<TransactionId, StoreError>;
    /// Overwrites the row with `tx.id`, keeping its `created_at`. Returns
    /// `false` when no row matched.
    fn update_by_id(&self, tx: &Transaction) -> Result<bool, StoreError>;
    fn delete_by_id(&self, id: TransactionId) -> Result<bool, StoreError>;
    fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;

    /// Newest first by `created_at`.
    fn scan_all(&self) -> Result<Vec<Transaction>, StoreError>;
    /// Newest first by `created_at`.
    fn scan_by_direction(&self, direction: Direction) -> Result<Vec<Transaction>, StoreError>;
    fn scan_by_exact_date(&self, date: Date) -> Result<Vec<Transaction>, StoreError>;
    fn scan_by_date_prefix(&self, prefix: &str) -> Result<Vec<Transaction>, StoreError>;
    /// Inclusive on both ends, latest date first.
    fn scan_by_date_range(&self, start: Date, end: Date) -> Result<Vec<Transaction>, StoreError>;
    /// Per-category sums for one direction, largest sum first.
    fn group_by_category(&self, filter: &GroupFilter, direction: Direction) -> Result<Vec<CategoryTotal>, StoreError>;

    fn scan_window(&self, window: &DateWindow) -> Result<Vec<Transaction>, StoreError> {
        match window {
            DateWindow::Day(d) => self.scan_by_exact_date(*d),
            DateWindow::Range { start, end } => self.scan_by_date_range(*start, *end),
            DateWindow::Month { .. } | DateWindow::Year(_) => {
                self.scan_by_date_prefix(&window.prefix().unwrap_or_default())
            },
        }
    }
}
