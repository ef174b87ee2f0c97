//! Core types and traits for Billbook storage backends.
//!
//! This crate provides the `TransactionStore` trait, the transaction model,
//! date windows and the pure aggregation functions shared by every backend
//! and by the repository façade.

pub mod aggregate;
pub mod models;
pub mod storage;
pub mod window;

// Re-export key types at crate root for convenience
pub use models::{
    now_millis, CategoryStatistic, CategoryTotal, Direction, NewTransaction, Transaction,
    TransactionDraft, TransactionId, WindowStatistics,
};
pub use models::category::{categories_for, ExpenseCategory, IncomeCategory};
pub use storage::{GroupFilter, StoreError, TransactionStore};
pub use window::{
    format_date, parse_date, week_number_for, week_window, DateWindow, Dimension, WindowError,
    DEFAULT_WEEK_ANCHOR,
};
