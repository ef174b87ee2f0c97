//! Billbook: a personal income and expense ledger.
//!
//! The [`Repository`] façade serializes store access through a small worker
//! pool, exposes every operation in a synchronous and a cancellable
//! asynchronous form, and computes windowed and per-category statistics.

pub mod cli;
pub mod config;
pub mod error;
pub mod pool;
pub mod registry;
pub mod repository;
pub mod ticket;

pub use billbook_core::*;
pub use config::{Backend, Config};
pub use error::{ConfigError, RepositoryError};
pub use registry::{RequestId, RequestRegistry};
pub use repository::{shared, shared_repository, Repository, RepositoryState, DEFAULT_RECENT_DAYS};
pub use ticket::{Outcome, Ticket};
