//! In-memory `TransactionStore`, used by tests and the `memory` backend.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
};

use billbook_core::{
    aggregate::group_totals, CategoryTotal, Direction, GroupFilter, NewTransaction, StoreError,
    Transaction, TransactionId, TransactionStore,
};
use time::Date;

pub struct InMemoryStore {
    rows: RwLock<BTreeMap<TransactionId, Transaction>>,
    id_counter: AtomicI64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            id_counter: AtomicI64::new(1),
        }
    }

    fn next_id(&self) -> TransactionId {
        self.id_counter.fetch_add(1, Ordering::SeqCst)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<TransactionId, Transaction>>, StoreError> {
        self.rows
            .read()
            .map_err(|_| StoreError::Other("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<TransactionId, Transaction>>, StoreError> {
        self.rows
            .write()
            .map_err(|_| StoreError::Other("memory store lock poisoned".to_string()))
    }

    fn filtered<F>(&self, keep: F) -> Result<Vec<Transaction>, StoreError>
    where
        F: Fn(&Transaction) -> bool,
    {
        Ok(self.read()?.values().filter(|tx| keep(tx)).cloned().collect())
    }
}

fn newest_created_first(rows: &mut [Transaction]) {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn latest_date_first(rows: &mut [Transaction]) {
    rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
}

fn matches_prefix(date: Date, prefix: &str) -> bool {
    billbook_core::format_date(date).starts_with(prefix)
}

impl TransactionStore for InMemoryStore {
    fn insert(&self, tx: &NewTransaction) -> Result<TransactionId, StoreError> {
        tx.validate()?;
        let mut rows = self.write()?;
        let id = self.next_id();
        rows.insert(id, tx.clone().into_transaction(id));
        tracing::debug!(id, "Transaction inserted");
        Ok(id)
    }

    fn update_by_id(&self, tx: &Transaction) -> Result<bool, StoreError> {
        tx.validate()?;
        let mut rows = self.write()?;
        match rows.get_mut(&tx.id) {
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = Transaction { created_at, ..tx.clone() };
                tracing::debug!(id = tx.id, "Transaction updated");
                Ok(true)
            },
            None => Ok(false),
        }
    }

    fn delete_by_id(&self, id: TransactionId) -> Result<bool, StoreError> {
        let removed = self.write()?.remove(&id).is_some();
        tracing::debug!(id, removed, "Transaction delete");
        Ok(removed)
    }

    fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn scan_all(&self) -> Result<Vec<Transaction>, StoreError> {
        let mut rows = self.filtered(|_| true)?;
        newest_created_first(&mut rows);
        Ok(rows)
    }

    fn scan_by_direction(&self, direction: Direction) -> Result<Vec<Transaction>, StoreError> {
        let mut rows = self.filtered(|tx| tx.direction == direction)?;
        newest_created_first(&mut rows);
        Ok(rows)
    }

    fn scan_by_exact_date(&self, date: Date) -> Result<Vec<Transaction>, StoreError> {
        self.filtered(|tx| tx.date == date)
    }

    fn scan_by_date_prefix(&self, prefix: &str) -> Result<Vec<Transaction>, StoreError> {
        let mut rows = self.filtered(|tx| matches_prefix(tx.date, prefix))?;
        latest_date_first(&mut rows);
        Ok(rows)
    }

    fn scan_by_date_range(&self, start: Date, end: Date) -> Result<Vec<Transaction>, StoreError> {
        let mut rows = self.filtered(|tx| start <= tx.date && tx.date <= end)?;
        latest_date_first(&mut rows);
        Ok(rows)
    }

    fn group_by_category(&self, filter: &GroupFilter, direction: Direction) -> Result<Vec<CategoryTotal>, StoreError> {
        let rows = self.filtered(|tx| {
            tx.direction == direction
                && match filter {
                    GroupFilter::DatePrefix(prefix) => matches_prefix(tx.date, prefix),
                    GroupFilter::DateRange { start, end } => *start <= tx.date && tx.date <= *end,
                }
        })?;
        Ok(group_totals(rows.into_iter().map(|tx| (tx.category, tx.amount))))
    }
}
