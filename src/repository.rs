//! The repository façade.
//!
//! Every business operation comes in two forms. The synchronous form calls
//! the store directly and turns any store failure into an empty or default
//! result after logging it. The `_async` form submits the same work to the
//! worker pool and hands back a [`Ticket`]; the store error, if any, reaches
//! the ticket unless the request was cancelled first.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, OnceLock, PoisonError, RwLock},
};

use billbook_core::{
    aggregate::{category_breakdown, window_totals},
    now_millis, week_number_for, week_window, CategoryStatistic, DateWindow, Direction,
    NewTransaction, StoreError, Transaction, TransactionDraft, TransactionId, TransactionStore,
    WindowStatistics,
};
use billbook_memory::InMemoryStore;
use billbook_sqlite::SqliteStore;
use time::{Date, Month, OffsetDateTime};
use tokio::sync::oneshot;

use crate::config::{Backend, Config};
use crate::error::RepositoryError;
use crate::pool::WorkerPool;
use crate::registry::{RequestId, RequestRegistry};
use crate::ticket::Ticket;

/// Window used by [`Repository::recent`].
pub const DEFAULT_RECENT_DAYS: u32 = 7;

const MILLIS_PER_DAY: i64 = 86_400_000;

type StoreFactory = Arc<dyn Fn() -> Result<Arc<dyn TransactionStore>, StoreError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryState {
    Active,
    Closed,
}

enum State {
    Active {
        store: Arc<dyn TransactionStore>,
        pool: WorkerPool,
    },
    Closed,
}

pub struct Repository {
    state: RwLock<State>,
    registry: Arc<RequestRegistry>,
    factory: StoreFactory,
    workers: usize,
    week_anchor: Date,
}

impl Repository {
    pub fn open(config: &Config) -> Result<Self, RepositoryError> {
        let factory: StoreFactory = match config.storage.backend {
            Backend::Sqlite => {
                let path = config.storage.path.clone();
                Arc::new(move || -> Result<Arc<dyn TransactionStore>, StoreError> {
                    Ok(Arc::new(SqliteStore::open(&path)?))
                })
            },
            Backend::Memory => Arc::new(|| -> Result<Arc<dyn TransactionStore>, StoreError> {
                Ok(Arc::new(InMemoryStore::new()))
            }),
        };
        Self::build(factory, config.pool.workers, config.week_anchor())
    }

    /// Wraps an existing store. `reopen` reuses the same store.
    pub fn with_store(store: Arc<dyn TransactionStore>, workers: usize) -> Result<Self, RepositoryError> {
        let factory: StoreFactory = Arc::new(move || -> Result<Arc<dyn TransactionStore>, StoreError> {
            Ok(store.clone())
        });
        Self::build(factory, workers, billbook_core::DEFAULT_WEEK_ANCHOR)
    }

    fn build(factory: StoreFactory, workers: usize, week_anchor: Date) -> Result<Self, RepositoryError> {
        let store = factory()?;
        let pool = WorkerPool::new(workers)?;
        tracing::info!(workers = pool.size(), "Repository opened");
        Ok(Self {
            state: RwLock::new(State::Active { store, pool }),
            registry: Arc::new(RequestRegistry::new()),
            factory,
            workers,
            week_anchor,
        })
    }

    pub fn state(&self) -> RepositoryState {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            State::Active { .. } => RepositoryState::Active,
            State::Closed => RepositoryState::Closed,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == RepositoryState::Active
    }

    /// Cancels every live request, stops the pool and releases the store.
    /// Calling it on a closed repository does nothing.
    pub fn shutdown(&self) {
        let previous = std::mem::replace(
            &mut *self.state.write().unwrap_or_else(PoisonError::into_inner),
            State::Closed,
        );
        if let State::Active { pool, .. } = previous {
            let cancelled = self.registry.cancel_all();
            pool.shutdown();
            tracing::info!(cancelled, "Repository closed");
        }
    }

    /// Builds a fresh store and pool if the repository is closed.
    pub fn reopen(&self) -> Result<(), RepositoryError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let State::Active { .. } = *state {
            return Ok(());
        }
        let store = (self.factory)()?;
        let pool = WorkerPool::new(self.workers)?;
        *state = State::Active { store, pool };
        tracing::info!(workers = self.workers, "Repository reopened");
        Ok(())
    }

    pub fn week_anchor(&self) -> Date {
        self.week_anchor
    }

    pub fn today(&self) -> Date {
        OffsetDateTime::now_local()
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
            .date()
    }

    pub fn current_month(&self) -> DateWindow {
        DateWindow::month_of(self.today())
    }

    pub fn current_week(&self) -> DateWindow {
        let today = self.today();
        week_window(self.week_anchor, week_number_for(self.week_anchor, today))
            .unwrap_or(DateWindow::Day(today))
    }

    fn store(&self) -> Option<Arc<dyn TransactionStore>> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            State::Active { store, .. } => Some(store.clone()),
            State::Closed => None,
        }
    }

    /// Runs `f` against the store, substituting the default on any failure.
    fn run<T, F>(&self, op: &'static str, f: F) -> T
    where
        T: Default,
        F: FnOnce(&dyn TransactionStore) -> Result<T, StoreError>,
    {
        let Some(store) = self.store() else {
            tracing::debug!(op, "Repository closed, returning default");
            return T::default();
        };
        match guarded(store.as_ref(), f) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(op, error = %e, "Store call failed");
                T::default()
            },
        }
    }

    fn submit<T, F>(&self, op: &'static str, f: F) -> Result<Ticket<T>, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn TransactionStore) -> Result<T, StoreError> + Send + 'static,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let State::Active { store, pool } = &*state else {
            return Err(RepositoryError::Closed);
        };

        let id = self.registry.new_id(op);
        let token = self.registry.register(&id);
        let (sender, receiver) = oneshot::channel();
        let store = store.clone();
        let registry = self.registry.clone();
        let job_id = id.clone();

        pool.execute(move || {
            if token.is_cancelled() {
                tracing::debug!(request = %job_id, "Request cancelled before start");
                return;
            }
            let result = guarded(store.as_ref(), f);
            if token.is_cancelled() || !registry.complete(&job_id) {
                tracing::debug!(request = %job_id, "Result discarded");
                return;
            }
            if let Err(e) = &result {
                tracing::warn!(request = %job_id, error = %e, "Request failed");
            }
            if sender.send(result).is_err() {
                tracing::debug!(request = %job_id, "Ticket dropped before delivery");
            }
        });

        Ok(Ticket::new(id, receiver, self.registry.clone()))
    }

    /// Returns whether the request was still live.
    pub fn cancel(&self, id: &RequestId) -> bool {
        self.registry.cancel(id)
    }

    pub fn cancel_all(&self) -> usize {
        self.registry.cancel_all()
    }

    pub fn active_requests(&self) -> usize {
        self.registry.len()
    }

    // Writes

    /// `None` when the record was rejected or the store failed.
    pub fn add(&self, tx: NewTransaction) -> Option<TransactionId> {
        self.run("add", |store| store.insert(&tx).map(Some))
    }

    pub fn add_async(&self, tx: NewTransaction) -> Result<Ticket<TransactionId>, RepositoryError> {
        self.submit("add", move |store| store.insert(&tx))
    }

    pub fn update(&self, tx: &Transaction) -> bool {
        self.run("update", |store| store.update_by_id(tx))
    }

    pub fn update_async(&self, tx: Transaction) -> Result<Ticket<bool>, RepositoryError> {
        self.submit("update", move |store| store.update_by_id(&tx))
    }

    /// Applies `draft` to the stored record, keeping its date and creation time.
    pub fn edit(&self, id: TransactionId, draft: TransactionDraft) -> bool {
        self.run("edit", |store| edit(store, id, draft))
    }

    pub fn edit_async(&self, id: TransactionId, draft: TransactionDraft) -> Result<Ticket<bool>, RepositoryError> {
        self.submit("edit", move |store| edit(store, id, draft))
    }

    pub fn delete(&self, id: TransactionId) -> bool {
        self.run("delete", |store| store.delete_by_id(id))
    }

    pub fn delete_async(&self, id: TransactionId) -> Result<Ticket<bool>, RepositoryError> {
        self.submit("delete", move |store| store.delete_by_id(id))
    }

    // Lookups and lists

    pub fn find_by_id(&self, id: TransactionId) -> Option<Transaction> {
        self.run("find_by_id", |store| store.find_by_id(id))
    }

    pub fn find_by_id_async(&self, id: TransactionId) -> Result<Ticket<Option<Transaction>>, RepositoryError> {
        self.submit("find_by_id", move |store| store.find_by_id(id))
    }

    pub fn list_all(&self) -> Vec<Transaction> {
        self.run("list_all", |store| store.scan_all())
    }

    pub fn list_all_async(&self) -> Result<Ticket<Vec<Transaction>>, RepositoryError> {
        self.submit("list_all", |store| store.scan_all())
    }

    pub fn list_by_direction(&self, direction: Direction) -> Vec<Transaction> {
        self.run("list_by_direction", |store| store.scan_by_direction(direction))
    }

    pub fn list_by_direction_async(&self, direction: Direction) -> Result<Ticket<Vec<Transaction>>, RepositoryError> {
        self.submit("list_by_direction", move |store| store.scan_by_direction(direction))
    }

    /// Transactions created within the last `days` days, whatever their date.
    pub fn list_by_recency_window(&self, days: u32) -> Vec<Transaction> {
        self.run("list_by_recency_window", |store| recently_created(store, days, now_millis()))
    }

    pub fn list_by_recency_window_async(&self, days: u32) -> Result<Ticket<Vec<Transaction>>, RepositoryError> {
        self.submit("list_by_recency_window", move |store| recently_created(store, days, now_millis()))
    }

    pub fn recent(&self) -> Vec<Transaction> {
        self.list_by_recency_window(DEFAULT_RECENT_DAYS)
    }

    pub fn recent_async(&self) -> Result<Ticket<Vec<Transaction>>, RepositoryError> {
        self.list_by_recency_window_async(DEFAULT_RECENT_DAYS)
    }

    pub fn list_by_exact_date(&self, date: Date) -> Vec<Transaction> {
        self.run("list_by_exact_date", |store| store.scan_by_exact_date(date))
    }

    pub fn list_by_exact_date_async(&self, date: Date) -> Result<Ticket<Vec<Transaction>>, RepositoryError> {
        self.submit("list_by_exact_date", move |store| store.scan_by_exact_date(date))
    }

    pub fn list_window(&self, window: DateWindow) -> Vec<Transaction> {
        self.run("list_window", |store| store.scan_window(&window))
    }

    // Statistics

    pub fn statistics_for(&self, window: DateWindow) -> WindowStatistics {
        self.run("statistics", |store| statistics(store, &window))
    }

    pub fn statistics_for_async(&self, window: DateWindow) -> Result<Ticket<WindowStatistics>, RepositoryError> {
        self.submit("statistics", move |store| statistics(store, &window))
    }

    pub fn statistics_for_day(&self, date: Date) -> WindowStatistics {
        self.statistics_for(DateWindow::Day(date))
    }

    pub fn statistics_for_day_async(&self, date: Date) -> Result<Ticket<WindowStatistics>, RepositoryError> {
        self.statistics_for_async(DateWindow::Day(date))
    }

    /// `start` and `end` are both inclusive.
    pub fn statistics_for_week(&self, start: Date, end: Date) -> WindowStatistics {
        self.statistics_for(DateWindow::Range { start, end })
    }

    pub fn statistics_for_week_async(&self, start: Date, end: Date) -> Result<Ticket<WindowStatistics>, RepositoryError> {
        self.statistics_for_async(DateWindow::Range { start, end })
    }

    pub fn statistics_for_month(&self, year: i32, month: Month) -> WindowStatistics {
        self.statistics_for(DateWindow::Month { year, month })
    }

    pub fn statistics_for_month_async(&self, year: i32, month: Month) -> Result<Ticket<WindowStatistics>, RepositoryError> {
        self.statistics_for_async(DateWindow::Month { year, month })
    }

    pub fn statistics_for_year(&self, year: i32) -> WindowStatistics {
        self.statistics_for(DateWindow::Year(year))
    }

    pub fn statistics_for_year_async(&self, year: i32) -> Result<Ticket<WindowStatistics>, RepositoryError> {
        self.statistics_for_async(DateWindow::Year(year))
    }

    // Category breakdowns

    pub fn category_breakdown_for(&self, window: DateWindow, direction: Direction) -> Vec<CategoryStatistic> {
        self.run("category_breakdown", |store| breakdown(store, &window, direction))
    }

    pub fn category_breakdown_for_async(
        &self,
        window: DateWindow,
        direction: Direction,
    ) -> Result<Ticket<Vec<CategoryStatistic>>, RepositoryError> {
        self.submit("category_breakdown", move |store| breakdown(store, &window, direction))
    }

    pub fn category_breakdown_for_week(&self, start: Date, end: Date, direction: Direction) -> Vec<CategoryStatistic> {
        self.category_breakdown_for(DateWindow::Range { start, end }, direction)
    }

    pub fn category_breakdown_for_week_async(
        &self,
        start: Date,
        end: Date,
        direction: Direction,
    ) -> Result<Ticket<Vec<CategoryStatistic>>, RepositoryError> {
        self.category_breakdown_for_async(DateWindow::Range { start, end }, direction)
    }

    pub fn category_breakdown_for_month(&self, year: i32, month: Month, direction: Direction) -> Vec<CategoryStatistic> {
        self.category_breakdown_for(DateWindow::Month { year, month }, direction)
    }

    pub fn category_breakdown_for_month_async(
        &self,
        year: i32,
        month: Month,
        direction: Direction,
    ) -> Result<Ticket<Vec<CategoryStatistic>>, RepositoryError> {
        self.category_breakdown_for_async(DateWindow::Month { year, month }, direction)
    }

    pub fn category_breakdown_for_year(&self, year: i32, direction: Direction) -> Vec<CategoryStatistic> {
        self.category_breakdown_for(DateWindow::Year(year), direction)
    }

    pub fn category_breakdown_for_year_async(
        &self,
        year: i32,
        direction: Direction,
    ) -> Result<Ticket<Vec<CategoryStatistic>>, RepositoryError> {
        self.category_breakdown_for_async(DateWindow::Year(year), direction)
    }
}

impl Drop for Repository {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs `f`, reporting a panic inside the store as a `StoreError` so the
/// caller still sees a failure and the request still gets deregistered.
fn guarded<T, F>(store: &dyn TransactionStore, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&dyn TransactionStore) -> Result<T, StoreError>,
{
    panic::catch_unwind(AssertUnwindSafe(|| f(store)))
        .unwrap_or_else(|payload| Err(StoreError::Other(format!("store call panicked: {}", panic_message(&*payload)))))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn edit(store: &dyn TransactionStore, id: TransactionId, draft: TransactionDraft) -> Result<bool, StoreError> {
    match store.find_by_id(id)? {
        Some(existing) => store.update_by_id(&existing.apply_draft(draft)),
        None => Ok(false),
    }
}

fn recently_created(store: &dyn TransactionStore, days: u32, now: i64) -> Result<Vec<Transaction>, StoreError> {
    let horizon = i64::from(days) * MILLIS_PER_DAY;
    Ok(store
        .scan_all()?
        .into_iter()
        .filter(|tx| now.saturating_sub(tx.created_at) <= horizon)
        .collect())
}

fn statistics(store: &dyn TransactionStore, window: &DateWindow) -> Result<WindowStatistics, StoreError> {
    Ok(window_totals(&store.scan_window(window)?))
}

fn breakdown(
    store: &dyn TransactionStore,
    window: &DateWindow,
    direction: Direction,
) -> Result<Vec<CategoryStatistic>, StoreError> {
    Ok(category_breakdown(store.group_by_category(&window.group_filter(), direction)?))
}

static SHARED: OnceLock<Arc<Repository>> = OnceLock::new();
static SHARED_INIT: Mutex<()> = Mutex::new(());

/// The process-wide repository, built from `config` on first use. Later
/// calls return the same instance and ignore their argument.
pub fn shared(config: &Config) -> Result<Arc<Repository>, RepositoryError> {
    if let Some(repo) = SHARED.get() {
        return Ok(repo.clone());
    }
    let _guard = SHARED_INIT.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(repo) = SHARED.get() {
        return Ok(repo.clone());
    }
    let repo = Arc::new(Repository::open(config)?);
    let _ = SHARED.set(repo.clone());
    tracing::debug!("Shared repository initialised");
    Ok(repo)
}

/// The process-wide repository, if [`shared`] has been called.
pub fn shared_repository() -> Option<Arc<Repository>> {
    SHARED.get().cloned()
}
