//! SQLite `TransactionStore` backed by a single `bill` table.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use billbook_core::{
    aggregate::group_totals, format_date, parse_date, CategoryTotal, Direction, GroupFilter,
    NewTransaction, StoreError, Transaction, TransactionId, TransactionStore,
};
use rusqlite::{params, Connection, OptionalExtension, Params};
use rust_decimal::{
    prelude::{FromPrimitive, ToPrimitive},
    Decimal,
};
use time::Date;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS bill (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        type TEXT NOT NULL,
        amount REAL NOT NULL,
        bill_type INTEGER NOT NULL,
        remark TEXT,
        date TEXT NOT NULL,
        create_time INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_bill_date ON bill(date);
    CREATE INDEX IF NOT EXISTS idx_bill_create_time ON bill(create_time);
";

const COLUMNS: &str = "id, type, amount, bill_type, remark, date, create_time";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

enum Source {
    /// A fresh connection is opened for every call.
    File(PathBuf),
    /// A private in-memory database only lives as long as its connection.
    Memory(Mutex<Connection>),
}

pub struct SqliteStore {
    source: Source,
}

fn sql_err(e: rusqlite::Error) -> StoreError {
    StoreError::Sqlite(e.to_string())
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`; `":memory:"` gives
    /// a private in-memory database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let source = if path == Path::new(":memory:") {
            let conn = Connection::open_in_memory().map_err(sql_err)?;
            conn.execute_batch(SCHEMA).map_err(sql_err)?;
            Source::Memory(Mutex::new(conn))
        } else {
            let conn = Connection::open(path).map_err(sql_err)?;
            conn.execute_batch("PRAGMA journal_mode=WAL;").map_err(sql_err)?;
            conn.execute_batch(SCHEMA).map_err(sql_err)?;
            Source::File(path.to_path_buf())
        };
        tracing::debug!(path = %path.display(), "SQLite store opened");
        Ok(Self { source })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        match &self.source {
            Source::File(path) => {
                let conn = Connection::open(path).map_err(sql_err)?;
                conn.busy_timeout(BUSY_TIMEOUT).map_err(sql_err)?;
                f(&conn)
            },
            Source::Memory(conn) => {
                let conn = conn
                    .lock()
                    .map_err(|_| StoreError::Other("sqlite connection lock poisoned".to_string()))?;
                f(&conn)
            },
        }
    }

    fn query<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Transaction>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql).map_err(sql_err)?;
            let raw = stmt
                .query_map(params, RawRow::from_row)
                .map_err(sql_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(sql_err)?;
            raw.into_iter().map(RawRow::into_transaction).collect()
        })
    }
}

struct RawRow {
    id: TransactionId,
    category: String,
    amount: f64,
    bill_type: i64,
    remark: Option<String>,
    date: String,
    create_time: i64,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
        Ok(RawRow {
            id: row.get(0)?,
            category: row.get(1)?,
            amount: row.get(2)?,
            bill_type: row.get(3)?,
            remark: row.get(4)?,
            date: row.get(5)?,
            create_time: row.get(6)?,
        })
    }

    fn into_transaction(self) -> Result<Transaction, StoreError> {
        let id = self.id;
        let corrupt = |reason: String| StoreError::Corrupt { id, reason };
        let direction = Direction::from_code(self.bill_type)
            .ok_or_else(|| corrupt(format!("unknown bill_type {}", self.bill_type)))?;
        let date = parse_date(&self.date).map_err(|e| corrupt(e.to_string()))?;
        Ok(Transaction {
            id,
            category: Arc::from(self.category),
            amount: decode_amount(self.amount).ok_or_else(|| corrupt(format!("amount {}", self.amount)))?,
            direction,
            memo: self.remark.map(Arc::from),
            date,
            created_at: self.create_time,
        })
    }
}

fn decode_amount(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.normalize())
}

fn encode_amount(value: Decimal) -> Result<f64, StoreError> {
    value
        .to_f64()
        .ok_or_else(|| StoreError::InvalidRecord(format!("amount {} is not representable", value)))
}

impl TransactionStore for SqliteStore {
    fn insert(&self, tx: &NewTransaction) -> Result<TransactionId, StoreError> {
        tx.validate()?;
        let amount = encode_amount(tx.amount)?;
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO bill (type, amount, bill_type, remark, date, create_time) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    tx.category.as_ref(),
                    amount,
                    tx.direction.code(),
                    tx.memo.as_deref(),
                    format_date(tx.date),
                    tx.created_at
                ],
            )
            .map_err(sql_err)?;
            Ok(conn.last_insert_rowid())
        })?;
        tracing::debug!(id, "Bill inserted");
        Ok(id)
    }

    fn update_by_id(&self, tx: &Transaction) -> Result<bool, StoreError> {
        tx.validate()?;
        let amount = encode_amount(tx.amount)?;
        let changed = self.with_conn(|conn| {
            conn.execute(
                "UPDATE bill SET type = ?1, amount = ?2, bill_type = ?3, remark = ?4, date = ?5 WHERE id = ?6",
                params![
                    tx.category.as_ref(),
                    amount,
                    tx.direction.code(),
                    tx.memo.as_deref(),
                    format_date(tx.date),
                    tx.id
                ],
            )
            .map_err(sql_err)
        })?;
        tracing::debug!(id = tx.id, changed, "Bill update");
        Ok(changed > 0)
    }

    fn delete_by_id(&self, id: TransactionId) -> Result<bool, StoreError> {
        let changed = self.with_conn(|conn| {
            conn.execute("DELETE FROM bill WHERE id = ?1", params![id]).map_err(sql_err)
        })?;
        tracing::debug!(id, changed, "Bill delete");
        Ok(changed > 0)
    }

    fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let raw = self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM bill WHERE id = ?1", COLUMNS),
                params![id],
                RawRow::from_row,
            )
            .optional()
            .map_err(sql_err)
        })?;
        raw.map(RawRow::into_transaction).transpose()
    }

    fn scan_all(&self) -> Result<Vec<Transaction>, StoreError> {
        self.query(
            &format!("SELECT {} FROM bill ORDER BY create_time DESC, id DESC", COLUMNS),
            params![],
        )
    }

    fn scan_by_direction(&self, direction: Direction) -> Result<Vec<Transaction>, StoreError> {
        self.query(
            &format!("SELECT {} FROM bill WHERE bill_type = ?1 ORDER BY create_time DESC, id DESC", COLUMNS),
            params![direction.code()],
        )
    }

    fn scan_by_exact_date(&self, date: Date) -> Result<Vec<Transaction>, StoreError> {
        self.query(
            &format!("SELECT {} FROM bill WHERE date = ?1 ORDER BY id", COLUMNS),
            params![format_date(date)],
        )
    }

    fn scan_by_date_prefix(&self, prefix: &str) -> Result<Vec<Transaction>, StoreError> {
        self.query(
            &format!(
                "SELECT {} FROM bill WHERE substr(date, 1, length(?1)) = ?1 ORDER BY date DESC, create_time DESC",
                COLUMNS
            ),
            params![prefix],
        )
    }

    fn scan_by_date_range(&self, start: Date, end: Date) -> Result<Vec<Transaction>, StoreError> {
        self.query(
            &format!(
                "SELECT {} FROM bill WHERE date >= ?1 AND date <= ?2 ORDER BY date DESC, create_time DESC",
                COLUMNS
            ),
            params![format_date(start), format_date(end)],
        )
    }

    fn group_by_category(&self, filter: &GroupFilter, direction: Direction) -> Result<Vec<CategoryTotal>, StoreError> {
        let rows = match filter {
            GroupFilter::DatePrefix(prefix) => self.query(
                &format!(
                    "SELECT {} FROM bill WHERE bill_type = ?1 AND substr(date, 1, length(?2)) = ?2",
                    COLUMNS
                ),
                params![direction.code(), prefix],
            )?,
            GroupFilter::DateRange { start, end } => self.query(
                &format!(
                    "SELECT {} FROM bill WHERE bill_type = ?1 AND date >= ?2 AND date <= ?3",
                    COLUMNS
                ),
                params![direction.code(), format_date(*start), format_date(*end)],
            )?,
        };
        Ok(group_totals(rows.into_iter().map(|tx| (tx.category, tx.amount))))
    }
}
