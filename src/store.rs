//! Dataset store: one durable generation of normalized sales records.
//!
//! The [`DatasetStore`] trait defines the two operations the rest of the
//! pipeline needs — replace the whole table, read it back date-ascending —
//! so the store is an injected dependency rather than ambient global state.
//! Backends: [`SqliteStore`] (durable) and [`MemoryStore`] (tests).
//!
//! Consistency contract: `replace_all` is a delete followed by chunked
//! inserts with **no cross-statement transaction**. A reader racing an
//! import may observe an empty or partially populated table, and a chunk
//! failure leaves the table partially populated with the committed count
//! reported to the caller. This is an accepted weak-consistency policy for
//! the expected access pattern (rare imports, frequent reads), not a bug.

use std::str::FromStr;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use thiserror::Error;

use crate::config::Config;
use crate::models::SalesRecord;
use crate::normalize::DATE_FORMAT;

/// Write failures, tagged with the failing phase and the progress made.
///
/// `committed` lets the caller distinguish "nothing happened" from "the
/// previous generation is gone and N rows of the new one landed" — a partial
/// import is reported, never silently treated as complete.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to clear the previous dataset generation: {message}")]
    Clear { message: String },
    #[error("failed to insert batch after {committed} records: {message}")]
    Insert { committed: u64, message: String },
}

impl StoreError {
    /// Records of the new generation committed before the failure.
    pub fn committed(&self) -> u64 {
        match self {
            StoreError::Clear { .. } => 0,
            StoreError::Insert { committed, .. } => *committed,
        }
    }

    /// Failing phase name for the wire contract: `"clear"` or `"insert"`.
    pub fn phase(&self) -> &'static str {
        match self {
            StoreError::Clear { .. } => "clear",
            StoreError::Insert { .. } => "insert",
        }
    }
}

/// Abstract store holding exactly one dataset generation.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Replace the entire stored generation with `records`.
    ///
    /// Returns the number of records committed. Never merges or appends.
    async fn replace_all(&self, records: &[SalesRecord]) -> Result<u64, StoreError>;

    /// Read the full generation, ascending by date; same-date records come
    /// back in ingestion order.
    async fn read_all_ordered(&self) -> Result<Vec<SalesRecord>>;
}

// ============ SQLite backend ============

/// SQLite-backed [`DatasetStore`] over the `vendas` table.
pub struct SqliteStore {
    pool: SqlitePool,
    batch_size: usize,
}

impl SqliteStore {
    /// Wrap an existing pool. `batch_size` caps records per INSERT statement.
    pub fn new(pool: SqlitePool, batch_size: usize) -> Self {
        Self { pool, batch_size }
    }

    /// Open (creating if missing) the database configured in `[db].path`.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = connect(config).await?;
        Ok(Self::new(pool, config.import.batch_size))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Connect to the configured SQLite database with WAL journaling.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[async_trait]
impl DatasetStore for SqliteStore {
    async fn replace_all(&self, records: &[SalesRecord]) -> Result<u64, StoreError> {
        // Delete-then-insert, deliberately not one transaction: last writer
        // wins, and a crash in between leaves an empty (not stale) table.
        sqlx::query("DELETE FROM vendas")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Clear {
                message: e.to_string(),
            })?;

        let mut committed: u64 = 0;

        for chunk in records.chunks(self.batch_size.max(1)) {
            let mut qb = sqlx::QueryBuilder::new(
                "INSERT INTO vendas (data, id_transacao, produto, categoria, regiao, \
                 quantidade, preco_unitario, receita_total, mes, ano) ",
            );
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(r.date.format(DATE_FORMAT).to_string())
                    .push_bind(&r.transaction_id)
                    .push_bind(&r.product)
                    .push_bind(&r.category)
                    .push_bind(&r.region)
                    .push_bind(r.quantity)
                    .push_bind(r.unit_price)
                    .push_bind(r.total_revenue)
                    .push_bind(r.month as i64)
                    .push_bind(r.year as i64);
            });

            qb.build()
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Insert {
                    committed,
                    message: e.to_string(),
                })?;

            committed += chunk.len() as u64;
            tracing::debug!(committed, total = records.len(), "inserted batch");
        }

        Ok(committed)
    }

    async fn read_all_ordered(&self) -> Result<Vec<SalesRecord>> {
        let rows = sqlx::query(
            "SELECT data, id_transacao, produto, categoria, regiao, quantidade, \
             preco_unitario, receita_total, mes, ano \
             FROM vendas ORDER BY data ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}

fn row_to_record(row: &SqliteRow) -> Result<SalesRecord> {
    let date_text: String = row.try_get("data")?;
    let date = NaiveDate::parse_from_str(&date_text, DATE_FORMAT)?;

    Ok(SalesRecord {
        date,
        transaction_id: row.try_get("id_transacao")?,
        product: row.try_get("produto")?,
        category: row.try_get("categoria")?,
        region: row.try_get("regiao")?,
        quantity: row.try_get("quantidade")?,
        unit_price: row.try_get("preco_unitario")?,
        total_revenue: row.try_get("receita_total")?,
        month: row.try_get::<i64, _>("mes")? as u32,
        year: row.try_get::<i64, _>("ano")? as i32,
    })
}

// ============ In-memory backend ============

/// In-memory [`DatasetStore`] for tests. Same ordering contract as SQLite.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<SalesRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatasetStore for MemoryStore {
    async fn replace_all(&self, records: &[SalesRecord]) -> Result<u64, StoreError> {
        let mut guard = self.records.write().expect("store lock poisoned");
        guard.clear();
        guard.extend_from_slice(records);
        Ok(records.len() as u64)
    }

    async fn read_all_ordered(&self) -> Result<Vec<SalesRecord>> {
        let guard = self.records.read().expect("store lock poisoned");
        let mut records = guard.clone();
        // Stable sort keeps ingestion order within a date.
        records.sort_by_key(|r| r.date);
        Ok(records)
    }
}
