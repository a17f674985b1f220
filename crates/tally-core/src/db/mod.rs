//! Database access layer with connection pooling and migrations
//!
//! Receipts are stored in two pieces: the document JSON without its line
//! items, plus one `line_items` row per item carrying an explicit
//! `position`. Reads reassemble the document with items in position
//! order; user-inserted items take the position before the current
//! minimum, which puts them at the head.
//!
//! This module is organized by domain:
//! - `receipts` - Receipt storage, retrieval, and the mutation model

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde::Serialize;

use crate::amount::Amount;
use crate::error::Result;
use crate::receipt::ReceiptDocument;

mod receipts;


pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// A persisted document with its storage identity, reassembled with line
/// items in display order.
#[derive(Debug, Clone, Serialize)]
pub struct StoredReceipt {
    pub id: i64,
    #[serde(flatten)]
    pub document: ReceiptDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Listing row: denormalized columns only, no document body.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiptSummary {
    pub id: i64,
    pub document_type: String,
    pub merchant: Option<String>,
    pub date: Option<NaiveDate>,
    pub final_total: Option<Amount>,
    pub created_at: DateTime<Utc>,
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool at the given path.
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path)
            // Cascade deletes depend on this pragma, and it is per
            // connection, so every pooled connection must set it.
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because each pooled
    /// connection to `:memory:` would see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = format!(
            "{}/tally_test_{}_{}.db",
            std::env::temp_dir().display(),
            std::process::id(),
            id
        );

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: better concurrency, readers don't block writers
            -- Note: creates -wal and -shm sidecar files alongside the database
            PRAGMA journal_mode = WAL;

            -- Synchronous NORMAL: good balance of safety and performance
            PRAGMA synchronous = NORMAL;

            -- Analyzed documents. document_json holds the classified
            -- document WITHOUT line_items; those live in their own table.
            -- merchant/receipt_date/final_total are denormalized for
            -- listing without parsing JSON.
            CREATE TABLE IF NOT EXISTS receipts (
                id INTEGER PRIMARY KEY,
                document_type TEXT NOT NULL,
                document_json TEXT NOT NULL,
                merchant TEXT,
                receipt_date TEXT,
                final_total TEXT,
                image_path TEXT,
                content_hash TEXT UNIQUE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Line items, ordered by position (lower = earlier). Head
            -- insertion uses MIN(position) - 1.
            CREATE TABLE IF NOT EXISTS line_items (
                id TEXT PRIMARY KEY,
                receipt_id INTEGER NOT NULL REFERENCES receipts(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                quantity REAL NOT NULL DEFAULT 1.0,
                unit_price TEXT NOT NULL,
                total_price TEXT NOT NULL,
                assignments TEXT NOT NULL DEFAULT '[]',
                position INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_line_items_receipt ON line_items(receipt_id);
            CREATE INDEX IF NOT EXISTS idx_receipts_created ON receipts(created_at);
            "#,
        )?;

        Ok(())
    }
}
