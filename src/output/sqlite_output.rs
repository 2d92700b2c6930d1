//! SQLite output
//!
//! Records are stored per run, next to a row describing the run itself
//! (config hash, start URL, final counts).

use crate::extract::CanonicalProductRecord;
use crate::output::{CrawlReport, OutputResult, ResultSink};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// SQL schema for the output database
pub const SCHEMA_SQL: &str = r#"
-- One row per crawl run
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    start_url TEXT NOT NULL,
    status TEXT NOT NULL,
    accepted_count INTEGER NOT NULL DEFAULT 0,
    duplicate_count INTEGER NOT NULL DEFAULT 0
);

-- Accepted product records
CREATE TABLE IF NOT EXISTS products (
    run_id INTEGER NOT NULL REFERENCES runs(id),
    product_id TEXT NOT NULL,
    brand TEXT,
    title TEXT,
    price REAL,
    original_price REAL,
    currency TEXT,
    discount TEXT NOT NULL,
    product_url TEXT,
    image_url TEXT,
    stock_level INTEGER,
    in_stock INTEGER NOT NULL,
    designer_id TEXT,
    scraped_at TEXT NOT NULL,
    PRIMARY KEY (run_id, product_id)
);

CREATE INDEX IF NOT EXISTS idx_products_brand ON products(brand);
"#;

/// Sink storing records in a SQLite database
pub struct SqliteSink {
    conn: Mutex<Connection>,
    run_id: i64,
}

impl SqliteSink {
    /// Opens (or creates) the database and starts a new run
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `config_hash` - Hash of the configuration driving this run
    /// * `start_url` - First listing page of the run
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Database ready, run row inserted
    /// * `Err(OutputError)` - Failed to open or initialize the database
    pub fn open(path: &Path, config_hash: &str, start_url: &str) -> OutputResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        Self::with_connection(conn, config_hash, start_url)
    }

    /// Creates a sink over an in-memory database
    pub fn in_memory(config_hash: &str, start_url: &str) -> OutputResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn, config_hash, start_url)
    }

    fn with_connection(conn: Connection, config_hash: &str, start_url: &str) -> OutputResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, start_url, status) VALUES (?1, ?2, ?3, ?4)",
            params![Utc::now().to_rfc3339(), config_hash, start_url, "running"],
        )?;
        let run_id = conn.last_insert_rowid();

        Ok(Self {
            conn: Mutex::new(conn),
            run_id,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Number of products stored for this run
    pub fn count_products(&self) -> OutputResult<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM products WHERE run_id = ?1",
            params![self.run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Status string recorded for this run
    pub fn run_status(&self) -> OutputResult<String> {
        let status = self.conn().query_row(
            "SELECT status FROM runs WHERE id = ?1",
            params![self.run_id],
            |row| row.get(0),
        )?;
        Ok(status)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultSink for SqliteSink {
    fn push(&self, record: &CanonicalProductRecord) -> OutputResult<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO products (
                run_id, product_id, brand, title, price, original_price, currency,
                discount, product_url, image_url, stock_level, in_stock, designer_id,
                scraped_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                self.run_id,
                record.product_id,
                record.brand,
                record.title,
                record.price,
                record.original_price,
                record.currency,
                record.discount,
                record.product_url,
                record.image_url,
                record.stock_level,
                record.in_stock,
                record.designer_id,
                record.scraped_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn finalize(&self, report: &CrawlReport) -> OutputResult<()> {
        let status = if report.quota_reached {
            "quota_reached"
        } else {
            "completed"
        };

        self.conn().execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, accepted_count = ?3, duplicate_count = ?4
             WHERE id = ?5",
            params![
                status,
                Utc::now().to_rfc3339(),
                report.accepted as i64,
                report.duplicates as i64,
                self.run_id
            ],
        )?;
        Ok(())
    }
}
