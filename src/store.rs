//! SQLite persistence for finished auctions.
//!
//! Rows are insert-only: duplicates are skipped by `auction_id` and triggers
//! abort any UPDATE or DELETE on the table.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::types::AuctionRecord;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS auctions (
    auction_id TEXT PRIMARY KEY NOT NULL,
    seller TEXT NOT NULL,
    seller_profile TEXT,
    buyer TEXT,
    buyer_profile TEXT,
    price INTEGER NOT NULL,
    bin INTEGER NOT NULL,
    item_bytes TEXT NOT NULL,
    item_id TEXT NOT NULL,
    item_name TEXT,
    item_count INTEGER NOT NULL,
    ended_at INTEGER NOT NULL,
    observed_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_auctions_ended_at ON auctions(ended_at);
CREATE INDEX IF NOT EXISTS idx_auctions_item_id ON auctions(item_id);
CREATE TRIGGER IF NOT EXISTS auctions_no_update BEFORE UPDATE ON auctions
BEGIN
    SELECT RAISE(ABORT, 'auction records are immutable');
END;
CREATE TRIGGER IF NOT EXISTS auctions_no_delete BEFORE DELETE ON auctions
BEGIN
    SELECT RAISE(ABORT, 'auction records are immutable');
END;
";

const SELECT_COLUMNS: &str = "auction_id, seller, seller_profile, buyer, buyer_profile, \
     price, bin, item_bytes, item_id, item_name, item_count, ended_at, observed_at";

/// Narrow read/write handle over the auctions database.
pub struct AuctionStore {
    conn: Connection,
}

impl AuctionStore {
    /// Open (or create) the database file and ensure the schema exists.
    ///
    /// The connection uses EXCLUSIVE locking, so once the first write lands no
    /// other process can read or write the file until the store is dropped.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        conn.pragma_update(None, "locking_mode", "EXCLUSIVE")?;

        let store = Self::from_connection(conn)?;
        debug!("Opened auction store at {}", path.display());
        Ok(store)
    }

    /// In-memory store, used for scratch loads of snapshots and in tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection, creating the schema if missing.
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert records whose `auction_id` is not yet stored.
    ///
    /// Runs as one transaction; returns the number of new rows.
    pub fn insert_new(&mut self, records: &[AuctionRecord]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO auctions
                 (auction_id, seller, seller_profile, buyer, buyer_profile,
                  price, bin, item_bytes, item_id, item_name, item_count,
                  ended_at, observed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for rec in records {
                inserted += stmt.execute(params![
                    rec.auction_id,
                    rec.seller,
                    rec.seller_profile,
                    rec.buyer,
                    rec.buyer_profile,
                    rec.price,
                    rec.bin,
                    rec.item_bytes,
                    rec.item_id,
                    rec.item_name,
                    rec.item_count,
                    rec.ended_at,
                    rec.observed_at,
                ])?;
            }
        }
        tx.commit()?;

        info!(
            "Inserted {} new auction(s), {} already stored",
            inserted,
            records.len() - inserted
        );
        Ok(inserted)
    }

    /// Total number of stored auctions.
    pub fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM auctions", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Number of stored Buy-It-Now auctions that have a buyer.
    pub fn count_bin_sales(&self) -> Result<u64, StoreError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM auctions WHERE bin = 1 AND buyer IS NOT NULL AND buyer <> ''",
            [],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    pub fn get(&self, auction_id: &str) -> Result<Option<AuctionRecord>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM auctions WHERE auction_id = ?1");
        let record = self
            .conn
            .query_row(&sql, params![auction_id], record_from_row)
            .optional()?;
        Ok(record)
    }

    /// Stored sales of one SkyBlock item id, oldest first.
    pub fn sales_of(&self, item_id: &str) -> Result<Vec<AuctionRecord>, StoreError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM auctions WHERE item_id = ?1 ORDER BY ended_at, rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![item_id], record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// All stored auctions in insertion order.
    pub fn all(&self) -> Result<Vec<AuctionRecord>, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM auctions ORDER BY rowid");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], record_from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AuctionRecord> {
    Ok(AuctionRecord {
        auction_id: row.get(0)?,
        seller: row.get(1)?,
        seller_profile: row.get(2)?,
        buyer: row.get(3)?,
        buyer_profile: row.get(4)?,
        price: row.get(5)?,
        bin: row.get(6)?,
        item_bytes: row.get(7)?,
        item_id: row.get(8)?,
        item_name: row.get(9)?,
        item_count: row.get(10)?,
        ended_at: row.get(11)?,
        observed_at: row.get(12)?,
    })
}
