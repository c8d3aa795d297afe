//! Compressed SQL snapshots of the auction store.
//!
//! A snapshot is a zip archive holding a single deflated `auctions.sql` entry
//! in the same shape as `sqlite3 .dump`, so it can be restored either with
//! [`restore`] or with `unzip -p auctions.sql.zip | sqlite3 auctions.db`.

use std::ffi::OsString;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::SnapshotError;
use crate::store::AuctionStore;
use crate::types::SnapshotSummary;

/// Name of the SQL entry inside the archive.
pub const SNAPSHOT_ENTRY: &str = "auctions.sql";

/// Plain-text SQL dump of a database.
#[derive(Debug, Clone)]
pub struct SqlDump {
    pub sql: String,
    pub rows: u64,
}

/// Render every user table, index and trigger as SQL text.
///
/// Tables come first with their rows in rowid order, then indexes and
/// triggers, all wrapped in a single transaction.
pub fn dump_sql(conn: &Connection) -> Result<SqlDump, SnapshotError> {
    let mut out = String::from("PRAGMA foreign_keys=OFF;\nBEGIN TRANSACTION;\n");
    let mut rows = 0u64;

    let mut stmt = conn.prepare(
        r"SELECT type, name, sql FROM sqlite_master
          WHERE sql IS NOT NULL AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
          ORDER BY CASE type WHEN 'table' THEN 0 ELSE 1 END, rowid",
    )?;
    let objects: Vec<(String, String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<_, _>>()?;

    for (kind, name, sql) in &objects {
        let _ = writeln!(out, "{sql};");
        if kind == "table" {
            rows += dump_rows(conn, name, &mut out)?;
        }
    }

    out.push_str("COMMIT;\n");
    Ok(SqlDump { sql: out, rows })
}

fn dump_rows(conn: &Connection, table: &str, out: &mut String) -> Result<u64, SnapshotError> {
    let quoted = quote_ident(table);
    let mut stmt = conn.prepare(&format!("SELECT * FROM {quoted} ORDER BY rowid"))?;
    let columns = stmt.column_count();
    let mut rows = stmt.query([])?;
    let mut count = 0u64;

    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns);
        for i in 0..columns {
            values.push(sql_literal(row.get_ref(i)?));
        }
        let _ = writeln!(out, "INSERT INTO {quoted} VALUES({});", values.join(","));
        count += 1;
    }
    Ok(count)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQL literal that reloads to exactly the same stored value.
fn sql_literal(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) if f.is_nan() => "NULL".to_string(),
        ValueRef::Real(f) if f.is_infinite() => {
            let literal = if f > 0.0 { "9.0e999" } else { "-9.0e999" };
            literal.to_string()
        }
        // Debug formatting is the shortest representation that parses back
        // to the same f64 and always keeps a decimal point or exponent.
        ValueRef::Real(f) => format!("{f:?}"),
        // NUL would end the statement early and invalid UTF-8 cannot be
        // quoted, so such text is reloaded from its raw bytes.
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) if !text.contains('\0') => format!("'{}'", text.replace('\'', "''")),
            _ => format!("CAST({} AS TEXT)", hex_literal(bytes)),
        },
        ValueRef::Blob(bytes) => hex_literal(bytes),
    }
}

fn hex_literal(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2 + 3);
    hex.push_str("X'");
    for b in bytes {
        let _ = write!(hex, "{b:02X}");
    }
    hex.push('\'');
    hex
}

/// Export the database at `db_path` to a compressed snapshot at `out_path`.
///
/// The database is opened read-only. The archive is written next to
/// `out_path` and renamed into place once complete.
pub fn export(db_path: &Path, out_path: &Path) -> Result<SnapshotSummary, SnapshotError> {
    if !db_path.exists() {
        return Err(SnapshotError::MissingDatabase(db_path.to_path_buf()));
    }

    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let dump = dump_sql(&conn)?;
    drop(conn);

    let tmp_path = temp_sibling(out_path);
    if let Err(e) = write_archive(&tmp_path, &dump.sql) {
        if let Err(cleanup) = std::fs::remove_file(&tmp_path) {
            warn!("Could not remove partial snapshot {}: {cleanup}", tmp_path.display());
        }
        return Err(e);
    }
    std::fs::rename(&tmp_path, out_path)?;

    let summary = SnapshotSummary {
        path: out_path.display().to_string(),
        rows: dump.rows,
        dump_bytes: dump.sql.len() as u64,
        compressed_bytes: std::fs::metadata(out_path)?.len(),
    };
    info!(
        "Snapshot {}: {} -> {} ({:.1}% smaller), {} row(s)",
        db_path.display(),
        human_size(summary.dump_bytes),
        human_size(summary.compressed_bytes),
        summary.ratio_percent(),
        summary.rows,
    );
    Ok(summary)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_archive(path: &Path, sql: &str) -> Result<(), SnapshotError> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    // Fixed entry time so identical stores produce identical archives.
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .last_modified_time(DateTime::default());
    zip.start_file(SNAPSHOT_ENTRY, options)?;
    zip.write_all(sql.as_bytes())?;
    let mut writer = zip.finish()?;
    writer.flush()?;
    Ok(())
}

/// Decompress a snapshot and return its SQL text.
pub fn read_dump(snapshot_path: &Path) -> Result<String, SnapshotError> {
    let file = File::open(snapshot_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let mut entry = archive.by_name(SNAPSHOT_ENTRY)?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes)?;
    Ok(String::from_utf8(bytes)?)
}

/// Rebuild a database file from a snapshot. Returns the restored row count.
///
/// Refuses to touch an existing file at `db_path`.
pub fn restore(snapshot_path: &Path, db_path: &Path) -> Result<u64, SnapshotError> {
    if db_path.exists() {
        return Err(SnapshotError::TargetExists(db_path.to_path_buf()));
    }
    let sql = read_dump(snapshot_path)?;

    let loaded = Connection::open(db_path)
        .map_err(SnapshotError::from)
        .and_then(|conn| {
            conn.execute_batch(&sql)?;
            Ok(AuctionStore::from_connection(conn)?)
        })
        .and_then(|store| Ok(store.count()?));

    match loaded {
        Ok(rows) => {
            info!(
                "Restored {} row(s) from {} into {}",
                rows,
                snapshot_path.display(),
                db_path.display()
            );
            Ok(rows)
        }
        Err(e) => {
            if let Err(cleanup) = std::fs::remove_file(db_path) {
                warn!("Could not remove partial restore {}: {cleanup}", db_path.display());
            }
            Err(e)
        }
    }
}

/// Load a snapshot into a scratch in-memory store.
pub fn load_in_memory(snapshot_path: &Path) -> Result<AuctionStore, SnapshotError> {
    let sql = read_dump(snapshot_path)?;
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(&sql)?;
    Ok(AuctionStore::from_connection(conn)?)
}

fn human_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut n = size as f64;
    for unit in &UNITS[..UNITS.len() - 1] {
        if n < 1024.0 {
            return format!("{n:.2}{unit}");
        }
        n /= 1024.0;
    }
    format!("{n:.2}{}", UNITS[UNITS.len() - 1])
}
