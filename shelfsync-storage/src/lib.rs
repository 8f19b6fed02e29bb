//! Local storage layer for shelfsync.
//!
//! Provides the durable side of the key/value space:
//!
//! - [`KvStore`] is the persistence port (get/set/delete by string key). The
//!   sync engine keeps its dirty set, last-modified marker and provisioned
//!   folder id behind it, and the [`LocalStore`] keeps one record per key.
//! - [`DuckDbKvStore`] persists the port in a single DuckDB table;
//!   [`MemoryKvStore`] is the in-process variant used by tests.
//! - [`Value`] is the typed value model. Local records carry a type tag so a
//!   load reconstructs the kind that was saved.

mod error;
mod kv_store;
mod local_store;
mod value;

pub use error::{StorageError, StorageResult};
pub use kv_store::{DuckDbKvStore, KvStore, MemoryKvStore};
pub use local_store::{LocalRecord, LocalStore};
pub use value::{BigInt, TypeTag, Value};

use tracing::warn;

/// Open a DuckDB connection with stale WAL recovery and resource limits.
///
/// If the initial open fails and a `.wal` file exists alongside the database,
/// it is removed and the open is retried once. This handles the common case
/// where an unclean shutdown leaves a WAL file that prevents reopening.
pub fn open_duckdb_with_wal_recovery(
    path: &std::path::Path,
    memory_limit: &str,
    threads: u32,
) -> StorageResult<duckdb::Connection> {
    let conn = match duckdb::Connection::open(path) {
        Ok(c) => c,
        Err(first_err) => {
            let wal_path = path.with_extension(
                path.extension()
                    .map(|ext| format!("{}.wal", ext.to_string_lossy()))
                    .unwrap_or_else(|| "wal".to_string()),
            );
            if wal_path.exists() {
                warn!(
                    "DuckDB open failed, removing stale WAL and retrying: {}",
                    wal_path.display()
                );
                if std::fs::remove_file(&wal_path).is_ok() {
                    let c = duckdb::Connection::open(path)?;
                    apply_resource_limits(&c, memory_limit, threads)?;
                    return Ok(c);
                }
            }
            return Err(first_err.into());
        }
    };
    apply_resource_limits(&conn, memory_limit, threads)?;
    Ok(conn)
}

/// Apply memory and thread limits to a DuckDB connection.
fn apply_resource_limits(
    conn: &duckdb::Connection,
    memory_limit: &str,
    threads: u32,
) -> StorageResult<()> {
    conn.execute_batch(&format!(
        "PRAGMA memory_limit='{}'; PRAGMA threads={};",
        memory_limit, threads
    ))?;
    Ok(())
}
