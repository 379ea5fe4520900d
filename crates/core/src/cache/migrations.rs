//! Store schema.
//!
//! `generations` holds one row per named generation; `entries` holds the
//! stored responses, keyed by `(generation, key_hash)` and removed with
//! their generation through `ON DELETE CASCADE`. Applied versions are
//! recorded in `_migrations`, so opening an existing store is a no-op.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Schema steps in apply order.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_generations.sql"))];

/// Bring the schema on `conn` up to the latest version.
///
/// Each pending step runs in its own transaction together with its
/// `_migrations` row.
///
/// # Errors
///
/// Returns `MigrationFailed` if a step's SQL fails, or a database error if
/// the version table cannot be read.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for &(version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql).map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version, "applied store migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
