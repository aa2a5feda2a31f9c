use std::path::Path;

use anyhow::{Error, Result};
use rusqlite::Connection as SyncConnection;
use tokio_rusqlite::Connection;

/// Open (or create) the SQLite database backing the durable store.
pub async fn async_db(db_path: &str) -> Result<Connection, Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Connection::open(db_path).await?;
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await?;

    tracing::debug!("Opened database at {}", db_path);
    Ok(db)
}

/// Create the schema if it doesn't already exist. Safe to call on
/// every start.
pub fn initialize_db(conn: &SyncConnection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL
        );",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_async_db_creates_parent_and_schema() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("nested").join("imptech.db");
        let db = async_db(path.to_str().unwrap()).await?;

        let tables: i64 = db
            .call(|conn| {
                let count = conn.query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='kv'",
                    [],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        assert_eq!(tables, 1);
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_initialize_db_is_idempotent() {
        let conn = SyncConnection::open_in_memory().unwrap();
        initialize_db(&conn).unwrap();
        initialize_db(&conn).unwrap();
    }
}
