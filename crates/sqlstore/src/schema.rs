//! DDL for the tables the bundled handlers use.
//!
//! `CREATE ... IF NOT EXISTS` only; there is no versioning.

use rusqlite::Connection;
use tracing::debug;

use crate::errors::Result;

/// Tables and indexes, safe to run on every start.
pub const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS star (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    dashboard_id INTEGER NOT NULL,
    UNIQUE (user_id, dashboard_id)
);

CREATE TABLE IF NOT EXISTS playlist (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    org_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    interval TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS playlist_item (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    playlist_id INTEGER NOT NULL,
    type TEXT NOT NULL,
    value TEXT NOT NULL,
    sort_order INTEGER NOT NULL,
    title TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_playlist_org ON playlist(org_id);
CREATE INDEX IF NOT EXISTS idx_playlist_item_playlist ON playlist_item(playlist_id, sort_order);
";

/// Create any missing tables.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    debug!("schema ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_created_and_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();

        assert!(tables.contains(&"star".to_string()));
        assert!(tables.contains(&"playlist".to_string()));
        assert!(tables.contains(&"playlist_item".to_string()));
    }
}
