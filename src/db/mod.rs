use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use serde::Serialize;
use std::path::Path;

/// Local client storage: settings, role secrets and the persisted session.
/// Everything else is owned by the backend and never cached here.
pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionLogEntry {
    pub role: Option<String>,
    pub event: String,
    pub status: String,
    pub created_at: String,
}

impl Database {
    pub fn new(db_path: &Path) -> SqlResult<Self> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> SqlResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> SqlResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let mut db = Database { conn };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&mut self) -> SqlResult<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )?;

        let migrations = vec![
            (
                "001_create_settings.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/001_create_settings.sql"
                )),
            ),
            (
                "002_create_session_log.sql",
                include_str!(concat!(
                    env!("CARGO_MANIFEST_DIR"),
                    "/migrations/002_create_session_log.sql"
                )),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<String> = self
                .conn
                .query_row(
                    "SELECT name FROM schema_migrations WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;

            if applied.is_none() {
                let tx = self.conn.transaction()?;
                tx.execute_batch(sql)?;
                tx.execute(
                    "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, datetime('now'))",
                    params![name],
                )?;
                tx.commit()?;
            }
        }

        Ok(())
    }

    pub fn set_setting(&self, key: &str, value: &str) -> SqlResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> SqlResult<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM settings WHERE key = ?1")?;
        stmt.query_row(params![key], |row| row.get(0)).optional()
    }

    pub fn delete_setting(&self, key: &str) -> SqlResult<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// All settings whose key starts with `prefix`, with the prefix stripped.
    pub fn get_settings_with_prefix(&self, prefix: &str) -> SqlResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value FROM settings WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;

        let rows = stmt.query_map(params![prefix], |row| {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            Ok((key[prefix.len().min(key.len())..].to_string(), value))
        })?;

        rows.collect()
    }

    pub fn log_session(&self, role: Option<&str>, event: &str, status: &str) -> SqlResult<()> {
        self.conn.execute(
            "INSERT INTO session_log (id, role, event, status, created_at)
             VALUES (hex(randomblob(16)), ?1, ?2, ?3, datetime('now'))",
            params![role, event, status],
        )?;
        Ok(())
    }

    pub fn get_recent_session_log(&self, limit: usize) -> SqlResult<Vec<SessionLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT role, event, status, created_at
             FROM session_log
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(SessionLogEntry {
                role: row.get(0)?,
                event: row.get(1)?,
                status: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?;

        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip_and_delete() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_setting("api_url").unwrap(), None);

        db.set_setting("api_url", "http://a").unwrap();
        db.set_setting("api_url", "http://b").unwrap();
        assert_eq!(db.get_setting("api_url").unwrap().as_deref(), Some("http://b"));

        db.delete_setting("api_url").unwrap();
        db.delete_setting("api_url").unwrap();
        assert_eq!(db.get_setting("api_url").unwrap(), None);
    }

    #[test]
    fn prefix_lookup_strips_the_prefix() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting("secret.admin", "h1").unwrap();
        db.set_setting("secret.manager", "h2").unwrap();
        db.set_setting("session.role", "admin").unwrap();

        let secrets = db.get_settings_with_prefix("secret.").unwrap();
        assert_eq!(
            secrets,
            vec![
                ("admin".to_string(), "h1".to_string()),
                ("manager".to_string(), "h2".to_string())
            ]
        );
    }

    #[test]
    fn migrations_survive_reopening_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("desk.sqlite");
        {
            let db = Database::new(&path).unwrap();
            db.set_setting("currency_symbol", "$").unwrap();
        }
        let db = Database::new(&path).unwrap();
        assert_eq!(db.get_setting("currency_symbol").unwrap().as_deref(), Some("$"));
    }

    #[test]
    fn session_log_keeps_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.log_session(Some("admin"), "login", "success").unwrap();
        db.log_session(None, "login", "failed").unwrap();

        let entries = db.get_recent_session_log(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, "failed");
        assert_eq!(entries[0].role, None);
    }
}
