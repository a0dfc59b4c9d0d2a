//! SQLite schema for the metadata store

use rusqlite::{Connection, Result};

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_info (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Categories (one folder each under documents/)
        CREATE TABLE IF NOT EXISTS categories (
            name TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL
        );

        -- Documents
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            stored_path TEXT UNIQUE NOT NULL,
            original_path TEXT,
            category TEXT NOT NULL,
            title TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            added_at INTEGER NOT NULL,
            last_read_at INTEGER,
            last_opened_at INTEGER,
            FOREIGN KEY (category) REFERENCES categories(name)
        );

        CREATE INDEX IF NOT EXISTS idx_documents_category ON documents(category);
        CREATE INDEX IF NOT EXISTS idx_documents_is_read ON documents(is_read);
        "#,
    )?;

    migrate_v2(conn)?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Version 2 added `documents.last_opened_at`
fn migrate_v2(conn: &Connection) -> Result<()> {
    let has_column = conn
        .prepare("SELECT 1 FROM pragma_table_info('documents') WHERE name = 'last_opened_at'")?
        .exists([])?;
    if !has_column {
        conn.execute("ALTER TABLE documents ADD COLUMN last_opened_at INTEGER", [])?;
    }
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<Option<i32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_info WHERE key = 'version'")?;
    let result: Result<String> = stmt.query_row([], |row| row.get(0));

    match result {
        Ok(version_str) => Ok(version_str.parse().ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Check if schema needs initialization or migration
///
/// Errors (for example a file that is not a database) are returned rather
/// than treated as "needs init".
pub fn needs_init(conn: &Connection) -> Result<bool> {
    let table_exists = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_info'")?
        .exists([])?;

    if !table_exists {
        return Ok(true);
    }

    Ok(match get_schema_version(conn)? {
        Some(v) => v < SCHEMA_VERSION,
        None => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"documents".to_string()));
        assert!(tables.contains(&"categories".to_string()));
        assert!(tables.contains(&"schema_info".to_string()));
    }

    #[test]
    fn test_schema_version() {
        let conn = Connection::open_in_memory().unwrap();

        assert!(needs_init(&conn).unwrap());

        init_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
        assert!(!needs_init(&conn).unwrap());
    }

    #[test]
    fn test_init_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_upgrades_version_1_documents_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE schema_info (key TEXT PRIMARY KEY, value TEXT NOT NULL);
            INSERT INTO schema_info (key, value) VALUES ('version', '1');
            CREATE TABLE categories (name TEXT PRIMARY KEY, created_at INTEGER NOT NULL);
            CREATE TABLE documents (
                id TEXT PRIMARY KEY,
                stored_path TEXT UNIQUE NOT NULL,
                original_path TEXT,
                category TEXT NOT NULL,
                title TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                added_at INTEGER NOT NULL,
                last_read_at INTEGER
            );
            INSERT INTO categories VALUES ('Work', 0);
            INSERT INTO documents (id, stored_path, category, title, added_at)
                VALUES ('x', 'documents/Work/a.md', 'Work', 'a', 0);
            "#,
        )
        .unwrap();

        assert!(needs_init(&conn).unwrap());
        init_schema(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION));
        let opened: Option<i64> = conn
            .query_row("SELECT last_opened_at FROM documents WHERE id = 'x'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert!(opened.is_none());
    }

    #[test]
    fn test_indexes_exist() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(indexes.contains(&"idx_documents_category".to_string()));
        assert!(indexes.contains(&"idx_documents_is_read".to_string()));
    }
}
