//! SQLite metadata store
//!
//! Durable table of document records and the category registry rows.
//! Every mutating call commits before it returns; multi-statement writes
//! run in a transaction.
//!
//! ## Tables
//!
//! - `documents` - one row per managed file, `stored_path` unique
//! - `categories` - registered category names
//! - `schema_info` - schema version

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use crate::error::{LibraryError, LibraryResult};
use crate::models::{self, Category, Document, DocumentFilter};
use crate::storage::schema::{init_schema, needs_init};

const DOCUMENT_COLUMNS: &str =
    "id, stored_path, original_path, category, title, is_read, added_at, last_read_at, last_opened_at";

/// Durable store of document and category records
pub struct MetadataStore {
    conn: Connection,
    path: PathBuf,
}

impl MetadataStore {
    /// Open or create the database at `path`
    ///
    /// A file that is not a SQLite database, or a corrupt one, is reported
    /// as [`LibraryError::CorruptStore`]. Nothing is repaired.
    pub fn open(path: &Path) -> LibraryResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LibraryError::from_io(e, parent))?;
        }

        let conn = Connection::open(path).map_err(|e| classify_open_error(path, e))?;
        Self::prepare(conn, path.to_path_buf())
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> LibraryResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::prepare(conn, PathBuf::from(":memory:"))
    }

    fn prepare(conn: Connection, path: PathBuf) -> LibraryResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = FULL;")
            .map_err(|e| classify_open_error(&path, e))?;

        if needs_init(&conn).map_err(|e| classify_open_error(&path, e))? {
            debug!("Initializing metadata schema at {:?}", path);
            init_schema(&conn).map_err(|e| classify_open_error(&path, e))?;
        }

        Ok(Self { conn, path })
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ==================== Documents ====================

    /// Insert or update a document by id
    ///
    /// Fails with [`LibraryError::DuplicatePath`] when another document holds
    /// the same stored path, and [`LibraryError::CategoryNotFound`] when the
    /// category is not registered.
    pub fn upsert(&mut self, doc: &Document) -> LibraryResult<()> {
        let id = doc.id.to_string();
        let tx = self.conn.transaction()?;

        let holder: Option<String> = tx
            .query_row(
                "SELECT id FROM documents WHERE stored_path = ?1",
                params![doc.stored_path],
                |row| row.get(0),
            )
            .optional()?;
        if matches!(holder, Some(ref other) if *other != id) {
            return Err(LibraryError::DuplicatePath(doc.stored_path.clone()));
        }

        let category_exists = tx
            .prepare("SELECT 1 FROM categories WHERE name = ?1")?
            .exists(params![doc.category])?;
        if !category_exists {
            return Err(LibraryError::CategoryNotFound(doc.category.clone()));
        }

        tx.execute(
            r#"
            INSERT INTO documents
                (id, stored_path, original_path, category, title, is_read, added_at,
                 last_read_at, last_opened_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                stored_path = excluded.stored_path,
                original_path = excluded.original_path,
                category = excluded.category,
                title = excluded.title,
                is_read = excluded.is_read,
                added_at = excluded.added_at,
                last_read_at = excluded.last_read_at,
                last_opened_at = excluded.last_opened_at
            "#,
            params![
                id,
                doc.stored_path,
                doc.original_path,
                doc.category,
                doc.title,
                doc.read,
                doc.added_at.timestamp_millis(),
                doc.last_read_at.map(|t| t.timestamp_millis()),
                doc.last_opened_at.map(|t| t.timestamp_millis()),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Get a document by id
    pub fn get(&self, id: Uuid) -> LibraryResult<Option<Document>> {
        let sql = format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS);
        let doc = self
            .conn
            .query_row(&sql, params![id.to_string()], document_from_row)
            .optional()?;
        Ok(doc)
    }

    /// Get a document by its stored path
    pub fn get_by_stored_path(&self, stored_path: &str) -> LibraryResult<Option<Document>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE stored_path = ?1",
            DOCUMENT_COLUMNS
        );
        let doc = self
            .conn
            .query_row(&sql, params![stored_path], document_from_row)
            .optional()?;
        Ok(doc)
    }

    /// Set the read flag
    ///
    /// Marking read stamps `last_read_at`. Setting the current value again
    /// changes nothing.
    pub fn set_read(&mut self, id: Uuid, read: bool) -> LibraryResult<Document> {
        let mut doc = self.get(id)?.ok_or(LibraryError::DocumentNotFound(id))?;
        if doc.read == read {
            return Ok(doc);
        }

        doc.read = read;
        if read {
            doc.last_read_at = Some(models::now());
        }

        self.conn.execute(
            "UPDATE documents SET is_read = ?1, last_read_at = ?2 WHERE id = ?3",
            params![
                doc.read,
                doc.last_read_at.map(|t| t.timestamp_millis()),
                id.to_string()
            ],
        )?;
        Ok(doc)
    }

    /// Stamp `last_opened_at` with the current time
    pub fn touch_opened(&mut self, id: Uuid) -> LibraryResult<Document> {
        let mut doc = self.get(id)?.ok_or(LibraryError::DocumentNotFound(id))?;
        let opened = models::now();
        doc.last_opened_at = Some(opened);

        self.conn.execute(
            "UPDATE documents SET last_opened_at = ?1 WHERE id = ?2",
            params![opened.timestamp_millis(), id.to_string()],
        )?;
        Ok(doc)
    }

    /// Documents matching a filter, ordered by category, title, stored path
    pub fn query(&self, filter: &DocumentFilter) -> LibraryResult<Vec<Document>> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(ref category) = filter.category {
            values.push(Value::Text(category.clone()));
            clauses.push(format!("category = ?{}", values.len()));
        }
        if let Some(read) = filter.read {
            values.push(Value::Integer(i64::from(read)));
            clauses.push(format!("is_read = ?{}", values.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {} FROM documents {} ORDER BY category, title, stored_path",
            DOCUMENT_COLUMNS, where_clause
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), document_from_row)?;

        let mut docs = Vec::new();
        for row in rows {
            let doc = row?;
            if filter.matches(&doc) {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    /// Delete a document record. Returns whether a row was removed.
    pub fn remove(&mut self, id: Uuid) -> LibraryResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id.to_string()])?;
        Ok(removed > 0)
    }

    /// Get count of documents
    pub fn document_count(&self) -> LibraryResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Get count of read documents
    pub fn read_count(&self) -> LibraryResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE is_read = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Documents in one category
    pub fn count_in_category(&self, name: &str) -> LibraryResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE category = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Document count for every registered category, by name
    pub fn counts_by_category(&self) -> LibraryResult<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.name, COUNT(d.id)
            FROM categories c
            LEFT JOIN documents d ON d.category = c.name
            GROUP BY c.name
            ORDER BY c.name
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((name, count as usize))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ==================== Categories ====================

    /// Register a category. Existing names are left untouched.
    pub fn insert_category(&mut self, category: &Category) -> LibraryResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO categories (name, created_at) VALUES (?1, ?2)",
            params![category.name, category.created_at.timestamp_millis()],
        )?;
        Ok(inserted > 0)
    }

    pub fn get_category(&self, name: &str) -> LibraryResult<Option<Category>> {
        let category = self
            .conn
            .query_row(
                "SELECT name, created_at FROM categories WHERE name = ?1",
                params![name],
                category_from_row,
            )
            .optional()?;
        Ok(category)
    }

    /// All categories in alphabetical order
    pub fn list_categories(&self) -> LibraryResult<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, created_at FROM categories ORDER BY name")?;
        let rows = stmt.query_map([], category_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Unregister a category. Fails on the foreign key if documents remain.
    pub fn delete_category(&mut self, name: &str) -> LibraryResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM categories WHERE name = ?1", params![name])?;
        Ok(removed > 0)
    }
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let added_at: i64 = row.get(6)?;
    let last_read_at: Option<i64> = row.get(7)?;
    let last_opened_at: Option<i64> = row.get(8)?;

    Ok(Document {
        id,
        stored_path: row.get(1)?,
        original_path: row.get(2)?,
        category: row.get(3)?,
        title: row.get(4)?,
        read: row.get(5)?,
        added_at: from_millis(added_at),
        last_read_at: last_read_at.map(from_millis),
        last_opened_at: last_opened_at.map(from_millis),
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    let created_at: i64 = row.get(1)?;
    Ok(Category {
        name: row.get(0)?,
        created_at: from_millis(created_at),
    })
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

fn classify_open_error(path: &Path, error: rusqlite::Error) -> LibraryError {
    match error.sqlite_error_code() {
        Some(ErrorCode::NotADatabase) | Some(ErrorCode::DatabaseCorrupt) => {
            LibraryError::CorruptStore {
                path: path.to_path_buf(),
                details: error.to_string(),
            }
        }
        _ => LibraryError::Database(error),
    }
}
