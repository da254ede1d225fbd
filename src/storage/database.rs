//! SQLite database management with migrations
//!
//! Structured storage for the document registry, chunk contents, embedding
//! vectors, and the persistent memory-store tables.

use crate::error::{Result, StrataError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

/// A registered document
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: u64,
    pub name: String,
    pub created_at: i64,
    pub chunk_count: usize,
}

impl Database {
    /// Create a new database connection
    pub fn new(db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StrataError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);

        let pool = Pool::builder()
            .max_size(16)
            .build(manager)
            .map_err(|e| StrataError::Config(format!("Failed to create connection pool: {}", e)))?;

        // Configure connection
        {
            let conn = pool
                .get()
                .map_err(|e| StrataError::Config(format!("Failed to get connection: {}", e)))?;

            // Enable WAL mode for better concurrency
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
        }

        let db = Self { pool };

        // Run migrations
        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| StrataError::Config(format!("Failed to get connection: {}", e)))
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;

                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Register a new document, returning its id
    pub fn insert_document(&self, name: &str) -> Result<u64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO documents (name, created_at) VALUES (?1, strftime('%s', 'now'))",
            params![name],
        )?;
        Ok(conn.last_insert_rowid() as u64)
    }

    /// Record how many chunks a document produced
    pub fn set_chunk_count(&self, document_id: u64, count: usize) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE documents SET chunk_count = ?1 WHERE id = ?2",
            params![count as i64, document_id as i64],
        )?;
        Ok(())
    }

    /// Look up one document
    pub fn get_document(&self, document_id: u64) -> Result<Option<DocumentRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at, chunk_count FROM documents WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![document_id as i64], row_to_document)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All registered documents, newest first
    pub fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at, chunk_count FROM documents ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], row_to_document)?;
        let mut documents = Vec::new();
        for row in rows {
            documents.push(row?);
        }
        Ok(documents)
    }

    /// Delete a document row; chunk rows cascade. Returns whether it existed.
    pub fn delete_document(&self, document_id: u64) -> Result<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM documents WHERE id = ?1",
            params![document_id as i64],
        )?;
        Ok(affected > 0)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;

        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;

        let chunk_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;

        let embedding_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;

        let memory_key_count: i64 = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM kv_entries) + (SELECT COUNT(*) FROM list_meta)",
            [],
            |row| row.get(0),
        )?;

        Ok(DbStats {
            document_count: document_count as usize,
            chunk_count: chunk_count as usize,
            embedding_count: embedding_count as usize,
            memory_key_count: memory_key_count as usize,
        })
    }
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get::<_, i64>(0)? as u64,
        name: row.get(1)?,
        created_at: row.get(2)?,
        chunk_count: row.get::<_, i64>(3)? as usize,
    })
}

/// Database statistics
#[derive(Debug)]
pub struct DbStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub embedding_count: usize,
    pub memory_key_count: usize,
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- Document registry
    CREATE TABLE documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        chunk_count INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX idx_documents_created_at ON documents(created_at);

    -- Chunk contents (also the keyword-search corpus)
    CREATE TABLE chunks (
        chunk_id TEXT PRIMARY KEY,
        document_id INTEGER NOT NULL,
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_chunks_document ON chunks(document_id);

    -- Embedding vectors, one row per (collection, chunk)
    CREATE TABLE embeddings (
        collection TEXT NOT NULL,
        chunk_id TEXT NOT NULL,
        document_id INTEGER NOT NULL,
        content TEXT NOT NULL,
        vector BLOB NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (collection, chunk_id)
    );

    CREATE INDEX idx_embeddings_document ON embeddings(collection, document_id);

    -- Memory store: string values with expiry
    CREATE TABLE kv_entries (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        expires_at INTEGER NOT NULL
    );

    -- Memory store: list items with per-key expiry
    CREATE TABLE list_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        key TEXT NOT NULL,
        item TEXT NOT NULL
    );

    CREATE INDEX idx_list_items_key ON list_items(key);

    CREATE TABLE list_meta (
        key TEXT PRIMARY KEY,
        expires_at INTEGER NOT NULL
    );
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_db_file() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let _db = Database::new(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_migrations_reach_latest_version() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Database::new(&db_path).unwrap();

        let conn = db.get_conn().unwrap();
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get(0))
            .unwrap();

        assert_eq!(version, MIGRATIONS.len() as i32);
    }

    #[test]
    fn test_expected_tables_present() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Database::new(&db_path).unwrap();
        let conn = db.get_conn().unwrap();

        let tables = vec![
            "documents",
            "chunks",
            "embeddings",
            "kv_entries",
            "list_items",
            "list_meta",
        ];

        for table in tables {
            let count: i32 = conn
                .query_row(
                    &format!(
                        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='{}'",
                        table
                    ),
                    [],
                    |row| row.get(0),
                )
                .unwrap();

            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_document_registry_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).unwrap();

        let id = db.insert_document("handbook.txt").unwrap();
        db.set_chunk_count(id, 7).unwrap();

        let doc = db.get_document(id).unwrap().unwrap();
        assert_eq!(doc.name, "handbook.txt");
        assert_eq!(doc.chunk_count, 7);

        assert_eq!(db.list_documents().unwrap().len(), 1);
        assert!(db.delete_document(id).unwrap());
        assert!(db.get_document(id).unwrap().is_none());
        assert!(!db.delete_document(id).unwrap());
    }

    #[test]
    fn test_chunk_rows_cascade_on_document_delete() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).unwrap();

        let id = db.insert_document("doc").unwrap();
        {
            let conn = db.get_conn().unwrap();
            conn.execute(
                "INSERT INTO chunks (chunk_id, document_id, chunk_index, content, created_at)
                 VALUES (?1, ?2, 1, 'body', strftime('%s', 'now'))",
                params![format!("{}_1", id), id as i64],
            )
            .unwrap();
        }

        db.delete_document(id).unwrap();

        let conn = db.get_conn().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
