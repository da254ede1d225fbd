//! Storage layer for Strata
//!
//! Provides structured database access and the durable memory store

pub mod database;
pub mod memory;

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use database::{Database, DbPool, DbStats, DocumentRecord};
pub use memory::SqliteMemoryStore;

/// Storage manager that owns the data directory and database handle
pub struct StorageManager {
    pub database: Arc<Database>,
    base_path: PathBuf,
}

impl StorageManager {
    /// Create a new storage manager
    pub fn new(base_path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&base_path).map_err(|e| crate::error::StrataError::Io {
            source: e,
            context: format!("Failed to create data directory: {}", base_path.display()),
        })?;

        let db_path = base_path.join("strata.db");
        let database = Arc::new(Database::new(&db_path)?);

        Ok(Self {
            database,
            base_path,
        })
    }

    /// Path of the data directory
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of the SQLite database file
    pub fn db_path(&self) -> PathBuf {
        self.base_path.join("strata.db")
    }

    /// Get combined storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        let db_stats = self.database.stats()?;

        Ok(StorageStats {
            db: db_stats,
            disk_size: Self::dir_size(&self.base_path)?,
        })
    }

    /// Calculate directory size recursively
    fn dir_size(path: &Path) -> Result<u64> {
        let mut size = 0u64;

        if path.is_dir() {
            for entry in std::fs::read_dir(path).map_err(|e| crate::error::StrataError::Io {
                source: e,
                context: format!(
                    "Failed to read directory for size calculation: {}",
                    path.display()
                ),
            })? {
                let entry = entry.map_err(|e| crate::error::StrataError::Io {
                    source: e,
                    context: "Failed to read directory entry for size calculation".to_string(),
                })?;
                let path = entry.path();

                if path.is_dir() {
                    size += Self::dir_size(&path)?;
                } else {
                    size += entry
                        .metadata()
                        .map_err(|e| crate::error::StrataError::Io {
                            source: e,
                            context: format!("Failed to get file metadata: {}", path.display()),
                        })?
                        .len();
                }
            }
        }

        Ok(size)
    }
}

/// Combined storage statistics
#[derive(Debug)]
pub struct StorageStats {
    pub db: DbStats,
    pub disk_size: u64,
}

impl StorageStats {
    /// Format size as human-readable string
    pub fn format_size(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_manager_creation() {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageManager::new(temp_dir.path().join("data")).unwrap();

        assert!(storage.base_path().exists());
        assert!(storage.db_path().exists());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(StorageStats::format_size(0), "0.00 B");
        assert_eq!(StorageStats::format_size(1023), "1023.00 B");
        assert_eq!(StorageStats::format_size(1024), "1.00 KB");
        assert_eq!(StorageStats::format_size(1024 * 1024), "1.00 MB");
        assert_eq!(StorageStats::format_size(1024 * 1024 * 1024), "1.00 GB");
    }

    #[test]
    fn test_stats_reflect_documents() {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageManager::new(temp_dir.path().join("data")).unwrap();

        storage.database.insert_document("a.txt").unwrap();
        storage.database.insert_document("b.txt").unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.db.document_count, 2);
        assert!(stats.disk_size > 0);
    }
}
