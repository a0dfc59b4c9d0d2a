//! Library error handling
//!
//! One error type for every engine operation. Per-file import problems are
//! not errors: they are collected into the import summary instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during library operations
#[derive(Error, Debug)]
pub enum LibraryError {
    /// Source path is missing or of the wrong kind
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    /// Category name is empty or not safe to use as a folder name
    #[error("Invalid category name '{name}': {reason}")]
    InvalidCategory { name: String, reason: String },

    /// Category is not registered
    #[error("Category not found: '{0}'")]
    CategoryNotFound(String),

    /// Category still holds documents
    #[error("Category '{name}' still contains {documents} document(s)")]
    CategoryNotEmpty { name: String, documents: usize },

    /// Stored path is already taken by another document
    #[error("Stored path already in use: '{0}'")]
    DuplicatePath(String),

    /// No document with this id
    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Metadata records whose backing file is gone
    #[error("{} metadata record(s) have no backing file", ids.len())]
    OrphanRecords { ids: Vec<Uuid> },

    /// Another process holds the library lock
    #[error("Library at '{0}' is locked by another process")]
    Locked(PathBuf),

    /// Export target already has content
    #[error("Export destination '{0}' already exists and is not empty")]
    ExportDestinationExists(PathBuf),

    /// Metadata store cannot be read
    #[error("Metadata store at '{path}' is corrupt or unreadable: {details}")]
    CorruptStore { path: PathBuf, details: String },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File watcher error
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    /// I/O error with path context
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LibraryError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind.
    pub fn from_io(error: io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match error.kind() {
            io::ErrorKind::PermissionDenied => LibraryError::PermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::NotFound => LibraryError::InvalidPath {
                path,
                reason: "does not exist".to_string(),
            },
            _ => LibraryError::Io {
                path,
                source: error,
            },
        }
    }

    /// Convert a directory-walk error, keeping the path it happened at
    pub(crate) fn from_walk(error: walkdir::Error, fallback: &std::path::Path) -> Self {
        let path = error
            .path()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| fallback.to_path_buf());
        match error.into_io_error() {
            Some(io_error) => LibraryError::from_io(io_error, path),
            None => LibraryError::Io {
                path,
                source: io::Error::new(io::ErrorKind::Other, "filesystem loop detected"),
            },
        }
    }

    pub(crate) fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        LibraryError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_category(name: &str, reason: impl Into<String>) -> Self {
        LibraryError::InvalidCategory {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the caller should stop using this library
    ///
    /// The engine never repairs these itself.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LibraryError::CorruptStore { .. })
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            LibraryError::PermissionDenied { .. } => {
                Some("Check file and directory permissions of the library and the source files.")
            }
            LibraryError::CategoryNotEmpty { .. } => {
                Some("Move or remove the documents first, or delete with cascade.")
            }
            LibraryError::OrphanRecords { .. } => {
                Some("Restore the missing files, or prune the orphan records.")
            }
            LibraryError::Locked(_) => {
                Some("Wait for the other direktiv process to finish, then try again.")
            }
            LibraryError::CorruptStore { .. } => {
                Some("Restore database.db from a backup, or move it aside to start a fresh index.")
            }
            _ => None,
        }
    }
}

/// Result type for library operations
pub type LibraryResult<T> = Result<T, LibraryError>;
