//! direktiv Core Library
//!
//! This crate provides the library management engine for direktiv, a
//! personal library of markdown documents organized by category with
//! durable read/unread tracking.
//!
//! # Architecture
//!
//! - **Files**: documents live under `<root>/documents/<Category>/`
//! - **SQLite**: `database.db` holds document records and the category
//!   registry
//!
//! The two are kept in step by copying files before recording them and
//! removing files before forgetting them. `reconcile` reports whatever a
//! crash left behind.
//!
//! # Quick Start
//!
//! ```text
//! let mut library = Library::open(Path::new("/home/me/.direktiv"))?;
//!
//! // Add a file
//! let doc = library.add(Path::new("notes.md"), "Personal", None)?;
//! library.set_read(doc.id, true)?;
//!
//! // Import a folder
//! let summary = library.import_path(Path::new("~/wiki"), Some("Work"), &ImportOptions::default())?;
//!
//! // Query
//! let unread = library.list_documents(&DocumentFilter::all().read(false))?;
//! ```
//!
//! # Modules
//!
//! - `library`: the `Library` context (main entry point)
//! - `paths`: path normalization and the on-disk layout
//! - `category`: category validation and registry
//! - `storage`: SQLite metadata store
//! - `store`: file copy, removal, export and reconcile
//! - `import`: directory and file import
//! - `query`: read-only listings and statistics
//! - `watcher`: change notification on `documents/`
//! - `config`: user preferences (read by front ends only)

pub mod category;
pub mod config;
pub mod error;
pub mod import;
pub mod library;
pub mod lock;
pub mod models;
pub mod paths;
pub mod query;
pub mod storage;
pub mod store;
pub mod watcher;

pub use config::Config;
pub use error::{LibraryError, LibraryResult};
pub use import::{ImportControl, ImportOptions, ImportProgress, ImportSummary, SkipReason};
pub use library::{CategoryDeletion, Library, LibraryOptions};
pub use models::{Category, Document, DocumentFilter, LibraryStats, DEFAULT_CATEGORY};
pub use store::{ExportSummary, ReconcileReport};
pub use watcher::{LibraryEvent, LibraryWatcher};
