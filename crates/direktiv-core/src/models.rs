//! Data models for direktiv
//!
//! Documents and categories, plus the value types the engine hands back to
//! its callers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::paths;

/// Name of the category that always exists
pub const DEFAULT_CATEGORY: &str = "General";

/// Current time at the millisecond precision the metadata store keeps
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// A markdown file under management
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier, assigned at first add
    pub id: Uuid,
    /// Path relative to the library root, `/`-separated
    pub stored_path: String,
    /// Where the file was copied from
    pub original_path: Option<String>,
    /// Owning category
    pub category: String,
    /// Display name
    pub title: String,
    /// Read flag
    pub read: bool,
    /// When this document was added
    pub added_at: DateTime<Utc>,
    /// When this document was last marked read
    pub last_read_at: Option<DateTime<Utc>>,
    /// When this document was last opened for viewing
    #[serde(default)]
    pub last_opened_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Create a new unread document
    pub fn new(
        stored_path: impl Into<String>,
        category: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            stored_path: stored_path.into(),
            original_path: None,
            category: category.into(),
            title: title.into(),
            read: false,
            added_at: now(),
            last_read_at: None,
            last_opened_at: None,
        }
    }

    /// Set the source path
    pub fn with_original_path(mut self, original: impl Into<PathBuf>) -> Self {
        self.original_path = Some(original.into().to_string_lossy().into_owned());
        self
    }

    /// File name part of the stored path
    pub fn file_name(&self) -> &str {
        paths::stored_file_name(&self.stored_path)
    }

    /// Short id for display
    pub fn short_id(&self) -> String {
        self.id.to_string()[..8].to_string()
    }

    /// Case-insensitive substring match on title or file name
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.file_name().to_lowercase().contains(&needle)
    }
}

/// A named partition of the library
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: now(),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Filter for document queries
///
/// Every option that is set must match. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFilter {
    /// Exact category name
    pub category: Option<String>,
    /// Case-insensitive substring on title or file name
    pub search_text: Option<String>,
    /// Read state
    pub read: Option<bool>,
}

impl DocumentFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search_text = Some(text.into());
        self
    }

    pub fn read(mut self, read: bool) -> Self {
        self.read = Some(read);
        self
    }

    /// Whether a document passes this filter
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(ref category) = self.category {
            if &doc.category != category {
                return false;
            }
        }
        if let Some(read) = self.read {
            if doc.read != read {
                return false;
            }
        }
        match self.search_text.as_deref() {
            Some(text) if !text.is_empty() => doc.matches_text(text),
            _ => true,
        }
    }
}

/// Overall and per-category counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub total_documents: usize,
    pub read_count: usize,
    pub unread_count: usize,
    pub total_categories: usize,
    /// Document count per category, empty categories included
    pub per_category: BTreeMap<String, usize>,
    /// Bytes used by document files that exist on disk
    pub total_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(stored: &str, category: &str, title: &str) -> Document {
        Document::new(stored, category, title)
    }

    #[test]
    fn test_document_new() {
        let d = doc("documents/Work/a.md", "Work", "a");
        assert!(!d.read);
        assert!(d.last_read_at.is_none());
        assert!(d.last_opened_at.is_none());
        assert!(d.original_path.is_none());
        assert_eq!(d.file_name(), "a.md");
        assert_eq!(d.short_id().len(), 8);
    }

    #[test]
    fn test_timestamps_are_whole_milliseconds() {
        let d = doc("documents/Work/a.md", "Work", "a");
        assert_eq!(d.added_at.timestamp_subsec_nanos() % 1_000_000, 0);

        let c = Category::new("Work");
        assert_eq!(c.created_at.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_matches_text_title_or_file_name() {
        let d = doc("documents/Work/rust-notes.md", "Work", "Ownership Primer");

        assert!(d.matches_text("primer"));
        assert!(d.matches_text("RUST"));
        assert!(!d.matches_text("python"));
    }

    #[test]
    fn test_filter_and_semantics() {
        let mut d = doc("documents/Work/rust.md", "Work", "Rust");
        d.read = true;

        assert!(DocumentFilter::all().matches(&d));
        assert!(DocumentFilter::all().category("Work").matches(&d));
        assert!(!DocumentFilter::all().category("work").matches(&d));
        assert!(DocumentFilter::all()
            .category("Work")
            .search("ru")
            .matches(&d));
        assert!(!DocumentFilter::all()
            .category("Work")
            .search("go")
            .matches(&d));
        assert!(!DocumentFilter::all().read(false).matches(&d));
        assert!(DocumentFilter::all().search("").matches(&d));
    }

    #[test]
    fn test_document_serialization() {
        let d = doc("documents/General/x.md", "General", "x").with_original_path("/tmp/x.md");
        let json = serde_json::to_string(&d).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
        assert_eq!(back.original_path.as_deref(), Some("/tmp/x.md"));
    }
}
