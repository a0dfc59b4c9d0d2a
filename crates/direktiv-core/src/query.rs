//! Query service
//!
//! Read-only views over the metadata store.

use std::fs;

use uuid::Uuid;

use crate::error::LibraryResult;
use crate::models::{Category, Document, DocumentFilter, LibraryStats};
use crate::paths::LibraryPaths;
use crate::storage::MetadataStore;

pub struct QueryService<'a> {
    paths: &'a LibraryPaths,
    store: &'a MetadataStore,
}

impl<'a> QueryService<'a> {
    pub fn new(paths: &'a LibraryPaths, store: &'a MetadataStore) -> Self {
        Self { paths, store }
    }

    /// Documents matching `filter`, ordered by category, title, stored path
    pub fn list_documents(&self, filter: &DocumentFilter) -> LibraryResult<Vec<Document>> {
        self.store.query(filter)
    }

    pub fn list_categories(&self) -> LibraryResult<Vec<Category>> {
        self.store.list_categories()
    }

    /// Title or file name search across all categories
    pub fn search(&self, text: &str) -> LibraryResult<Vec<Document>> {
        self.store.query(&DocumentFilter::all().search(text))
    }

    pub fn get(&self, id: Uuid) -> LibraryResult<Option<Document>> {
        self.store.get(id)
    }

    /// Counts from the store; sizes from the files that exist
    pub fn stats(&self) -> LibraryResult<LibraryStats> {
        let total_documents = self.store.document_count()?;
        let read_count = self.store.read_count()?;
        let per_category = self.store.counts_by_category()?.into_iter().collect();

        let total_size_bytes = self
            .store
            .query(&DocumentFilter::all())?
            .iter()
            .filter_map(|doc| fs::metadata(self.paths.resolve(&doc.stored_path)).ok())
            .map(|meta| meta.len())
            .sum();

        Ok(LibraryStats {
            total_documents,
            read_count,
            unread_count: total_documents - read_count,
            total_categories: self.store.list_categories()?.len(),
            per_category,
            total_size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryRegistry;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LibraryPaths, MetadataStore) {
        let temp_dir = TempDir::new().unwrap();
        let paths = LibraryPaths::new(temp_dir.path());
        let mut store = MetadataStore::open_in_memory().unwrap();

        let mut registry = CategoryRegistry::new(&paths, &mut store);
        registry.ensure("Work").unwrap();
        registry.ensure("Personal").unwrap();
        registry.ensure("Empty").unwrap();

        for (category, file, title, content) in [
            ("Work", "rust.md", "Rust Ownership", "# Rust\n"),
            ("Work", "go.md", "Go Channels", "# Go\n"),
            ("Personal", "diary.md", "Diary", "dear diary"),
        ] {
            let stored = crate::paths::stored_path_for(category, file);
            fs::write(paths.resolve(&stored), content).unwrap();
            store.upsert(&Document::new(stored, category, title)).unwrap();
        }

        (temp_dir, paths, store)
    }

    #[test]
    fn test_list_and_search() {
        let (_temp_dir, paths, store) = setup();
        let query = QueryService::new(&paths, &store);

        let work: Vec<_> = query
            .list_documents(&DocumentFilter::all().category("Work"))
            .unwrap()
            .into_iter()
            .map(|d| d.title)
            .collect();
        assert_eq!(work, vec!["Go Channels", "Rust Ownership"]);

        let found = query.search("RUST").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Rust Ownership");

        // Matches on file name too
        assert_eq!(query.search("diary.md").unwrap().len(), 1);
        assert!(query.search("python").unwrap().is_empty());
    }

    #[test]
    fn test_stats() {
        let (_temp_dir, paths, mut store) = setup();
        let rust = store
            .query(&DocumentFilter::all().search("rust"))
            .unwrap()
            .remove(0);
        store.set_read(rust.id, true).unwrap();

        let stats = QueryService::new(&paths, &store).stats().unwrap();

        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.read_count, 1);
        assert_eq!(stats.unread_count, 2);
        assert_eq!(stats.total_categories, 3);
        assert_eq!(stats.per_category.get("Work"), Some(&2));
        assert_eq!(stats.per_category.get("Empty"), Some(&0));
        assert_eq!(stats.total_size_bytes, 7 + 5 + 10);
    }

    #[test]
    fn test_stats_ignores_missing_files() {
        let (_temp_dir, paths, store) = setup();
        fs::remove_file(paths.destination_for("Personal", "diary.md")).unwrap();

        let stats = QueryService::new(&paths, &store).stats().unwrap();

        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.total_size_bytes, 7 + 5);
    }
}
