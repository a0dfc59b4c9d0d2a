//! Category registry
//!
//! A category is a registry row plus a folder under `documents/`. The folder
//! is always created before the row, so a registered category has a place
//! to put files.

use std::fs;

use tracing::{debug, info};

use crate::error::{LibraryError, LibraryResult};
use crate::models::{Category, DEFAULT_CATEGORY};
use crate::paths::LibraryPaths;
use crate::storage::MetadataStore;

const MAX_NAME_BYTES: usize = 255;
const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Check that a name is usable as a category folder
pub fn validate_category_name(name: &str) -> LibraryResult<()> {
    if name.trim().is_empty() {
        return Err(LibraryError::invalid_category(name, "name cannot be empty"));
    }
    if name.trim() != name {
        return Err(LibraryError::invalid_category(
            name,
            "name cannot start or end with whitespace",
        ));
    }
    if name == "." || name == ".." {
        return Err(LibraryError::invalid_category(name, "reserved name"));
    }
    if name.starts_with('.') {
        return Err(LibraryError::invalid_category(
            name,
            "name cannot start with '.'",
        ));
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(LibraryError::invalid_category(name, "name is too long"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control())
    {
        return Err(LibraryError::invalid_category(
            name,
            format!("name cannot contain {:?}", c),
        ));
    }
    Ok(())
}

/// Create, list and delete categories
///
/// Does not take the library lock; [`crate::Library`] does that around
/// every call.
pub struct CategoryRegistry<'a> {
    paths: &'a LibraryPaths,
    store: &'a mut MetadataStore,
}

impl<'a> CategoryRegistry<'a> {
    pub fn new(paths: &'a LibraryPaths, store: &'a mut MetadataStore) -> Self {
        Self { paths, store }
    }

    /// Create the category if needed and return it
    pub fn ensure(&mut self, name: &str) -> LibraryResult<Category> {
        validate_category_name(name)?;

        let dir = self.paths.category_dir(name);
        fs::create_dir_all(&dir).map_err(|e| LibraryError::from_io(e, &dir))?;

        if let Some(existing) = self.store.get_category(name)? {
            return Ok(existing);
        }

        let category = Category::new(name);
        self.store.insert_category(&category)?;
        info!("Created category '{}'", name);
        Ok(category)
    }

    pub fn get(&self, name: &str) -> LibraryResult<Option<Category>> {
        self.store.get_category(name)
    }

    pub fn exists(&self, name: &str) -> LibraryResult<bool> {
        Ok(self.get(name)?.is_some())
    }

    /// All categories, alphabetically
    pub fn list(&self) -> LibraryResult<Vec<Category>> {
        self.store.list_categories()
    }

    /// Delete an empty category and its folder
    pub fn delete(&mut self, name: &str) -> LibraryResult<()> {
        if name == DEFAULT_CATEGORY {
            return Err(LibraryError::invalid_category(
                name,
                "the default category cannot be deleted",
            ));
        }
        if !self.exists(name)? {
            return Err(LibraryError::CategoryNotFound(name.to_string()));
        }

        let documents = self.store.count_in_category(name)?;
        if documents > 0 {
            return Err(LibraryError::CategoryNotEmpty {
                name: name.to_string(),
                documents,
            });
        }

        let dir = self.paths.category_dir(name);
        if dir.exists() {
            fs::remove_dir(&dir).map_err(|e| LibraryError::from_io(e, &dir))?;
        } else {
            debug!("Category folder {:?} already gone", dir);
        }

        self.store.delete_category(name)?;
        info!("Deleted category '{}'", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        paths: LibraryPaths,
        store: MetadataStore,
    }

    fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let paths = LibraryPaths::new(temp_dir.path());
        let store = MetadataStore::open_in_memory().unwrap();
        Fixture {
            _temp_dir: temp_dir,
            paths,
            store,
        }
    }

    #[test]
    fn test_validate_category_name() {
        assert!(validate_category_name("Work").is_ok());
        assert!(validate_category_name("Reading List").is_ok());
        assert!(validate_category_name("2024-notes_v2").is_ok());
        assert!(validate_category_name("Café").is_ok());

        for bad in ["", "   ", " Work", "Work ", ".", "..", ".hidden", "a/b", "a\\b", "a:b", "a\nb"] {
            assert!(
                matches!(
                    validate_category_name(bad),
                    Err(LibraryError::InvalidCategory { .. })
                ),
                "expected {:?} to be rejected",
                bad
            );
        }
        assert!(validate_category_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let mut f = fixture();
        let mut registry = CategoryRegistry::new(&f.paths, &mut f.store);

        let first = registry.ensure("Work").unwrap();
        let second = registry.ensure("Work").unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.list().unwrap().len(), 1);
        assert!(f.paths.category_dir("Work").is_dir());
    }

    #[test]
    fn test_ensure_recreates_missing_folder() {
        let mut f = fixture();
        CategoryRegistry::new(&f.paths, &mut f.store)
            .ensure("Work")
            .unwrap();
        fs::remove_dir(f.paths.category_dir("Work")).unwrap();

        CategoryRegistry::new(&f.paths, &mut f.store)
            .ensure("Work")
            .unwrap();

        assert!(f.paths.category_dir("Work").is_dir());
    }

    #[test]
    fn test_ensure_rejects_invalid() {
        let mut f = fixture();
        let mut registry = CategoryRegistry::new(&f.paths, &mut f.store);

        assert!(matches!(
            registry.ensure("../escape"),
            Err(LibraryError::InvalidCategory { .. })
        ));
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_is_alphabetical_and_case_sensitive() {
        let mut f = fixture();
        let mut registry = CategoryRegistry::new(&f.paths, &mut f.store);
        registry.ensure("Work").unwrap();
        registry.ensure("Archive").unwrap();
        registry.ensure("Personal").unwrap();

        let names: Vec<_> = registry
            .list()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Archive", "Personal", "Work"]);
        assert!(!registry.exists("work").unwrap());
    }

    #[test]
    fn test_delete_empty_category() {
        let mut f = fixture();
        let mut registry = CategoryRegistry::new(&f.paths, &mut f.store);
        registry.ensure("Scratch").unwrap();

        registry.delete("Scratch").unwrap();

        assert!(!registry.exists("Scratch").unwrap());
        assert!(!f.paths.category_dir("Scratch").exists());
    }

    #[test]
    fn test_delete_non_empty_category_fails() {
        let mut f = fixture();
        CategoryRegistry::new(&f.paths, &mut f.store)
            .ensure("Work")
            .unwrap();
        f.store
            .upsert(&Document::new("documents/Work/a.md", "Work", "a"))
            .unwrap();

        let err = CategoryRegistry::new(&f.paths, &mut f.store)
            .delete("Work")
            .unwrap_err();

        assert!(matches!(
            err,
            LibraryError::CategoryNotEmpty { ref name, documents: 1 } if name == "Work"
        ));
        assert!(f.paths.category_dir("Work").is_dir());
    }

    #[test]
    fn test_delete_default_or_unknown() {
        let mut f = fixture();
        let mut registry = CategoryRegistry::new(&f.paths, &mut f.store);
        registry.ensure(DEFAULT_CATEGORY).unwrap();

        assert!(matches!(
            registry.delete(DEFAULT_CATEGORY),
            Err(LibraryError::InvalidCategory { .. })
        ));
        assert!(matches!(
            registry.delete("Missing"),
            Err(LibraryError::CategoryNotFound(_))
        ));
    }
}
