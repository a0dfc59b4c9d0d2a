//! Library context
//!
//! [`Library`] is built once from a resolved root and owns everything the
//! engine works with: the paths, the metadata store handle and the default
//! category. Every mutating method takes the advisory lock for its
//! duration; reads do not.

use std::fs;
use std::path::Path;

use tracing::{debug, info};
use uuid::Uuid;

use crate::category::CategoryRegistry;
use crate::error::{LibraryError, LibraryResult};
use crate::import::{ImportControl, ImportOptions, ImportProgress, ImportSummary, Importer};
use crate::lock::LibraryLock;
use crate::models::{Category, Document, DocumentFilter, LibraryStats, DEFAULT_CATEGORY};
use crate::paths::LibraryPaths;
use crate::query::QueryService;
use crate::storage::MetadataStore;
use crate::store::{ExportSummary, LibraryStore, ReconcileReport, StoreReader};
use crate::watcher::LibraryWatcher;

/// Settings applied when opening a library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryOptions {
    /// Category used when none is given and for top-level imported files
    pub default_category: String,
}

impl Default for LibraryOptions {
    fn default() -> Self {
        Self {
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }
}

/// How to treat documents when deleting a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryDeletion {
    /// Fail if the category still holds documents
    #[default]
    RequireEmpty,
    /// Remove every document in the category first
    Cascade,
}

/// An open document library
pub struct Library {
    paths: LibraryPaths,
    metadata: MetadataStore,
    default_category: String,
}

impl Library {
    /// Open or create the library at `root` with default options
    pub fn open(root: &Path) -> LibraryResult<Self> {
        Self::open_with(root, &LibraryOptions::default())
    }

    /// Open or create the library at `root`
    ///
    /// A new root gets the `documents/` folder, an empty metadata store and
    /// the `General` category.
    pub fn open_with(root: &Path, options: &LibraryOptions) -> LibraryResult<Self> {
        fs::create_dir_all(root).map_err(|e| LibraryError::from_io(e, root))?;
        let root = fs::canonicalize(root).map_err(|e| LibraryError::from_io(e, root))?;
        let paths = LibraryPaths::new(root);

        let documents_dir = paths.documents_dir();
        fs::create_dir_all(&documents_dir)
            .map_err(|e| LibraryError::from_io(e, &documents_dir))?;

        let _lock = LibraryLock::acquire(&paths.lock_path())?;
        let mut metadata = MetadataStore::open(&paths.database_path())?;

        let mut registry = CategoryRegistry::new(&paths, &mut metadata);
        registry.ensure(DEFAULT_CATEGORY)?;
        if options.default_category != DEFAULT_CATEGORY {
            registry.ensure(&options.default_category)?;
        }

        info!("Opened library at {:?}", paths.root());
        Ok(Self {
            paths,
            metadata,
            default_category: options.default_category.clone(),
        })
    }

    pub fn paths(&self) -> &LibraryPaths {
        &self.paths
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    fn lock(&self) -> LibraryResult<LibraryLock> {
        LibraryLock::acquire(&self.paths.lock_path())
    }

    fn store(&mut self) -> LibraryStore<'_> {
        LibraryStore::new(&self.paths, &mut self.metadata)
    }

    fn reader(&self) -> StoreReader<'_> {
        StoreReader::new(&self.paths, &self.metadata)
    }

    fn query(&self) -> QueryService<'_> {
        QueryService::new(&self.paths, &self.metadata)
    }

    // ==================== Categories ====================

    /// Create the category if needed
    pub fn ensure_category(&mut self, name: &str) -> LibraryResult<Category> {
        let _lock = self.lock()?;
        CategoryRegistry::new(&self.paths, &mut self.metadata).ensure(name)
    }

    /// Delete a category; returns how many documents were removed with it
    pub fn delete_category(&mut self, name: &str, mode: CategoryDeletion) -> LibraryResult<usize> {
        let _lock = self.lock()?;

        let mut removed = 0;
        if mode == CategoryDeletion::Cascade {
            if name == DEFAULT_CATEGORY {
                return Err(LibraryError::invalid_category(
                    name,
                    "the default category cannot be deleted",
                ));
            }
            if self.metadata.get_category(name)?.is_none() {
                return Err(LibraryError::CategoryNotFound(name.to_string()));
            }

            let documents = self.metadata.query(&DocumentFilter::all().category(name))?;
            for doc in documents {
                self.store().remove_document(doc.id)?;
                removed += 1;
            }
            debug!("Removed {} document(s) from '{}'", removed, name);
        }

        CategoryRegistry::new(&self.paths, &mut self.metadata).delete(name)?;
        Ok(removed)
    }

    pub fn list_categories(&self) -> LibraryResult<Vec<Category>> {
        self.query().list_categories()
    }

    // ==================== Documents ====================

    /// Copy one markdown file into `category`
    pub fn add(
        &mut self,
        source: &Path,
        category: &str,
        title: Option<&str>,
    ) -> LibraryResult<Document> {
        let _lock = self.lock()?;
        self.store().add(source, category, title)
    }

    /// Import a file or directory
    ///
    /// With no `target`, categories are derived from parent folder names.
    pub fn import_path(
        &mut self,
        source: &Path,
        target: Option<&str>,
        options: &ImportOptions,
    ) -> LibraryResult<ImportSummary> {
        self.import_path_with_progress(source, target, options, |_| ImportControl::Continue)
    }

    /// Import with a callback run before each file
    pub fn import_path_with_progress<F>(
        &mut self,
        source: &Path,
        target: Option<&str>,
        options: &ImportOptions,
        progress: F,
    ) -> LibraryResult<ImportSummary>
    where
        F: FnMut(&ImportProgress<'_>) -> ImportControl,
    {
        let _lock = self.lock()?;
        Importer::new(
            &self.paths,
            &mut self.metadata,
            &self.default_category,
            *options,
        )
        .run(source, target, progress)
    }

    /// Mark a document read or unread
    pub fn set_read(&mut self, id: Uuid, read: bool) -> LibraryResult<Document> {
        let _lock = self.lock()?;
        self.metadata.set_read(id, read)
    }

    /// Record that a document was opened for viewing
    pub fn touch_opened(&mut self, id: Uuid) -> LibraryResult<Document> {
        let _lock = self.lock()?;
        self.metadata.touch_opened(id)
    }

    pub fn remove_document(&mut self, id: Uuid) -> LibraryResult<Document> {
        let _lock = self.lock()?;
        self.store().remove_document(id)
    }

    pub fn move_document(&mut self, id: Uuid, category: &str) -> LibraryResult<Document> {
        let _lock = self.lock()?;
        self.store().move_document(id, category)
    }

    pub fn get(&self, id: Uuid) -> LibraryResult<Option<Document>> {
        self.query().get(id)
    }

    pub fn list_documents(&self, filter: &DocumentFilter) -> LibraryResult<Vec<Document>> {
        self.query().list_documents(filter)
    }

    pub fn search(&self, text: &str) -> LibraryResult<Vec<Document>> {
        self.query().search(text)
    }

    pub fn read_content(&self, id: Uuid) -> LibraryResult<String> {
        self.reader().read_content(id)
    }

    pub fn stats(&self) -> LibraryResult<LibraryStats> {
        self.query().stats()
    }

    // ==================== Maintenance ====================

    /// Copy matching documents out of the library
    pub fn export(
        &self,
        destination: &Path,
        filter: &DocumentFilter,
    ) -> LibraryResult<ExportSummary> {
        self.reader().export(destination, filter)
    }

    /// Report records and files that disagree
    pub fn reconcile(&self) -> LibraryResult<ReconcileReport> {
        self.reader().reconcile()
    }

    /// Remove the orphan records of a previous [`Library::reconcile`]
    pub fn prune_orphans(&mut self, report: &ReconcileReport) -> LibraryResult<usize> {
        let _lock = self.lock()?;
        self.store().prune_orphans(report)
    }

    /// Watch `documents/` for markdown changes
    pub fn watch(&self) -> LibraryResult<LibraryWatcher> {
        LibraryWatcher::new(&self.paths.documents_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_open_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("library");

        let library = Library::open(&root).unwrap();

        assert!(root.join("documents").join("General").is_dir());
        assert!(root.join("database.db").is_file());
        let names: Vec<_> = library
            .list_categories()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["General"]);
        assert_eq!(library.default_category(), "General");
    }

    #[test]
    fn test_open_with_custom_default_category() {
        let temp_dir = TempDir::new().unwrap();
        let options = LibraryOptions {
            default_category: "Inbox".to_string(),
        };

        let library = Library::open_with(temp_dir.path(), &options).unwrap();

        assert_eq!(library.list_categories().unwrap().len(), 2);
        assert_eq!(library.default_category(), "Inbox");
    }

    #[test]
    fn test_read_state_survives_reopen() {
        let library_dir = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        let src = write(source_dir.path(), "notes.md", "# Notes");

        let id = {
            let mut library = Library::open(library_dir.path()).unwrap();
            let doc = library.add(&src, "Personal", None).unwrap();
            library.set_read(doc.id, true).unwrap();
            doc.id
        };

        let library = Library::open(library_dir.path()).unwrap();
        let doc = library.get(id).unwrap().unwrap();
        assert!(doc.read);
        assert!(doc.last_read_at.is_some());
        assert_eq!(doc.category, "Personal");
    }

    #[test]
    fn test_opened_time_survives_reopen() {
        let library_dir = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        let src = write(source_dir.path(), "notes.md", "# Notes");

        let opened = {
            let mut library = Library::open(library_dir.path()).unwrap();
            let doc = library.add(&src, "Personal", None).unwrap();
            assert_eq!(library.read_content(doc.id).unwrap(), "# Notes");
            library.touch_opened(doc.id).unwrap()
        };

        let library = Library::open(library_dir.path()).unwrap();
        let doc = library.get(opened.id).unwrap().unwrap();
        assert_eq!(doc.last_opened_at, opened.last_opened_at);
        assert!(!doc.read);
    }

    #[test]
    fn test_add_twice_suffixes() {
        let library_dir = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        let src = write(source_dir.path(), "notes.md", "# Notes");
        let mut library = Library::open(library_dir.path()).unwrap();

        let first = library.add(&src, "Personal", None).unwrap();
        let second = library.add(&src, "Personal", None).unwrap();

        assert_eq!(first.stored_path, "documents/Personal/notes.md");
        assert_eq!(second.stored_path, "documents/Personal/notes-1.md");
    }

    #[test]
    fn test_import_scenario() {
        let library_dir = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        write(source_dir.path(), "a.md", "A");
        write(source_dir.path(), ".b.md", "B");
        write(source_dir.path(), "sub/c.md", "C");
        let mut library = Library::open(library_dir.path()).unwrap();

        let summary = library
            .import_path(source_dir.path(), Some("Work"), &ImportOptions::default())
            .unwrap();

        assert_eq!(summary.imported_count(), 2);
        assert_eq!(summary.skipped_count(), 1);
        assert_eq!(
            library
                .list_documents(&DocumentFilter::all().category("Work"))
                .unwrap()
                .len(),
            2
        );
        assert!(library.reconcile().unwrap().is_clean());
    }

    #[test]
    fn test_stored_paths_stay_unique() {
        let library_dir = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        write(source_dir.path(), "one/x.md", "first");
        write(source_dir.path(), "two/x.md", "second");
        write(source_dir.path(), "three/x.md", "third");
        let mut library = Library::open(library_dir.path()).unwrap();

        library
            .import_path(source_dir.path(), Some("Work"), &ImportOptions::default())
            .unwrap();

        let mut stored: Vec<_> = library
            .list_documents(&DocumentFilter::all())
            .unwrap()
            .into_iter()
            .map(|d| d.stored_path)
            .collect();
        stored.sort();
        stored.dedup();
        assert_eq!(stored.len(), 3);
    }

    #[test]
    fn test_reconcile_reports_injected_deletion() {
        let library_dir = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        let mut library = Library::open(library_dir.path()).unwrap();
        let a = library
            .add(&write(source_dir.path(), "a.md", "A"), "Work", None)
            .unwrap();
        library
            .add(&write(source_dir.path(), "b.md", "B"), "Work", None)
            .unwrap();

        fs::remove_file(library.paths().resolve(&a.stored_path)).unwrap();
        let report = library.reconcile().unwrap();

        assert_eq!(report.orphan_records, vec![a.id]);
        assert_eq!(library.prune_orphans(&report).unwrap(), 1);
        assert!(library.reconcile().unwrap().is_clean());
    }

    #[test]
    fn test_remove_and_read_content() {
        let library_dir = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        let mut library = Library::open(library_dir.path()).unwrap();
        let doc = library
            .add(&write(source_dir.path(), "a.md", "# A"), "Work", None)
            .unwrap();

        assert_eq!(library.read_content(doc.id).unwrap(), "# A");

        library.remove_document(doc.id).unwrap();
        assert!(library.get(doc.id).unwrap().is_none());
        assert!(matches!(
            library.read_content(doc.id),
            Err(LibraryError::DocumentNotFound(_))
        ));
    }

    #[test]
    fn test_delete_category_modes() {
        let library_dir = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        let mut library = Library::open(library_dir.path()).unwrap();
        let doc = library
            .add(&write(source_dir.path(), "a.md", "A"), "Work", None)
            .unwrap();

        assert!(matches!(
            library.delete_category("Work", CategoryDeletion::RequireEmpty),
            Err(LibraryError::CategoryNotEmpty { documents: 1, .. })
        ));

        let removed = library
            .delete_category("Work", CategoryDeletion::Cascade)
            .unwrap();

        assert_eq!(removed, 1);
        assert!(library.get(doc.id).unwrap().is_none());
        assert!(!library.paths().category_dir("Work").exists());
        assert!(matches!(
            library.delete_category("General", CategoryDeletion::Cascade),
            Err(LibraryError::InvalidCategory { .. })
        ));
    }

    #[test]
    fn test_mutation_fails_while_locked() {
        let library_dir = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        let src = write(source_dir.path(), "a.md", "A");
        let mut library = Library::open(library_dir.path()).unwrap();

        let held = LibraryLock::acquire(&library.paths().lock_path()).unwrap();
        assert!(matches!(
            library.add(&src, "Work", None),
            Err(LibraryError::Locked(_))
        ));
        // Reads still work
        assert!(library.list_documents(&DocumentFilter::all()).is_ok());

        drop(held);
        assert!(library.add(&src, "Work", None).is_ok());
    }

    #[test]
    fn test_move_document() {
        let library_dir = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        let mut library = Library::open(library_dir.path()).unwrap();
        let doc = library
            .add(&write(source_dir.path(), "a.md", "A"), "Inbox", None)
            .unwrap();

        let moved = library.move_document(doc.id, "Archive").unwrap();

        assert_eq!(moved.stored_path, "documents/Archive/a.md");
        assert_eq!(library.read_content(doc.id).unwrap(), "A");
    }
}
