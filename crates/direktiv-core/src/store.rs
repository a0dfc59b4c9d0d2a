//! Library store
//!
//! Owns the document files under `documents/` and keeps them in step with
//! the metadata store:
//!
//! - a file is copied into place before its record is written, and removed
//!   again if the record cannot be written
//! - a record is removed only after its file is gone
//! - anything left half-done shows up in [`StoreReader::reconcile`]
//!
//! ## Collisions
//!
//! A stored path is taken when a record holds it or a file already sits
//! there. Taken names are disambiguated with a numeric suffix (`notes.md`,
//! `notes-1.md`, ...). Existing files are only overwritten under
//! [`CollisionPolicy::Replace`].

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::category::CategoryRegistry;
use crate::error::{LibraryError, LibraryResult};
use crate::models::{Document, DocumentFilter};
use crate::paths::{self, LibraryPaths};
use crate::storage::MetadataStore;

/// Upper bound on suffixes tried before giving up
const MAX_SUFFIX: usize = 10_000;

/// What to do when the natural stored path is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionPolicy {
    /// Always store a new, suffixed copy
    KeepBoth,
    /// Skip when a document in the suffix chain has the same bytes
    SkipIdentical,
    /// Overwrite the file at the natural path and keep its record id
    Replace,
}

/// Outcome of committing one file
#[derive(Debug, Clone, PartialEq)]
pub enum Committed {
    /// A new or replaced document
    Added(Document),
    /// Same content already managed; nothing written
    Duplicate(Document),
}

/// Result of [`LibraryStore::export`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub destination: PathBuf,
    pub exported: usize,
    /// Records whose file was missing, so nothing was copied
    pub missing: Vec<Uuid>,
}

/// Inconsistencies between the metadata store and the `documents/` tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Records with no backing file
    pub orphan_records: Vec<Uuid>,
    /// Files under `documents/` with no record (stored-path form)
    pub untracked_files: Vec<String>,
    /// Registered categories without a folder
    pub missing_category_dirs: Vec<String>,
    /// Folders under `documents/` that are not registered categories
    pub unregistered_dirs: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_records.is_empty()
            && self.untracked_files.is_empty()
            && self.missing_category_dirs.is_empty()
            && self.unregistered_dirs.is_empty()
    }

    /// Turn orphan records into an error
    pub fn into_result(self) -> LibraryResult<Self> {
        if self.orphan_records.is_empty() {
            Ok(self)
        } else {
            Err(LibraryError::OrphanRecords {
                ids: self.orphan_records,
            })
        }
    }
}

enum Placement {
    Free { stored_path: String, dest: PathBuf },
    Identical(Document),
}

/// File operations over one library
pub struct LibraryStore<'a> {
    paths: &'a LibraryPaths,
    metadata: &'a mut MetadataStore,
}

impl<'a> LibraryStore<'a> {
    pub fn new(paths: &'a LibraryPaths, metadata: &'a mut MetadataStore) -> Self {
        Self { paths, metadata }
    }

    /// Copy a markdown file into a category and record it
    ///
    /// The category is created if needed. A taken name gets a suffix; the
    /// existing document is never overwritten.
    pub fn add(
        &mut self,
        source: &Path,
        category: &str,
        title: Option<&str>,
    ) -> LibraryResult<Document> {
        let source = paths::normalize_file(source)?;
        if !paths::is_markdown(&source) {
            return Err(LibraryError::invalid_path(
                &source,
                "only markdown files (.md, .markdown) are supported",
            ));
        }

        CategoryRegistry::new(self.paths, self.metadata).ensure(category)?;

        match self.commit(&source, category, title, CollisionPolicy::KeepBoth)? {
            Committed::Added(doc) | Committed::Duplicate(doc) => Ok(doc),
        }
    }

    /// Copy one canonical source file into a registered category
    pub(crate) fn commit(
        &mut self,
        source: &Path,
        category: &str,
        title: Option<&str>,
        policy: CollisionPolicy,
    ) -> LibraryResult<Committed> {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| LibraryError::invalid_path(source, "path has no file name"))?;
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| paths::file_stem(source));

        if policy == CollisionPolicy::Replace {
            return self.replace(source, category, &file_name, title);
        }
        self.commit_new(source, category, &file_name, title, policy)
    }

    fn commit_new(
        &mut self,
        source: &Path,
        category: &str,
        file_name: &str,
        title: String,
        policy: CollisionPolicy,
    ) -> LibraryResult<Committed> {
        match self.place(source, category, file_name, policy)? {
            Placement::Identical(existing) => {
                debug!(
                    "Skipping {:?}: identical to {}",
                    source, existing.stored_path
                );
                Ok(Committed::Duplicate(existing))
            }
            Placement::Free { stored_path, dest } => {
                let doc = Document::new(stored_path, category, title).with_original_path(source);
                let metadata = &mut *self.metadata;
                let doc = commit_copy(source, &dest, || {
                    metadata.upsert(&doc)?;
                    Ok(doc.clone())
                })?;
                info!("Added {} from {:?}", doc.stored_path, source);
                Ok(Committed::Added(doc))
            }
        }
    }

    fn replace(
        &mut self,
        source: &Path,
        category: &str,
        file_name: &str,
        title: String,
    ) -> LibraryResult<Committed> {
        let stored_path = paths::stored_path_for(category, file_name);
        let dest = self.paths.resolve(&stored_path);

        match self.metadata.get_by_stored_path(&stored_path)? {
            Some(mut existing) => {
                copy_into_place(source, &dest)?;
                existing.title = title;
                existing.original_path = Some(source.to_string_lossy().into_owned());
                existing.read = false;
                self.metadata.upsert(&existing)?;
                info!("Replaced {} from {:?}", existing.stored_path, source);
                Ok(Committed::Added(existing))
            }
            // Untracked files are never overwritten
            None => {
                if dest.exists() {
                    debug!("{} is untracked; storing a suffixed copy", stored_path);
                }
                self.commit_new(source, category, file_name, title, CollisionPolicy::KeepBoth)
            }
        }
    }

    fn place(
        &self,
        source: &Path,
        category: &str,
        file_name: &str,
        policy: CollisionPolicy,
    ) -> LibraryResult<Placement> {
        for n in 0..MAX_SUFFIX {
            let name = paths::suffixed_name(file_name, n);
            let stored_path = paths::stored_path_for(category, &name);
            let dest = self.paths.resolve(&stored_path);
            let record = self.metadata.get_by_stored_path(&stored_path)?;

            if record.is_none() && !dest.exists() {
                return Ok(Placement::Free { stored_path, dest });
            }

            if policy == CollisionPolicy::SkipIdentical {
                if let Some(existing) = record {
                    if dest.is_file() && files_identical(source, &dest)? {
                        return Ok(Placement::Identical(existing));
                    }
                }
            }
        }

        Err(LibraryError::DuplicatePath(paths::stored_path_for(
            category, file_name,
        )))
    }

    /// Delete a document's file, then its record
    ///
    /// When the file cannot be deleted the record stays and the error is
    /// returned. A file that is already gone is not an error.
    pub fn remove_document(&mut self, id: Uuid) -> LibraryResult<Document> {
        let doc = self
            .metadata
            .get(id)?
            .ok_or(LibraryError::DocumentNotFound(id))?;
        let path = self.paths.resolve(&doc.stored_path);

        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("File for {} already missing; removing record", doc.stored_path);
            }
            Err(e) => return Err(LibraryError::from_io(e, &path)),
        }

        self.metadata.remove(id)?;
        info!("Removed {}", doc.stored_path);
        Ok(doc)
    }

    /// Move a document to another category
    pub fn move_document(&mut self, id: Uuid, category: &str) -> LibraryResult<Document> {
        let mut doc = self
            .metadata
            .get(id)?
            .ok_or(LibraryError::DocumentNotFound(id))?;
        if doc.category == category {
            return Ok(doc);
        }

        CategoryRegistry::new(self.paths, self.metadata).ensure(category)?;

        let from = self.paths.resolve(&doc.stored_path);
        if !from.is_file() {
            return Err(LibraryError::OrphanRecords { ids: vec![id] });
        }

        let file_name = doc.file_name().to_string();
        let (stored_path, dest) =
            match self.place(&from, category, &file_name, CollisionPolicy::KeepBoth)? {
                Placement::Free { stored_path, dest } => (stored_path, dest),
                Placement::Identical(existing) => {
                    return Err(LibraryError::DuplicatePath(existing.stored_path))
                }
            };

        fs::rename(&from, &dest).map_err(|e| LibraryError::from_io(e, &from))?;

        let old_category = std::mem::replace(&mut doc.category, category.to_string());
        let old_stored = std::mem::replace(&mut doc.stored_path, stored_path);
        if let Err(e) = self.metadata.upsert(&doc) {
            warn!("Moving {} failed ({}); restoring file", old_stored, e);
            if let Err(restore) = fs::rename(&dest, &from) {
                warn!("Could not restore {:?}: {}", from, restore);
            }
            return Err(e);
        }

        info!(
            "Moved {} from '{}' to {}",
            doc.title, old_category, doc.stored_path
        );
        Ok(doc)
    }

    /// Remove records listed as orphans whose file is still missing
    pub fn prune_orphans(&mut self, report: &ReconcileReport) -> LibraryResult<usize> {
        let mut pruned = 0;
        for id in &report.orphan_records {
            let Some(doc) = self.metadata.get(*id)? else {
                continue;
            };
            if self.paths.resolve(&doc.stored_path).is_file() {
                debug!("{} has its file again; keeping record", doc.stored_path);
                continue;
            }
            if self.metadata.remove(*id)? {
                info!("Pruned orphan record {}", doc.stored_path);
                pruned += 1;
            }
        }
        Ok(pruned)
    }
}

/// Read-only operations over the stored files
pub struct StoreReader<'a> {
    paths: &'a LibraryPaths,
    metadata: &'a MetadataStore,
}

impl<'a> StoreReader<'a> {
    pub fn new(paths: &'a LibraryPaths, metadata: &'a MetadataStore) -> Self {
        Self { paths, metadata }
    }

    /// Raw markdown of a document
    pub fn read_content(&self, id: Uuid) -> LibraryResult<String> {
        let doc = self
            .metadata
            .get(id)?
            .ok_or(LibraryError::DocumentNotFound(id))?;
        let path = self.paths.resolve(&doc.stored_path);

        fs::read_to_string(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LibraryError::OrphanRecords { ids: vec![id] },
            _ => LibraryError::from_io(e, &path),
        })
    }

    /// Copy matching documents to `<destination>/<Category>/<file>`
    ///
    /// The destination must not exist or be an empty directory. The library
    /// and its metadata are left untouched.
    pub fn export(
        &self,
        destination: &Path,
        filter: &DocumentFilter,
    ) -> LibraryResult<ExportSummary> {
        let absolute = if destination.is_absolute() {
            destination.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| LibraryError::from_io(e, destination))?
                .join(destination)
        };
        if absolute.starts_with(self.paths.root()) {
            return Err(LibraryError::invalid_path(
                destination,
                "export destination is inside the library",
            ));
        }

        if absolute.exists() {
            let is_empty_dir = absolute.is_dir()
                && fs::read_dir(&absolute)
                    .map_err(|e| LibraryError::from_io(e, &absolute))?
                    .next()
                    .is_none();
            if !is_empty_dir {
                return Err(LibraryError::ExportDestinationExists(absolute));
            }
        }
        fs::create_dir_all(&absolute).map_err(|e| LibraryError::from_io(e, &absolute))?;

        if *filter == DocumentFilter::default() {
            for category in self.metadata.list_categories()? {
                let dir = absolute.join(&category.name);
                fs::create_dir_all(&dir).map_err(|e| LibraryError::from_io(e, &dir))?;
            }
        }

        let mut summary = ExportSummary {
            destination: absolute.clone(),
            exported: 0,
            missing: Vec::new(),
        };

        for doc in self.metadata.query(filter)? {
            let source = self.paths.resolve(&doc.stored_path);
            if !source.is_file() {
                warn!("Not exporting {}: file is missing", doc.stored_path);
                summary.missing.push(doc.id);
                continue;
            }

            let target_dir = absolute.join(&doc.category);
            fs::create_dir_all(&target_dir)
                .map_err(|e| LibraryError::from_io(e, &target_dir))?;
            let target = target_dir.join(doc.file_name());
            fs::copy(&source, &target).map_err(|e| LibraryError::from_io(e, &target))?;
            summary.exported += 1;
        }

        info!(
            "Exported {} document(s) to {:?}",
            summary.exported, summary.destination
        );
        Ok(summary)
    }

    /// Compare the metadata store with the files on disk
    ///
    /// Read-only: nothing is repaired.
    pub fn reconcile(&self) -> LibraryResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        let mut tracked = HashSet::new();
        for doc in self.metadata.query(&DocumentFilter::all())? {
            if !self.paths.resolve(&doc.stored_path).is_file() {
                report.orphan_records.push(doc.id);
            }
            tracked.insert(doc.stored_path);
        }

        let mut registered = HashSet::new();
        for category in self.metadata.list_categories()? {
            if !self.paths.category_dir(&category.name).is_dir() {
                report.missing_category_dirs.push(category.name.clone());
            }
            registered.insert(category.name);
        }

        let documents_dir = self.paths.documents_dir();
        if documents_dir.is_dir() {
            for entry in WalkDir::new(&documents_dir).min_depth(1).sort_by_file_name() {
                let entry = entry.map_err(|e| LibraryError::from_walk(e, &documents_dir))?;
                let name = entry.file_name().to_string_lossy().into_owned();

                if entry.file_type().is_dir() {
                    if entry.depth() == 1 && !registered.contains(&name) {
                        report.unregistered_dirs.push(name);
                    }
                    continue;
                }

                if let Some(stored) = self.paths.stored_path_of(entry.path()) {
                    if !tracked.contains(&stored) {
                        report.untracked_files.push(stored);
                    }
                }
            }
        }

        if !report.is_clean() {
            warn!(
                "Reconcile: {} orphan record(s), {} untracked file(s)",
                report.orphan_records.len(),
                report.untracked_files.len()
            );
        }
        Ok(report)
    }
}

/// Copy `source` to `dest`, then run `record`
///
/// If `record` fails the copy is removed again, so no file is left without
/// a record. If the copy fails `record` never runs.
pub(crate) fn commit_copy<F>(source: &Path, dest: &Path, record: F) -> LibraryResult<Document>
where
    F: FnOnce() -> LibraryResult<Document>,
{
    copy_into_place(source, dest)?;

    match record() {
        Ok(doc) => Ok(doc),
        Err(e) => {
            warn!("Recording {:?} failed ({}); removing copy", dest, e);
            if let Err(cleanup) = fs::remove_file(dest) {
                warn!("Could not remove {:?}: {}", dest, cleanup);
            }
            Err(e)
        }
    }
}

/// Copy via a hidden temporary sibling and rename into place
///
/// `dest` never holds a partially written file.
fn copy_into_place(source: &Path, dest: &Path) -> LibraryResult<()> {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| LibraryError::invalid_path(dest, "path has no file name"))?;
    let temp_path = dest.with_file_name(format!(".{}.partial", file_name));

    fs::copy(source, &temp_path).map_err(|e| LibraryError::from_io(e, source))?;

    let synced = File::open(&temp_path).and_then(|f| f.sync_all());
    let renamed = synced.and_then(|()| fs::rename(&temp_path, dest));
    if let Err(e) = renamed {
        let _ = fs::remove_file(&temp_path);
        return Err(LibraryError::from_io(e, dest));
    }
    Ok(())
}

/// Byte-for-byte comparison
fn files_identical(a: &Path, b: &Path) -> LibraryResult<bool> {
    let len_a = fs::metadata(a).map_err(|e| LibraryError::from_io(e, a))?.len();
    let len_b = fs::metadata(b).map_err(|e| LibraryError::from_io(e, b))?.len();
    if len_a != len_b {
        return Ok(false);
    }

    let mut reader_a = BufReader::new(File::open(a).map_err(|e| LibraryError::from_io(e, a))?);
    let mut reader_b = BufReader::new(File::open(b).map_err(|e| LibraryError::from_io(e, b))?);
    let mut buf_a = [0u8; 8192];
    let mut buf_b = [0u8; 8192];

    loop {
        let read_a = read_full(&mut reader_a, &mut buf_a).map_err(|e| LibraryError::from_io(e, a))?;
        let read_b = read_full(&mut reader_b, &mut buf_b).map_err(|e| LibraryError::from_io(e, b))?;
        if read_a != read_b || buf_a[..read_a] != buf_b[..read_b] {
            return Ok(false);
        }
        if read_a == 0 {
            return Ok(true);
        }
    }
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
