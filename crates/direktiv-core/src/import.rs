//! Import engine
//!
//! Walks a source (one file or a directory tree), filters hidden entries and
//! non-markdown files, resolves each file's category and commits it through
//! [`LibraryStore`]. Per-file problems are collected into the
//! [`ImportSummary`]; only problems with the source or target as a whole are
//! returned as errors.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::category::CategoryRegistry;
use crate::error::{LibraryError, LibraryResult};
use crate::models::Document;
use crate::paths::{self, LibraryPaths, SourceKind};
use crate::storage::MetadataStore;
use crate::store::{CollisionPolicy, Committed, LibraryStore};

/// Options controlling an import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Descend into subdirectories
    pub recursive: bool,
    /// Import dot-files and the contents of dot-directories
    pub include_hidden: bool,
    /// Skip files whose bytes match an already managed copy
    pub skip_identical: bool,
    /// Overwrite the document at the natural stored path
    pub replace: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            include_hidden: false,
            skip_identical: true,
            replace: false,
        }
    }
}

impl ImportOptions {
    fn collision_policy(&self) -> CollisionPolicy {
        if self.replace {
            CollisionPolicy::Replace
        } else if self.skip_identical {
            CollisionPolicy::SkipIdentical
        } else {
            CollisionPolicy::KeepBoth
        }
    }
}

/// Why a markdown file was passed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Hidden,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: Vec<Document>,
    pub skipped: Vec<SkippedEntry>,
    pub failures: Vec<ImportFailure>,
    /// Stopped early by the progress callback
    pub cancelled: bool,
}

impl ImportSummary {
    pub fn imported_count(&self) -> usize {
        self.imported.len()
    }

    /// Hidden markdown files and identical duplicates
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    fn fail(&mut self, path: impl Into<PathBuf>, error: &LibraryError) {
        let path = path.into();
        warn!("Failed to import {:?}: {}", path, error);
        self.failures.push(ImportFailure {
            path,
            reason: error.to_string(),
        });
    }
}

/// Reported before each file is committed
#[derive(Debug, Clone, Copy)]
pub struct ImportProgress<'p> {
    /// Zero-based position in the batch
    pub index: usize,
    pub total: usize,
    pub path: &'p Path,
}

/// Returned by the progress callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportControl {
    Continue,
    Cancel,
}

struct Candidate {
    path: PathBuf,
    /// Path relative to the import root
    relative: PathBuf,
}

/// Imports files into one library
pub struct Importer<'a> {
    paths: &'a LibraryPaths,
    metadata: &'a mut MetadataStore,
    default_category: &'a str,
    options: ImportOptions,
}

impl<'a> Importer<'a> {
    pub fn new(
        paths: &'a LibraryPaths,
        metadata: &'a mut MetadataStore,
        default_category: &'a str,
        options: ImportOptions,
    ) -> Self {
        Self {
            paths,
            metadata,
            default_category,
            options,
        }
    }

    /// Import `source` into `target`, or into derived categories when
    /// `target` is `None`
    ///
    /// Without a target, a file's category is the name of its parent
    /// directory relative to the import root; top-level files go to the
    /// default category.
    pub fn run<F>(
        &mut self,
        source: &Path,
        target: Option<&str>,
        mut progress: F,
    ) -> LibraryResult<ImportSummary>
    where
        F: FnMut(&ImportProgress<'_>) -> ImportControl,
    {
        let mut summary = ImportSummary::default();

        let candidates = match paths::normalize_any(source)? {
            SourceKind::File(file) => self.single_file(source, file, &mut summary)?,
            SourceKind::Directory(root) => {
                if root.starts_with(self.paths.root()) {
                    return Err(LibraryError::invalid_path(
                        source,
                        "cannot import from inside the library",
                    ));
                }
                self.collect(&root, &mut summary)
            }
        };

        if let Some(category) = target {
            CategoryRegistry::new(self.paths, self.metadata).ensure(category)?;
        }

        let total = candidates.len();
        let policy = self.options.collision_policy();
        let mut ensured: HashSet<String> = HashSet::new();
        // Stored paths written by this run; replace never overwrites them
        let mut written: HashSet<String> = HashSet::new();

        for (index, candidate) in candidates.iter().enumerate() {
            let step = ImportProgress {
                index,
                total,
                path: &candidate.path,
            };
            if progress(&step) == ImportControl::Cancel {
                info!("Import cancelled after {} of {} file(s)", index, total);
                summary.cancelled = true;
                break;
            }

            let category = match target {
                Some(category) => category.to_string(),
                None => {
                    let category = self.derived_category(&candidate.relative);
                    if !ensured.contains(&category) {
                        if let Err(e) =
                            CategoryRegistry::new(self.paths, self.metadata).ensure(&category)
                        {
                            summary.fail(&candidate.path, &e);
                            continue;
                        }
                        ensured.insert(category.clone());
                    }
                    category
                }
            };

            let committed = match paths::normalize_file(&candidate.path) {
                Ok(file) => {
                    let policy = self.batch_policy(policy, &file, &category, &written);
                    LibraryStore::new(self.paths, self.metadata)
                        .commit(&file, &category, None, policy)
                }
                Err(e) => Err(e),
            };
            match committed {
                Ok(Committed::Added(doc)) => {
                    debug!("Imported {:?} as {}", candidate.path, doc.stored_path);
                    written.insert(doc.stored_path.clone());
                    summary.imported.push(doc);
                }
                Ok(Committed::Duplicate(_)) => summary.skipped.push(SkippedEntry {
                    path: candidate.path.clone(),
                    reason: SkipReason::Duplicate,
                }),
                Err(e) => summary.fail(&candidate.path, &e),
            }
        }

        info!(
            "Imported {} file(s) from {:?}: {} skipped, {} failed",
            summary.imported_count(),
            source,
            summary.skipped_count(),
            summary.failure_count()
        );
        Ok(summary)
    }

    /// Policy for one file, given what this run has already written
    ///
    /// Replace only applies to documents that existed before the run. A
    /// later file with the same name falls back to the suffix policy.
    fn batch_policy(
        &self,
        policy: CollisionPolicy,
        file: &Path,
        category: &str,
        written: &HashSet<String>,
    ) -> CollisionPolicy {
        if policy != CollisionPolicy::Replace {
            return policy;
        }
        let natural = file
            .file_name()
            .map(|name| paths::stored_path_for(category, &name.to_string_lossy()));
        match natural {
            Some(stored_path) if written.contains(&stored_path) => ImportOptions {
                replace: false,
                ..self.options
            }
            .collision_policy(),
            _ => policy,
        }
    }

    fn single_file(
        &self,
        source: &Path,
        file: PathBuf,
        summary: &mut ImportSummary,
    ) -> LibraryResult<Vec<Candidate>> {
        if !paths::is_markdown(&file) {
            return Err(LibraryError::invalid_path(
                source,
                "only markdown files (.md, .markdown) are supported",
            ));
        }

        let relative = PathBuf::from(file.file_name().unwrap_or(file.as_os_str()));
        if !self.options.include_hidden && paths::is_hidden(&relative) {
            debug!("Skipping hidden file {:?}", file);
            summary.skipped.push(SkippedEntry {
                path: file,
                reason: SkipReason::Hidden,
            });
            return Ok(Vec::new());
        }

        Ok(vec![Candidate {
            path: file,
            relative,
        }])
    }

    /// Eligible files under `root`, in path order
    fn collect(&self, root: &Path, summary: &mut ImportSummary) -> Vec<Candidate> {
        let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
        if !self.options.recursive {
            walker = walker.max_depth(1);
        }

        let mut candidates = Vec::new();
        let mut entries = walker.into_iter();
        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    summary.fail(path, &LibraryError::from_walk(e, root));
                    continue;
                }
            };

            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();
            let hidden = !self.options.include_hidden && paths::is_hidden(&relative);

            if entry.file_type().is_dir() {
                if hidden {
                    debug!("Pruning hidden directory {:?}", entry.path());
                    entries.skip_current_dir();
                }
                continue;
            }

            if !entry.path().is_file() || !paths::is_markdown(entry.path()) {
                continue;
            }

            if hidden {
                debug!("Skipping hidden file {:?}", entry.path());
                summary.skipped.push(SkippedEntry {
                    path: entry.into_path(),
                    reason: SkipReason::Hidden,
                });
                continue;
            }

            candidates.push(Candidate {
                path: entry.into_path(),
                relative,
            });
        }

        candidates.sort_by(|a, b| a.path.cmp(&b.path));
        candidates
    }

    fn derived_category(&self, relative: &Path) -> String {
        relative
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.default_category.to_string())
    }
}
