//! Path resolution
//!
//! Everything that turns user-supplied paths into canonical ones, decides
//! whether an entry is hidden, and maps `(category, filename)` onto the
//! library layout:
//!
//! ```text
//! <library-root>/
//! ├── documents/<Category>/<file>.md
//! ├── database.db
//! ├── config.json
//! └── .lock
//! ```
//!
//! Stored paths are relative to the library root and always use `/`.

use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{LibraryError, LibraryResult};

/// Name of the directory holding category folders
pub const DOCUMENTS_DIR: &str = "documents";
/// Metadata store file name
pub const DATABASE_FILE: &str = "database.db";
/// Preferences file name
pub const CONFIG_FILE: &str = "config.json";
/// Advisory lock file name
pub const LOCK_FILE: &str = ".lock";

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Resolved locations inside one library root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPaths {
    root: PathBuf,
}

impl LibraryPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.root.join(DOCUMENTS_DIR)
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Directory backing a category
    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.documents_dir().join(category)
    }

    /// Absolute destination for a file in a category. Does not touch disk.
    pub fn destination_for(&self, category: &str, file_name: &str) -> PathBuf {
        self.category_dir(category).join(file_name)
    }

    /// Absolute path of a stored path
    pub fn resolve(&self, stored_path: &str) -> PathBuf {
        stored_path
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |acc, segment| acc.join(segment))
    }

    /// Stored path for an absolute path inside the library, if it is inside
    pub fn stored_path_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(segments.join("/"))
    }
}

/// Stored path for a file in a category
pub fn stored_path_for(category: &str, file_name: &str) -> String {
    format!("{}/{}/{}", DOCUMENTS_DIR, category, file_name)
}

/// Canonicalize a path that must be a regular file
pub fn normalize_file(path: &Path) -> LibraryResult<PathBuf> {
    let canonical = canonicalize(path)?;
    if !canonical.is_file() {
        return Err(LibraryError::invalid_path(path, "not a regular file"));
    }
    Ok(canonical)
}

/// Canonicalize a path that must be a directory
pub fn normalize_dir(path: &Path) -> LibraryResult<PathBuf> {
    let canonical = canonicalize(path)?;
    if !canonical.is_dir() {
        return Err(LibraryError::invalid_path(path, "not a directory"));
    }
    Ok(canonical)
}

/// What an existing path turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    File(PathBuf),
    Directory(PathBuf),
}

/// Canonicalize a path that may be a file or a directory
pub fn normalize_any(path: &Path) -> LibraryResult<SourceKind> {
    let canonical = canonicalize(path)?;
    if canonical.is_dir() {
        Ok(SourceKind::Directory(canonical))
    } else if canonical.is_file() {
        Ok(SourceKind::File(canonical))
    } else {
        Err(LibraryError::invalid_path(
            path,
            "neither a regular file nor a directory",
        ))
    }
}

fn canonicalize(path: &Path) -> LibraryResult<PathBuf> {
    fs::canonicalize(path).map_err(|e| LibraryError::from_io(e, path))
}

/// True if any segment of `path` starts with a dot
///
/// `.` and `..` are navigation, not hidden entries.
pub fn is_hidden(path: &Path) -> bool {
    path.components().any(|component| match component {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// True for `.md` / `.markdown` files, case-insensitive
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| {
            MARKDOWN_EXTENSIONS
                .iter()
                .any(|md| ext.eq_ignore_ascii_case(md))
        })
        .unwrap_or(false)
}

/// Filename with a numeric suffix before the extension
///
/// `suffixed_name("notes.md", 0)` is `notes.md`, `1` gives `notes-1.md`.
pub fn suffixed_name(file_name: &str, n: usize) -> String {
    if n == 0 {
        return file_name.to_string();
    }
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}-{}{}", &file_name[..dot], n, &file_name[dot..]),
        _ => format!("{}-{}", file_name, n),
    }
}

/// Filename without its extension
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Last segment of a stored path
pub fn stored_file_name(stored_path: &str) -> &str {
    stored_path.rsplit('/').next().unwrap_or(stored_path)
}
