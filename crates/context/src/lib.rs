//! # Parrot Live Context
//!
//! The set of files and directories the model is currently "looking at".
//! Nothing is cached: every serialization reads the filesystem again, so an
//! edit made between two turns is visible on the second one.
//!
//! ```no_run
//! use parrot_context::LiveContext;
//! use parrot_core::{ContextStore, FileEntry};
//!
//! let mut context = LiveContext::new("/work/project");
//! context.add_file(FileEntry::whole("src/main.rs")).unwrap();
//! println!("{}", context.serialize_files());
//! ```

pub mod directories;
pub mod files;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parrot_core::paths::{PathError, resolve_path};
use parrot_core::{ContextError, ContextStore, DirectoryEntry, FileEntry};

pub use directories::ListingLimits;

/// Filesystem-backed [`ContextStore`].
///
/// Relative paths are resolved against `root` and every entry is keyed by its
/// normalized absolute path.
#[derive(Debug, Clone)]
pub struct LiveContext {
    root: PathBuf,
    files: BTreeMap<PathBuf, FileEntry>,
    directories: BTreeMap<PathBuf, DirectoryEntry>,
    limits: ListingLimits,
}

impl LiveContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: BTreeMap::new(),
            directories: BTreeMap::new(),
            limits: ListingLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ListingLimits) -> Self {
        self.limits = limits;
        self
    }

    fn key(&self, path: &Path) -> Result<PathBuf, ContextError> {
        let raw = path.to_string_lossy();
        resolve_path(&self.root, &raw).map_err(|err| match err {
            PathError::Empty => ContextError::EmptyPath,
            other => ContextError::InvalidPath(other.to_string()),
        })
    }
}

impl ContextStore for LiveContext {
    fn add_file(&mut self, mut entry: FileEntry) -> Result<PathBuf, ContextError> {
        let key = self.key(&entry.path)?;
        entry.path = key.clone();
        entry.start_line = entry.start_line.max(1);
        tracing::debug!(path = %key.display(), start = entry.start_line, end = ?entry.end_line, "Tracking file");
        self.files.insert(key.clone(), entry);
        Ok(key)
    }

    fn remove_file(&mut self, path: &Path) -> Result<PathBuf, ContextError> {
        let key = self.key(path)?;
        self.files
            .remove(&key)
            .map(|_| key.clone())
            .ok_or(ContextError::FileNotTracked(key))
    }

    fn files(&self) -> Vec<FileEntry> {
        self.files.values().cloned().collect()
    }

    fn add_directory(&mut self, mut entry: DirectoryEntry) -> Result<PathBuf, ContextError> {
        let key = self.key(&entry.path)?;
        entry.path = key.clone();
        tracing::debug!(path = %key.display(), gitignore = entry.respect_gitignore, "Tracking directory");
        self.directories.insert(key.clone(), entry);
        Ok(key)
    }

    fn remove_directory(&mut self, path: &Path) -> Result<PathBuf, ContextError> {
        let key = self.key(path)?;
        self.directories
            .remove(&key)
            .map(|_| key.clone())
            .ok_or(ContextError::DirectoryNotTracked(key))
    }

    fn directories(&self) -> Vec<DirectoryEntry> {
        self.directories.values().cloned().collect()
    }

    fn serialize_files(&self) -> String {
        let mut sections = vec!["\n--- FILES ---".to_string()];
        for entry in self.files.values() {
            let end = entry
                .end_line
                .map(|n| n.to_string())
                .unwrap_or_else(|| "end".to_string());
            sections.push(format!(
                "\n--- FILE: {} [Lines {}:{}] ---",
                entry.path.display(),
                entry.start_line,
                end
            ));
            match files::read_slice(entry) {
                Ok(content) => sections.push(content),
                Err(err) => sections.push(format!("Error reading file: {err}")),
            }
        }
        if self.files.is_empty() {
            sections.push("No files in live context".to_string());
        }
        sections.join("\n")
    }

    fn serialize_directories(&self) -> String {
        let mut sections = vec!["\n--- DIRECTORY STRUCTURES ---".to_string()];
        for entry in self.directories.values() {
            sections.push(format!("\n--- DIRECTORY: {} ---", entry.path.display()));
            match directories::list_directory(entry, self.limits) {
                Ok(listing) => sections.push(listing),
                Err(err) => sections.push(format!("Error reading directory: {err}")),
            }
        }
        if self.directories.is_empty() {
            sections.push("No directories in live context".to_string());
        }
        sections.join("\n")
    }

    fn clear(&mut self) {
        self.files.clear();
        self.directories.clear();
    }

    /// The working directory and its README.md, when there is one.
    fn track_defaults(&mut self) {
        let root = self.root.clone();
        if let Err(err) = self.add_directory(DirectoryEntry::new(&root)) {
            tracing::warn!(error = %err, "Could not track working directory");
        }
        let readme = root.join("README.md");
        if readme.is_file()
            && let Err(err) = self.add_file(FileEntry::whole(readme))
        {
            tracing::warn!(error = %err, "Could not track README.md");
        }
    }
}
