//! Live Context contract.
//!
//! Entries are subscriptions, not snapshots: they record *what* to show and
//! the store reads the current bytes from disk every time it serializes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// Upper bound used to report context usage.
pub const MAX_CONTEXT_BYTES: usize = 100 * 1024;

/// A tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,

    /// 1-based first line.
    pub start_line: usize,

    /// Last line, inclusive. Negative counts from the end (-1 is the last
    /// line). `None` reads to the end.
    pub end_line: Option<i64>,
}

impl FileEntry {
    pub fn whole(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            start_line: 1,
            end_line: None,
        }
    }

    pub fn range(path: impl Into<PathBuf>, start_line: usize, end_line: Option<i64>) -> Self {
        Self {
            path: path.into(),
            start_line: start_line.max(1),
            end_line,
        }
    }

    /// Whether a line range was requested (serialized output gets line numbers).
    pub fn is_ranged(&self) -> bool {
        self.start_line > 1 || self.end_line.is_some()
    }
}

/// A tracked directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub path: PathBuf,

    /// Apply `.gitignore` rules found in the directory.
    pub respect_gitignore: bool,

    /// Extra glob patterns to skip, on top of the default ignore set.
    pub ignore_patterns: Vec<String>,
}

impl DirectoryEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            respect_gitignore: true,
            ignore_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextUsage {
    pub current_bytes: usize,
    pub max_bytes: usize,
    pub percent: f64,
}

impl std::fmt::Display for ContextUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Context Usage: {}/{} bytes ({:.1}%)",
            self.current_bytes, self.max_bytes, self.percent
        )
    }
}

/// The set of tracked files and directories.
///
/// Adding a path that is already tracked replaces its options. Removing an
/// untracked path is an error.
pub trait ContextStore: Send + Sync {
    fn add_file(&mut self, entry: FileEntry) -> Result<PathBuf, ContextError>;

    fn remove_file(&mut self, path: &Path) -> Result<PathBuf, ContextError>;

    fn files(&self) -> Vec<FileEntry>;

    fn add_directory(&mut self, entry: DirectoryEntry) -> Result<PathBuf, ContextError>;

    fn remove_directory(&mut self, path: &Path) -> Result<PathBuf, ContextError>;

    fn directories(&self) -> Vec<DirectoryEntry>;

    /// Current content of every tracked file.
    fn serialize_files(&self) -> String;

    /// Current listing of every tracked directory.
    fn serialize_directories(&self) -> String;

    /// Drop every entry.
    fn clear(&mut self);

    /// Track whatever a fresh session starts with. Nothing by default.
    fn track_defaults(&mut self) {}

    fn usage(&self) -> ContextUsage {
        let current_bytes = self.serialize_files().len() + self.serialize_directories().len();
        ContextUsage {
            current_bytes,
            max_bytes: MAX_CONTEXT_BYTES,
            percent: current_bytes as f64 / MAX_CONTEXT_BYTES as f64 * 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_clamps_start_to_one() {
        let entry = FileEntry::range("/tmp/a.rs", 0, None);
        assert_eq!(entry.start_line, 1);
        assert!(!entry.is_ranged());
        assert!(FileEntry::range("/tmp/a.rs", 1, Some(-1)).is_ranged());
    }

    #[test]
    fn usage_display() {
        let usage = ContextUsage {
            current_bytes: 512,
            max_bytes: MAX_CONTEXT_BYTES,
            percent: 0.5,
        };
        assert_eq!(usage.to_string(), "Context Usage: 512/102400 bytes (0.5%)");
    }
}
