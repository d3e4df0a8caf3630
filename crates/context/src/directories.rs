//! Breadth-first directory listing.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::Match;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use parrot_core::{ContextError, DirectoryEntry};

/// Names skipped in every listing.
pub const DEFAULT_IGNORES: &[&str] = &[".git", "node_modules", ".vscode", ".idea", ".DS_Store"];

/// Ceilings applied to every directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingLimits {
    /// Total entries across the whole listing.
    pub max_items: usize,
    /// Deepest level whose contents are listed (the root is level 0).
    pub max_depth: usize,
}

impl Default for ListingLimits {
    fn default() -> Self {
        Self {
            max_items: 100,
            max_depth: 10,
        }
    }
}

struct Pending {
    path: PathBuf,
    depth: usize,
    gitignores: Vec<Arc<Gitignore>>,
}

struct Child {
    name: String,
    path: PathBuf,
    is_dir: bool,
    size: u64,
}

/// Produce a flat listing of `entry.path`, directories before files at each
/// level. Directories whose contents did not fit under the item ceiling get a
/// `./dir/...` marker line.
pub fn list_directory(entry: &DirectoryEntry, limits: ListingLimits) -> Result<String, ContextError> {
    let root = entry.path.as_path();
    fs::read_dir(root).map_err(|source| ContextError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let extra = build_extra_patterns(root, &entry.ignore_patterns);
    let mut lines: Vec<String> = Vec::new();
    let mut truncated: Vec<PathBuf> = Vec::new();
    let mut queue = VecDeque::from([Pending {
        path: root.to_path_buf(),
        depth: 0,
        gitignores: Vec::new(),
    }]);

    while let Some(current) = queue.pop_front() {
        if lines.len() >= limits.max_items {
            if has_entries(&current.path) {
                truncated.push(current.path);
            }
            continue;
        }

        let mut gitignores = current.gitignores;
        if entry.respect_gitignore
            && let Some(local) = load_gitignore(&current.path)
        {
            gitignores.push(Arc::new(local));
        }

        let children = match read_children(&current.path, &gitignores, extra.as_ref()) {
            Ok(children) => children,
            Err(err) => {
                tracing::debug!(path = %current.path.display(), error = %err, "Skipping unreadable directory");
                continue;
            }
        };

        for child in children {
            if lines.len() >= limits.max_items {
                truncated.push(current.path.clone());
                break;
            }
            let display = display_path(root, &child.path);
            if child.is_dir {
                lines.push(format!("{display}/"));
                if current.depth < limits.max_depth {
                    queue.push_back(Pending {
                        path: child.path,
                        depth: current.depth + 1,
                        gitignores: gitignores.clone(),
                    });
                }
            } else {
                lines.push(format!("{display} ({})", format_size(child.size)));
            }
        }
    }

    for dir in truncated {
        let display = display_path(root, &dir);
        if display == "." {
            lines.push("./...".to_string());
        } else {
            lines.push(format!("{display}/..."));
        }
    }

    Ok(lines.join("\n"))
}

fn read_children(
    dir: &Path,
    gitignores: &[Arc<Gitignore>],
    extra: Option<&Gitignore>,
) -> std::io::Result<Vec<Child>> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for item in fs::read_dir(dir)? {
        let item = item?;
        let name = item.file_name().to_string_lossy().into_owned();
        if DEFAULT_IGNORES.contains(&name.as_str()) || name.starts_with('.') || name.ends_with(".log") {
            continue;
        }

        let file_type = item.file_type()?;
        let is_dir = file_type.is_dir();
        let path = item.path();
        if is_ignored(&path, is_dir, gitignores, extra) {
            continue;
        }

        let size = if is_dir {
            0
        } else {
            item.metadata().map(|m| m.len()).unwrap_or(0)
        };
        let child = Child {
            name,
            path,
            is_dir,
            size,
        };
        if is_dir {
            dirs.push(child);
        } else {
            files.push(child);
        }
    }

    dirs.sort_by(|a, b| a.name.cmp(&b.name));
    files.sort_by(|a, b| a.name.cmp(&b.name));
    dirs.extend(files);
    Ok(dirs)
}

fn is_ignored(path: &Path, is_dir: bool, gitignores: &[Arc<Gitignore>], extra: Option<&Gitignore>) -> bool {
    if let Some(extra) = extra
        && extra.matched(path, is_dir).is_ignore()
    {
        return true;
    }
    // Deeper .gitignore files take precedence over shallower ones.
    for gitignore in gitignores.iter().rev() {
        match gitignore.matched(path, is_dir) {
            Match::Ignore(_) => return true,
            Match::Whitelist(_) => return false,
            Match::None => {}
        }
    }
    false
}

fn has_entries(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_some())
}

fn load_gitignore(dir: &Path) -> Option<Gitignore> {
    let file = dir.join(".gitignore");
    if !file.is_file() {
        return None;
    }
    let mut builder = GitignoreBuilder::new(dir);
    if let Some(err) = builder.add(&file) {
        tracing::debug!(path = %file.display(), error = %err, "Partially parsed .gitignore");
    }
    builder.build().ok()
}

fn build_extra_patterns(root: &Path, patterns: &[String]) -> Option<Gitignore> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        if let Err(err) = builder.add_line(None, pattern) {
            tracing::debug!(pattern = %pattern, error = %err, "Ignoring invalid pattern");
        }
    }
    builder.build().ok()
}

fn display_path(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => format!("./{}", rel.display()),
        Err(_) => path.display().to_string(),
    }
}

/// Human-readable size: bytes below 1 KiB, then KB/MB with one decimal.
pub fn format_size(size: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if size < KIB {
        format!("{size} B")
    } else if size < MIB {
        format!("{:.1} KB", size as f64 / KIB as f64)
    } else {
        format!("{:.1} MB", size as f64 / MIB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str, bytes: usize) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "x".repeat(bytes)).unwrap();
    }

    fn listing(entry: DirectoryEntry, limits: ListingLimits) -> Vec<String> {
        list_directory(&entry, limits)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn directories_come_before_files_level_by_level() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.txt", 3);
        touch(tmp.path(), "src/main.rs", 10);
        touch(tmp.path(), "a.txt", 2048);

        let lines = listing(DirectoryEntry::new(tmp.path()), ListingLimits::default());
        assert_eq!(
            lines,
            vec!["./src/", "./a.txt (2.0 KB)", "./b.txt (3 B)", "./src/main.rs (10 B)"]
        );
    }

    #[test]
    fn default_ignores_apply() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "node_modules/pkg/index.js", 1);
        touch(tmp.path(), ".env", 1);
        touch(tmp.path(), "debug.log", 1);
        touch(tmp.path(), "keep.rs", 1);

        let lines = listing(DirectoryEntry::new(tmp.path()), ListingLimits::default());
        assert_eq!(lines, vec!["./keep.rs (1 B)"]);
    }

    #[test]
    fn extra_patterns_and_gitignore_apply() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "target/\n").unwrap();
        touch(tmp.path(), "target/debug/app", 1);
        touch(tmp.path(), "notes.tmp", 1);
        touch(tmp.path(), "lib.rs", 1);

        let mut entry = DirectoryEntry::new(tmp.path());
        entry.ignore_patterns = vec!["*.tmp".into()];
        let lines = listing(entry.clone(), ListingLimits::default());
        assert_eq!(lines, vec!["./lib.rs (1 B)"]);

        entry.respect_gitignore = false;
        let lines = listing(entry, ListingLimits::default());
        assert!(lines.contains(&"./target/".to_string()));
    }

    #[test]
    fn item_ceiling_marks_truncated_directory() {
        let tmp = TempDir::new().unwrap();
        for i in 0..8 {
            touch(tmp.path(), &format!("f{i}.txt"), 1);
        }
        let limits = ListingLimits {
            max_items: 5,
            max_depth: 10,
        };
        let lines = listing(DirectoryEntry::new(tmp.path()), limits);
        let entries: Vec<_> = lines.iter().filter(|l| !l.ends_with("...")).collect();
        assert_eq!(entries.len(), 5);
        assert_eq!(lines.last().map(String::as_str), Some("./..."));
    }

    #[test]
    fn unexplored_subdirectories_are_marked() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "sub/a.txt", 1);
        touch(tmp.path(), "sub/b.txt", 1);
        touch(tmp.path(), "top.txt", 1);
        let limits = ListingLimits {
            max_items: 2,
            max_depth: 10,
        };
        let lines = listing(DirectoryEntry::new(tmp.path()), limits);
        assert_eq!(lines, vec!["./sub/", "./top.txt (1 B)", "./sub/..."]);
    }

    #[test]
    fn empty_directories_past_the_ceiling_get_no_marker() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("empty")).unwrap();
        touch(tmp.path(), "full/a.txt", 1);
        let limits = ListingLimits {
            max_items: 2,
            max_depth: 10,
        };
        let lines = listing(DirectoryEntry::new(tmp.path()), limits);
        assert_eq!(lines, vec!["./empty/", "./full/", "./full/..."]);
    }

    #[test]
    fn depth_ceiling_stops_descent() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a/b/c.txt", 1);
        let limits = ListingLimits {
            max_items: 100,
            max_depth: 1,
        };
        let lines = listing(DirectoryEntry::new(tmp.path()), limits);
        assert_eq!(lines, vec!["./a/", "./a/b/"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let entry = DirectoryEntry::new(tmp.path().join("nope"));
        assert!(matches!(
            list_directory(&entry, ListingLimits::default()),
            Err(ContextError::Io { .. })
        ));
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
