//! Path resolution for tool arguments.
//!
//! Turns whatever the model passed (relative, `~/`-prefixed, containing `.`
//! or `..`) into a normalized absolute path before any I/O happens.

use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("path cannot be empty")]
    Empty,

    #[error("path '{path}' escapes the filesystem root")]
    AboveRoot { path: String },
}

/// Resolve `raw` against `base` and normalize it lexically.
///
/// Symlinks are left alone so the result is stable whether or not the file
/// exists yet.
pub fn resolve_path(base: &Path, raw: &str) -> Result<PathBuf, PathError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathError::Empty);
    }

    let expanded = expand_tilde(trimmed);
    let candidate = Path::new(&expanded);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    };

    normalize(&joined).ok_or_else(|| PathError::AboveRoot { path: raw.into() })
}

/// Lexically normalize an absolute path.
pub fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() || out.as_os_str().is_empty() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Some(out)
}

/// Expand ~ to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if (path.starts_with("~/") || path == "~")
        && let Ok(home) = home_dir()
    {
        return path.replacen('~', &home, 1);
    }
    path.to_string()
}

fn home_dir() -> Result<String, std::env::VarError> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
    }
}
