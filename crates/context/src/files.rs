//! Reading a tracked file's requested slice.

use std::fs;

use parrot_core::{ContextError, FileEntry};

/// Lines beyond this count are cut and replaced by a marker.
pub const MAX_LINES: usize = 2000;

/// Characters kept per line before it is cut with `...`.
pub const MAX_LINE_CHARS: usize = 2000;

/// Read `entry` from disk and render the requested range.
///
/// Without a range the content is returned byte for byte (modulo the caps).
/// With a range every line is prefixed with its 1-based number.
pub fn read_slice(entry: &FileEntry) -> Result<String, ContextError> {
    let bytes = fs::read(&entry.path).map_err(|source| ContextError::Io {
        path: entry.path.clone(),
        source,
    })?;
    let content = String::from_utf8_lossy(&bytes);
    render(&content, entry)
}

fn render(content: &str, entry: &FileEntry) -> Result<String, ContextError> {
    let lines: Vec<&str> = content.split('\n').collect();
    let total = lines.len();

    let start = entry.start_line.max(1);
    if start > total {
        return Err(ContextError::StartLineOutOfRange { start, total });
    }

    let end = match entry.end_line {
        None => total as i64,
        Some(n) if n < 0 => total as i64 + n + 1,
        Some(n) => n,
    };
    let end = end.min(total as i64);
    if end < start as i64 {
        return Err(ContextError::EndBeforeStart { end, start });
    }

    let selected = &lines[start - 1..end as usize];
    let numbered = entry.is_ranged();

    let mut out: Vec<String> = Vec::with_capacity(selected.len().min(MAX_LINES + 1));
    for (offset, line) in selected.iter().enumerate() {
        if offset == MAX_LINES {
            out.push(format!("... (truncated after {MAX_LINES} lines)"));
            break;
        }
        let line = cap_line(line);
        if numbered {
            out.push(format!("{}: {}", start + offset, line));
        } else {
            out.push(line);
        }
    }
    Ok(out.join("\n"))
}

fn cap_line(line: &str) -> String {
    match line.char_indices().nth(MAX_LINE_CHARS) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}
