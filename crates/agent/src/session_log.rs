//! Append-only JSONL session log.
//!
//! Every appended message and every tombstone becomes one JSON line. The
//! file is the audit trail; nothing reads it back.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use parrot_core::message::{Message, MessageJournal};

pub struct SessionLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl SessionLog {
    /// Open a new log named after the current local time inside `dir`.
    pub fn create_in(dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let name = format!("{}.jsonl", chrono::Local::now().format("%Y%m%d%H%M%S"));
        Self::open(dir.join(name))
    }

    pub fn open(path: PathBuf) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!(path = %path.display(), "Session log opened");
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, message: &Message) -> std::io::Result<()> {
        let line = serde_json::to_string(message).map_err(std::io::Error::other)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| std::io::Error::other("session log lock poisoned"))?;
        writeln!(writer, "{line}")?;
        writer.flush()
    }
}

impl MessageJournal for SessionLog {
    fn record(&self, message: &Message) {
        if let Err(err) = self.append(message) {
            tracing::warn!(path = %self.path.display(), error = %err, "Failed to write session log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parrot_core::message::{MessageLog, MessageStatus, Role};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn lines(path: &Path) -> Vec<Message> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn logs_creation_and_tombstones() {
        let tmp = TempDir::new().unwrap();
        let log = Arc::new(SessionLog::create_in(&tmp.path().join("sessions")).unwrap());
        let path = log.path().to_path_buf();
        assert_eq!(path.extension().unwrap(), "jsonl");

        let mut messages = MessageLog::with_journal(log);
        let id = messages.push(parrot_core::message::Message::user("hello"));
        assert!(messages.delete_matching(Role::User, "hell"));

        let written = lines(&path);
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].id, id);
        assert_eq!(written[0].status, MessageStatus::Active);
        assert_ne!(written[1].id, id);
        assert_eq!(written[1].status, MessageStatus::Deleted);
        assert_eq!(written[1].content, "hello");
    }
}
