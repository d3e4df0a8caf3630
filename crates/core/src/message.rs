//! Message domain types and the append-only message log.
//!
//! The log never removes entries. Deleting a message flips its status to
//! [`MessageStatus::Deleted`] (a tombstone) and records a copy of it with the
//! journal so the session file stays a faithful audit trail.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder sent to the backend in place of a removed tool result whose
/// call is still part of the active history.
pub const REMOVED_RESULT_PLACEHOLDER: &str = "(tool output removed from history)";

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Active,
    Deleted,
}

/// A tool call requested by the assistant.
///
/// `arguments` is the raw JSON text exactly as the backend produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Backend-assigned call id
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Name of the tool that produced this result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Set on tool results that report a failure
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,

    #[serde(default)]
    pub status: MessageStatus,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn base(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            is_error: false,
            status: MessageStatus::Active,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::base(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::base(Role::Assistant, content.into())
    }

    /// Create an assistant message carrying tool calls.
    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut message = Self::base(Role::Assistant, content.into());
        message.tool_calls = tool_calls;
        message
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::base(Role::System, content.into())
    }

    /// Create a successful tool result message.
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        let mut message = Self::base(Role::Tool, content.into());
        message.tool_call_id = Some(call.id.clone());
        message.tool_name = Some(call.name.clone());
        message
    }

    /// Create a tool result message flagged as an error.
    pub fn tool_error(call: &ToolCall, content: impl Into<String>) -> Self {
        let mut message = Self::tool_result(call, content);
        message.is_error = true;
        message
    }

    pub fn is_active(&self) -> bool {
        self.status == MessageStatus::Active
    }

    /// A tombstone copy: fresh id and timestamp, status `deleted`.
    fn tombstone(&self) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4().to_string();
        copy.timestamp = Utc::now();
        copy.status = MessageStatus::Deleted;
        copy
    }
}

/// Durable sink for message lifecycle events.
///
/// Called once per appended message and once per tombstone. Implementations
/// handle their own I/O failures; the log never fails because of the journal.
pub trait MessageJournal: Send + Sync {
    fn record(&self, message: &Message);
}

/// Append-only, tombstoned message history.
#[derive(Default)]
pub struct MessageLog {
    entries: Vec<Message>,
    journal: Option<Arc<dyn MessageJournal>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Arc<dyn MessageJournal>) -> Self {
        Self {
            entries: Vec::new(),
            journal: Some(journal),
        }
    }

    /// Append a message and journal it. Returns the message id.
    pub fn push(&mut self, message: Message) -> String {
        if let Some(journal) = &self.journal {
            journal.record(&message);
        }
        let id = message.id.clone();
        self.entries.push(message);
        id
    }

    /// Every entry, tombstones included, in insertion order.
    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn active(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().filter(|m| m.is_active())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tombstone the first active message with `role` whose content contains
    /// `needle`. Returns whether a message was deleted.
    pub fn delete_matching(&mut self, role: Role, needle: &str) -> bool {
        let index = self
            .entries
            .iter()
            .position(|m| m.is_active() && m.role == role && m.content.contains(needle));
        self.tombstone_at(index)
    }

    /// Tombstone the active message with `role` and `id`.
    pub fn delete_by_id(&mut self, role: Role, id: &str) -> bool {
        let index = self
            .entries
            .iter()
            .position(|m| m.is_active() && m.role == role && m.id == id);
        self.tombstone_at(index)
    }

    /// Tombstone every active message. Returns how many were deleted.
    pub fn clear(&mut self) -> usize {
        let indices: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_active())
            .map(|(i, _)| i)
            .collect();
        let count = indices.len();
        for index in indices {
            self.tombstone_at(Some(index));
        }
        count
    }

    fn tombstone_at(&mut self, index: Option<usize>) -> bool {
        let Some(index) = index else {
            return false;
        };
        let entry = &mut self.entries[index];
        if let Some(journal) = &self.journal {
            journal.record(&entry.tombstone());
        }
        entry.status = MessageStatus::Deleted;
        tracing::debug!(id = %entry.id, role = %entry.role, "Message tombstoned");
        true
    }

    /// The history to send to a backend.
    ///
    /// Active messages only, with call/result pairing kept intact: results
    /// whose assistant message was deleted are dropped, and a deleted result
    /// whose call is still active is replaced by a short placeholder.
    pub fn transcript(&self) -> Vec<Message> {
        let mut live_calls: HashSet<&str> = HashSet::new();
        let mut transcript = Vec::new();

        for message in &self.entries {
            match message.role {
                Role::Assistant => {
                    live_calls.clear();
                    if message.is_active() {
                        live_calls.extend(message.tool_calls.iter().map(|c| c.id.as_str()));
                        transcript.push(message.clone());
                    }
                }
                Role::Tool => {
                    let Some(call_id) = message.tool_call_id.as_deref() else {
                        continue;
                    };
                    if !live_calls.contains(call_id) {
                        continue;
                    }
                    let mut result = message.clone();
                    if !message.is_active() {
                        result.content = REMOVED_RESULT_PLACEHOLDER.to_string();
                        result.status = MessageStatus::Active;
                    }
                    transcript.push(result);
                }
                _ => {
                    if message.is_active() {
                        transcript.push(message.clone());
                    }
                }
            }
        }
        transcript
    }

    /// Total byte length of active message content.
    pub fn character_count(&self) -> usize {
        self.active().map(|m| m.content.len()).sum()
    }
}
