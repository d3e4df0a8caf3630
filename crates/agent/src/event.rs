//! Agent-level events.
//!
//! `AgentEvent` is what the loop tells its front end while a turn runs:
//! streamed text, tool progress, and notices. Events are delivered
//! synchronously through an [`EventSink`], so a terminal front end prints
//! them in the order they happened.

use serde::{Deserialize, Serialize};

/// Events emitted by the agent during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Partial assistant text.
    Chunk { content: String },

    /// End of one streamed response.
    ResponseEnd,

    /// The agent is calling a tool.
    ToolCall { id: String, name: String, arguments: String },

    /// Incremental status text from a running tool.
    ToolStatus { name: String, text: String },

    /// Tool finished; `human` is the rich description, possibly empty.
    ToolResult { id: String, name: String, human: String },

    /// Tool failed; `message` is already formatted for display.
    ToolFailed { id: String, name: String, message: String },

    /// Something the user should know that is not part of the answer.
    Notice { message: String },
}

impl AgentEvent {
    /// Short name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ResponseEnd => "response_end",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolStatus { .. } => "tool_status",
            Self::ToolResult { .. } => "tool_result",
            Self::ToolFailed { .. } => "tool_failed",
            Self::Notice { .. } => "notice",
        }
    }
}

/// Receives events as they happen. Must not block for long: it runs on the
/// agent's task.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AgentEvent);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: AgentEvent) {}
}

/// Keeps every event; handy for tests and for replaying a turn.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: std::sync::Mutex<Vec<AgentEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AgentEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: AgentEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_chunk() {
        let event = AgentEvent::Chunk {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"chunk""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn event_serialization_tool_call() {
        let event = AgentEvent::ToolCall {
            id: "call_1".into(),
            name: "shell".into(),
            arguments: r#"{"command":"ls"}"#.into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_call""#));
        assert!(json.contains(r#""name":"shell""#));
        assert_eq!(event.event_type(), "tool_call");
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"notice","message":"hi"}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentEvent::Notice { message } => assert_eq!(message, "hi"),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.emit(AgentEvent::Chunk { content: "a".into() });
        sink.emit(AgentEvent::ResponseEnd);
        let types: Vec<_> = sink.events().iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["chunk", "response_end"]);
    }
}
