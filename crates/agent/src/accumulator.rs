//! Stream accumulator.
//!
//! Rebuilds the assistant text and the complete tool calls from a stream of
//! fragments. Tool-call fragments are grouped by call id and their argument
//! text is concatenated in arrival order. A call is only returned once the
//! backend has said it is finished.

use std::collections::HashMap;

use parrot_core::error::ProviderError;
use parrot_core::message::ToolCall;
use parrot_core::provider::{FragmentStream, StreamFragment};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// What one streamed response amounted to.
#[derive(Debug, Default)]
pub struct AccumulatedResponse {
    pub text: String,

    /// Finished calls, in order of their first fragment.
    pub tool_calls: Vec<ToolCall>,

    /// Set when the stream ended abnormally. `text` still holds whatever
    /// arrived before the failure.
    pub error: Option<ProviderError>,
}

#[derive(Debug)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
    finished: bool,
}

#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    calls: Vec<PendingCall>,
    by_id: HashMap<String, usize>,
    done: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fold one fragment in. Content is also handed to `sink` immediately.
    pub fn push(&mut self, fragment: StreamFragment, sink: &mut dyn FnMut(&str)) {
        match fragment {
            StreamFragment::Content { text } => {
                sink(&text);
                self.text.push_str(&text);
            }
            StreamFragment::ToolCall { id, name, arguments } => {
                let index = match self.by_id.get(&id) {
                    Some(&index) => index,
                    None => {
                        self.calls.push(PendingCall {
                            id: id.clone(),
                            name: String::new(),
                            arguments: String::new(),
                            finished: false,
                        });
                        self.by_id.insert(id, self.calls.len() - 1);
                        self.calls.len() - 1
                    }
                };
                let call = &mut self.calls[index];
                if let Some(name) = name.filter(|n| !n.is_empty()) {
                    call.name = name;
                }
                call.arguments.push_str(&arguments);
            }
            StreamFragment::ToolCallFinished { id } => match self.by_id.get(&id) {
                Some(&index) => self.calls[index].finished = true,
                None => trace!(call_id = %id, "Finish signal for unknown tool call"),
            },
            StreamFragment::Done => self.done = true,
        }
    }

    /// Close the accumulator. Calls the backend never finished are dropped.
    pub fn finish(self, error: Option<ProviderError>) -> AccumulatedResponse {
        let mut tool_calls = Vec::with_capacity(self.calls.len());
        for call in self.calls {
            if !call.finished {
                warn!(call_id = %call.id, tool = %call.name, "Dropping tool call that never finished");
                continue;
            }
            if call.name.is_empty() {
                warn!(call_id = %call.id, "Dropping tool call without a name");
                continue;
            }
            tool_calls.push(ToolCall::new(call.id, call.name, call.arguments));
        }
        AccumulatedResponse {
            text: self.text,
            tool_calls,
            error,
        }
    }
}

/// Drain `stream` until it completes, fails, or `cancel` fires.
///
/// Cancellation drops the stream, which tells the producer to stop.
pub async fn collect(
    mut stream: FragmentStream,
    cancel: &CancellationToken,
    mut sink: impl FnMut(&str),
) -> AccumulatedResponse {
    let mut accumulator = StreamAccumulator::new();

    let error = loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Some(ProviderError::Cancelled),
            item = stream.recv() => item,
        };
        match item {
            Some(Ok(fragment)) => {
                accumulator.push(fragment, &mut sink);
                if accumulator.is_done() {
                    break None;
                }
            }
            Some(Err(err)) => break Some(err),
            None => {
                break Some(ProviderError::StreamInterrupted(
                    "response ended without a completion signal".into(),
                ));
            }
        }
    };

    accumulator.finish(error)
}
