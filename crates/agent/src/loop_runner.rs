//! The agent reasoning loop implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parrot_config::ResolvedModel;
use parrot_core::diagnostics::ErrorReporter;
use parrot_core::error::{AgentError, ToolError};
use parrot_core::message::{Message, ToolCall};
use parrot_core::provider::{Provider, ProviderRequest};
use parrot_core::session::SharedSession;
use parrot_core::tool::{ToolContext, ToolOutput, ToolRegistry};
use parrot_tools::update_context;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::accumulator::{self, AccumulatedResponse};
use crate::consolidate::consolidate;
use crate::event::{AgentEvent, EventSink, NullSink};
use crate::prompt;

/// Capacity of the per-dispatch status queue. Updates beyond it are dropped.
pub const STATUS_CAPACITY: usize = 64;

pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Model id and sampling settings sent with every request.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ModelSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            top_p: None,
            max_tokens: None,
        }
    }

    pub(crate) fn request(&self, system_prompt: String, messages: Vec<Message>) -> ProviderRequest {
        let mut request = ProviderRequest::new(self.model.clone(), system_prompt, messages);
        request.temperature = self.temperature;
        request.top_p = self.top_p;
        request.max_tokens = self.max_tokens;
        request
    }
}

impl From<&ResolvedModel> for ModelSettings {
    fn from(model: &ResolvedModel) -> Self {
        Self {
            model: model.model_id.clone(),
            temperature: Some(model.temperature),
            top_p: model.top_p,
            max_tokens: Some(model.max_tokens),
        }
    }
}

/// Where the loop is in a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Streaming { iteration: u32 },
    Dispatching { iteration: u32, calls: usize },
}

/// The core agent loop that orchestrates backend calls and tool execution.
pub struct AgentLoop {
    /// The backend to stream from
    provider: Arc<dyn Provider>,

    settings: ModelSettings,

    /// Tool registry
    tools: ToolRegistry,

    /// Message log and live context, shared with background tasks
    session: SharedSession,

    working_dir: PathBuf,

    reporter: Arc<ErrorReporter>,

    sink: Arc<dyn EventSink>,

    /// Maximum backend round trips per turn; `None` means unbounded
    max_iterations: Option<u32>,

    /// Consecutive failed dispatches that end a turn
    max_consecutive_failures: u32,

    state: watch::Sender<LoopState>,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        settings: ModelSettings,
        tools: ToolRegistry,
        session: SharedSession,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            provider,
            settings,
            tools,
            session,
            working_dir: working_dir.into(),
            reporter: Arc::new(ErrorReporter::default()),
            sink: Arc::new(NullSink),
            max_iterations: None,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            state,
        }
    }

    /// Set the maximum number of backend round trips per turn.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }

    /// Set how many tool failures in a row end a turn. At least one.
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max.max(1);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Switch backend and model. Takes effect on the next turn.
    pub fn set_model(&mut self, provider: Arc<dyn Provider>, settings: ModelSettings) {
        info!(provider = %provider.name(), model = %settings.model, "Model switched");
        self.provider = provider;
        self.settings = settings;
    }

    pub fn provider(&self) -> Arc<dyn Provider> {
        Arc::clone(&self.provider)
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn reporter(&self) -> &Arc<ErrorReporter> {
        &self.reporter
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: LoopState) {
        debug!(?state, "Loop state");
        self.state.send_replace(state);
    }

    /// Run one conversation turn for `input`.
    ///
    /// Streams, dispatches and repeats until the backend answers without
    /// calling a tool. Returns that answer, or why the turn stopped early.
    pub async fn run_turn(&self, input: &str, cancel: &CancellationToken) -> Result<String, AgentError> {
        info!(model = %self.settings.model, provider = %self.provider.name(), "Processing turn");
        self.session.write().await.messages.push(Message::user(input));

        let result = self.drive(cancel).await;
        self.set_state(LoopState::Idle);
        result
    }

    async fn drive(&self, cancel: &CancellationToken) -> Result<String, AgentError> {
        let mut iteration = 0u32;
        let mut failures = 0u32;

        loop {
            if let Some(max) = self.max_iterations
                && iteration >= max
            {
                warn!(max, "Max tool iterations reached, stopping turn");
                self.session.write().await.messages.push(Message::assistant(format!(
                    "Reached maximum tool call iterations ({max}). Processing stopped."
                )));
                return Err(AgentError::IterationLimit(max));
            }
            iteration += 1;
            self.set_state(LoopState::Streaming { iteration });

            let response = self.stream_response(cancel).await?;

            if response.tool_calls.is_empty() {
                self.session
                    .write()
                    .await
                    .messages
                    .push(Message::assistant(response.text.clone()));
                return Ok(response.text);
            }

            let calls = consolidate(response.tool_calls, update_context::NAME);
            debug!(iteration, tool_count = calls.len(), "Executing tool calls");
            self.session
                .write()
                .await
                .messages
                .push(Message::assistant_with_tools(response.text, calls.clone()));
            self.set_state(LoopState::Dispatching {
                iteration,
                calls: calls.len(),
            });

            let (results, stop) = self.dispatch_all(&calls, &mut failures, cancel).await;
            {
                let mut session = self.session.write().await;
                for result in results {
                    session.messages.push(result);
                }
            }
            if let Some(err) = stop {
                return Err(err);
            }
        }
    }

    /// One backend round trip with a freshly built prompt.
    async fn stream_response(&self, cancel: &CancellationToken) -> Result<AccumulatedResponse, AgentError> {
        let request = {
            let session = self.session.read().await;
            let system_prompt = prompt::system_prompt(&session, &self.working_dir);
            let mut request = self.settings.request(system_prompt, session.messages.transcript());
            request.tools = self.tools.definitions(&session);
            request
        };

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            stream = self.provider.stream(request) => stream?,
        };

        let response = accumulator::collect(stream, cancel, |text| {
            self.sink.emit(AgentEvent::Chunk {
                content: text.to_string(),
            })
        })
        .await;
        self.sink.emit(AgentEvent::ResponseEnd);

        match response.error {
            Some(err) => {
                if !response.text.is_empty() {
                    debug!(chars = response.text.len(), "Discarding partial response");
                }
                Err(err.into())
            }
            None => Ok(response),
        }
    }

    /// Dispatch `calls` in order and collect one result message per call.
    ///
    /// Stops early on cancellation or when the failure budget runs out; the
    /// calls that were not attempted still get a result.
    async fn dispatch_all(
        &self,
        calls: &[ToolCall],
        failures: &mut u32,
        cancel: &CancellationToken,
    ) -> (Vec<Message>, Option<AgentError>) {
        let mut results = Vec::with_capacity(calls.len());

        for (index, call) in calls.iter().enumerate() {
            if cancel.is_cancelled() {
                for rest in &calls[index..] {
                    results.push(Message::tool_error(rest, "Cancelled before execution"));
                }
                return (results, Some(AgentError::Cancelled));
            }

            self.sink.emit(AgentEvent::ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            });

            match dispatch_with_status(&self.tools, &self.session, &self.working_dir, &self.sink, call).await {
                Ok(output) => {
                    *failures = 0;
                    self.sink.emit(AgentEvent::ToolResult {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        human: output.human,
                    });
                    results.push(Message::tool_result(call, output.agent));
                }
                Err(err) => {
                    *failures += 1;
                    warn!(tool = %call.name, call_id = %call.id, failures = *failures, error = %err, "Tool call failed");
                    self.sink.emit(AgentEvent::ToolFailed {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        message: self.reporter.tool_failure(&call.name, &err),
                    });
                    results.push(Message::tool_error(call, err.to_string()));

                    if *failures >= self.max_consecutive_failures {
                        for rest in &calls[index + 1..] {
                            results.push(Message::tool_error(rest, "Skipped after repeated tool failures"));
                        }
                        return (
                            results,
                            Some(AgentError::TooManyFailures {
                                count: *failures,
                                last_error: err.to_string(),
                            }),
                        );
                    }
                }
            }
        }

        (results, None)
    }
}

/// Dispatch one call with a status queue drained into `sink`.
///
/// The consumer lives exactly as long as the dispatch: the sending half is
/// dropped with the tool context and the consumer is awaited before
/// returning, so every status line precedes the result.
pub(crate) async fn dispatch_with_status(
    tools: &ToolRegistry,
    session: &SharedSession,
    working_dir: &Path,
    sink: &Arc<dyn EventSink>,
    call: &ToolCall,
) -> Result<ToolOutput, ToolError> {
    let (tx, mut rx) = mpsc::channel::<String>(STATUS_CAPACITY);
    let consumer = {
        let sink = Arc::clone(sink);
        let name = call.name.clone();
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                sink.emit(AgentEvent::ToolStatus {
                    name: name.clone(),
                    text,
                });
            }
        })
    };

    let ctx = ToolContext::new(Arc::clone(session), working_dir.to_path_buf()).with_status(tx);
    let result = tools.dispatch(&ctx, call).await;
    drop(ctx);

    if let Err(err) = consumer.await {
        debug!(error = %err, "Status consumer ended abnormally");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RecordingSink;
    use crate::test_helpers::{Script, ScriptedProvider, calls, text};
    use parrot_context::LiveContext;
    use parrot_core::context::FileEntry;
    use parrot_core::error::ProviderError;
    use parrot_core::message::{MessageLog, Role};
    use parrot_core::provider::StreamFragment;
    use parrot_core::session::Session;
    use parrot_tools::{ToolOptions, default_registry};
    use serde_json::json;
    use tempfile::TempDir;

    struct Harness {
        tmp: TempDir,
        provider: Arc<ScriptedProvider>,
        sink: Arc<RecordingSink>,
        agent: AgentLoop,
    }

    fn harness(scripts: Vec<Script>) -> Harness {
        let tmp = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new(scripts));
        let sink = Arc::new(RecordingSink::new());
        let session = Session::new(MessageLog::new(), LiveContext::new(tmp.path())).into_shared();
        let agent = AgentLoop::new(
            provider.clone(),
            ModelSettings::new("test-model"),
            default_registry(&ToolOptions::default()),
            session,
            tmp.path(),
        )
        .with_sink(sink.clone());
        Harness {
            tmp,
            provider,
            sink,
            agent,
        }
    }

    async fn active_messages(agent: &AgentLoop) -> Vec<Message> {
        agent.session().read().await.messages.active().cloned().collect()
    }

    #[tokio::test]
    async fn simple_text_response() {
        let h = harness(vec![text("Hello! How can I help?")]);
        let answer = h.agent.run_turn("Hi", &CancellationToken::new()).await.unwrap();
        assert_eq!(answer, "Hello! How can I help?");

        let messages = active_messages(&h.agent).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(h.agent.state(), LoopState::Idle);

        let requests = h.provider.requests();
        assert_eq!(requests[0].model, "test-model");
        assert!(requests[0].tools.iter().any(|t| t.name == "update_context"));
        assert!(
            h.sink
                .events()
                .contains(&AgentEvent::Chunk {
                    content: "Hello! How can I help?".into()
                })
        );
    }

    #[tokio::test]
    async fn tool_call_then_answer() {
        let h = harness(vec![
            calls(&[("c1", "create_file", json!({"path": "out.txt", "content": "hi\n"}))]),
            text("Done."),
        ]);
        let answer = h.agent.run_turn("make a file", &CancellationToken::new()).await.unwrap();
        assert_eq!(answer, "Done.");
        assert_eq!(std::fs::read_to_string(h.tmp.path().join("out.txt")).unwrap(), "hi\n");

        let messages = active_messages(&h.agent).await;
        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(messages[2].content, "Created");

        // the second request carries the result back to the backend
        let requests = h.provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn prompt_is_rebuilt_every_iteration() {
        let h = harness(vec![
            calls(&[("c1", "create_file", json!({"path": "notes.md", "content": "version one"}))]),
            calls(&[("c2", "edit_file", json!({"path": "notes.md", "old_str": "one", "new_str": "two"}))]),
            text("ok"),
        ]);
        h.agent
            .session()
            .write()
            .await
            .context
            .add_file(FileEntry::whole("notes.md"))
            .unwrap();

        h.agent.run_turn("go", &CancellationToken::new()).await.unwrap();
        let requests = h.provider.requests();
        assert!(requests[1].system_prompt.contains("version one"));
        assert!(requests[2].system_prompt.contains("version two"));
        assert!(!requests[2].system_prompt.contains("version one"));
    }

    #[tokio::test]
    async fn context_calls_are_consolidated_before_dispatch() {
        let h = harness(vec![
            calls(&[
                ("u1", "update_context", json!({"add_directory": "."})),
                ("u2", "update_context", json!({"add_directory": "src"})),
            ]),
            text("tracked"),
        ]);
        std::fs::create_dir(h.tmp.path().join("src")).unwrap();
        h.agent.run_turn("track", &CancellationToken::new()).await.unwrap();

        let messages = active_messages(&h.agent).await;
        assert_eq!(messages[1].tool_calls.len(), 1);
        assert_eq!(messages[1].tool_calls[0].id, "u1");
        let results: Vec<_> = messages.iter().filter(|m| m.role == Role::Tool).collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tool_call_id.as_deref(), Some("u1"));
        assert_eq!(h.agent.session().read().await.context.directories().len(), 2);
    }

    #[tokio::test]
    async fn failure_budget_ends_turn_with_every_result_recorded() {
        let h = harness(vec![calls(&[
            ("f1", "delete_file", json!({"path": "missing-1"})),
            ("f2", "nonexistent_tool", json!({})),
            ("f3", "edit_file", json!({"path": "missing-3", "old_str": "a", "new_str": "b"})),
            ("f4", "shell", json!({"command": "echo never"})),
        ])]);

        let err = h.agent.run_turn("break things", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::TooManyFailures { count: 3, .. }));

        let messages = active_messages(&h.agent).await;
        let results: Vec<_> = messages.iter().filter(|m| m.role == Role::Tool).collect();
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|m| m.is_error));
        assert_eq!(results[3].tool_call_id.as_deref(), Some("f4"));
        assert!(results[3].content.contains("Skipped"));

        let failed = h
            .sink
            .events()
            .iter()
            .filter(|e| matches!(e, AgentEvent::ToolFailed { .. }))
            .count();
        assert_eq!(failed, 3);
    }

    #[tokio::test]
    async fn success_resets_failure_counter() {
        let h = harness(vec![
            calls(&[
                ("a", "delete_file", json!({"path": "nope"})),
                ("b", "delete_file", json!({"path": "nope"})),
                ("c", "create_file", json!({"path": "x", "content": ""})),
                ("d", "delete_file", json!({"path": "nope"})),
                ("e", "delete_file", json!({"path": "nope"})),
            ]),
            text("recovered"),
        ]);
        let answer = h.agent.run_turn("try", &CancellationToken::new()).await.unwrap();
        assert_eq!(answer, "recovered");
    }

    #[tokio::test]
    async fn iteration_limit_appends_stopped_message() {
        let h = harness(vec![
            calls(&[("c1", "shell", json!({"command": "true"}))]),
            calls(&[("c2", "shell", json!({"command": "true"}))]),
        ]);
        let agent = h.agent.with_max_iterations(2);

        let err = agent.run_turn("loop", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::IterationLimit(2)));

        let messages = active_messages(&agent).await;
        let last = messages.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Reached maximum tool call iterations (2). Processing stopped.");
    }

    #[tokio::test]
    async fn stream_error_aborts_turn() {
        let h = harness(vec![Script::Fragments(vec![
            Ok(StreamFragment::content("partial")),
            Err(ProviderError::Network("connection reset".into())),
        ])]);
        let err = h.agent.run_turn("hi", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::Stream(ProviderError::Network(_))));
        assert_eq!(active_messages(&h.agent).await.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_during_stream() {
        let h = harness(vec![Script::Hang(vec![Ok(StreamFragment::content("thinking"))])]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = h.agent.run_turn("hi", &cancel).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(h.agent.state(), LoopState::Idle);
    }

    #[tokio::test]
    async fn tool_status_precedes_result() {
        let h = harness(vec![
            calls(&[("c1", "update_context", json!({"add_directory": "."}))]),
            text("ok"),
        ]);
        h.agent.run_turn("track", &CancellationToken::new()).await.unwrap();

        let types: Vec<_> = h.sink.events().iter().map(|e| e.event_type()).collect();
        let status = types.iter().position(|t| *t == "tool_status").unwrap();
        let result = types.iter().position(|t| *t == "tool_result").unwrap();
        assert!(status < result);
    }

    #[tokio::test]
    async fn state_transitions_are_published() {
        let h = harness(vec![
            calls(&[("c1", "shell", json!({"command": "true"}))]),
            text("ok"),
        ]);
        let mut rx = h.agent.subscribe();
        h.agent.run_turn("go", &CancellationToken::new()).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), LoopState::Idle);
    }
}
