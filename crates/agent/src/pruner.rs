//! Background context pruning.
//!
//! The pruner hands the backend every active message with its size plus the
//! live context, exposes only the tools that remove things, and executes
//! whatever it asks for in a single pass. It runs beside normal turns and
//! shares their session lock.

use std::path::PathBuf;
use std::sync::Arc;

use parrot_core::error::AgentError;
use parrot_core::message::Message;
use parrot_core::provider::Provider;
use parrot_core::session::SharedSession;
use parrot_core::tool::ToolRegistry;
use parrot_tools::PRUNER_TOOLS;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::accumulator;
use crate::event::{EventSink, NullSink};
use crate::loop_runner::{AgentLoop, ModelSettings, dispatch_with_status};
use crate::prompt;

const INSTRUCTION: &str = "Look over the messages and files. Use the tools to reduce the context size.";

/// Outcome of one pruning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneReport {
    /// Session size in characters before and after.
    pub before: usize,
    pub after: usize,
    pub applied: usize,
    pub failed: usize,
}

impl PruneReport {
    pub fn reduction(&self) -> usize {
        self.before.saturating_sub(self.after)
    }
}

impl std::fmt::Display for PruneReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pruning complete: {} -> {} characters ({} removed, {} operations",
            self.before,
            self.after,
            self.reduction(),
            self.applied
        )?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        f.write_str(")")
    }
}

pub struct Pruner {
    provider: Arc<dyn Provider>,
    settings: ModelSettings,
    tools: ToolRegistry,
    session: SharedSession,
    working_dir: PathBuf,
    sink: Arc<dyn EventSink>,
}

impl Pruner {
    /// `tools` is narrowed to the pruning tools.
    pub fn new(
        provider: Arc<dyn Provider>,
        settings: ModelSettings,
        tools: &ToolRegistry,
        session: SharedSession,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            settings,
            tools: tools.subset(&PRUNER_TOOLS),
            session,
            working_dir: working_dir.into(),
            sink: Arc::new(NullSink),
        }
    }

    /// A pruner using the loop's backend, tools and session.
    pub fn for_agent(agent: &AgentLoop) -> Self {
        Self::new(
            agent.provider(),
            agent.settings().clone(),
            agent.tools(),
            Arc::clone(agent.session()),
            agent.working_dir(),
        )
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one pruning pass. `target` is the size in characters to aim for.
    pub async fn run(&self, target: Option<usize>, cancel: &CancellationToken) -> Result<PruneReport, AgentError> {
        let (before, request) = {
            let session = self.session.read().await;
            let mut request = self.settings.request(
                prompt::pruner_prompt(&session, target),
                vec![Message::user(INSTRUCTION)],
            );
            request.tools = self.tools.definitions(&session);
            (session.character_count(), request)
        };
        info!(before, ?target, "Pruning context");

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            stream = self.provider.stream(request) => stream?,
        };
        let response = accumulator::collect(stream, cancel, |_| {}).await;
        if let Some(err) = response.error {
            return Err(err.into());
        }
        if !response.text.is_empty() {
            debug!(text = %response.text, "Pruner commentary");
        }

        let mut applied = 0;
        let mut failed = 0;
        for call in &response.tool_calls {
            match dispatch_with_status(&self.tools, &self.session, &self.working_dir, &self.sink, call).await {
                Ok(output) => {
                    debug!(tool = %call.name, result = %output.agent, "Pruning operation applied");
                    applied += 1;
                }
                Err(err) => {
                    warn!(tool = %call.name, call_id = %call.id, error = %err, "Pruning operation failed");
                    failed += 1;
                }
            }
        }

        let after = self.session.read().await.character_count();
        let report = PruneReport {
            before,
            after,
            applied,
            failed,
        };
        info!(before, after, applied, failed, "Pruning finished");
        Ok(report)
    }

    /// Run in the background.
    pub fn spawn(self, target: Option<usize>, cancel: CancellationToken) -> JoinHandle<Result<PruneReport, AgentError>> {
        tokio::spawn(async move { self.run(target, &cancel).await })
    }
}
