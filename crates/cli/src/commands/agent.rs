//! `parrot` itself: interactive or single-message chat mode.

use std::sync::Arc;
use std::time::Duration;

use parrot_agent::{AgentLoop, ModelSettings, Pruner, SessionLog};
use parrot_config::{AppConfig, ModelRegistry, SelectedModel};
use parrot_context::LiveContext;
use parrot_core::context::ContextStore;
use parrot_core::diagnostics::ErrorReporter;
use parrot_core::error::AgentError;
use parrot_core::message::MessageLog;
use parrot_core::session::Session;
use parrot_tools::{ToolOptions, default_registry};
use tokio_util::sync::CancellationToken;

use super::slash::{HELP, SlashCommand};
use crate::input;
use crate::terminal::TerminalSink;

pub async fn run(
    mut config: AppConfig,
    model_override: Option<String>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let reporter = Arc::new(ErrorReporter::new(config.debug));
    let registry = config.registry();

    if let Some(spec) = model_override {
        let selection = SelectedModel::parse(&spec)?;
        registry.resolve_selected(&selection)?;
        config.model = selection;
        if let Err(e) = config.save() {
            eprintln!("  {}", reporter.system_failure("Saving model selection", &e));
        }
    }

    let resolved = registry.resolve_selected(&config.model)?;
    let provider = parrot_providers::build_provider(&resolved)?;

    let cwd = std::env::current_dir()?;
    let messages = match SessionLog::create_in(&config.session_dir()) {
        Ok(log) => MessageLog::with_journal(Arc::new(log)),
        Err(e) => {
            reporter.warn("session", "open session log", &e);
            MessageLog::new()
        }
    };
    let mut context = LiveContext::new(&cwd);
    context.track_defaults();
    let session = Session::new(messages, context).into_shared();

    let tools = default_registry(&ToolOptions {
        shell_timeout: Duration::from_secs(config.shell_timeout_secs),
    });
    let mut agent = AgentLoop::new(provider, ModelSettings::from(&resolved), tools, session, cwd)
        .with_reporter(Arc::clone(&reporter))
        .with_sink(Arc::new(TerminalSink::new()))
        .with_max_consecutive_failures(config.max_consecutive_failures);
    if let Some(max) = config.max_iterations {
        agent = agent.with_max_iterations(max);
    }

    let mut repl = Repl {
        agent,
        config,
        registry,
        reporter,
    };

    match message {
        Some(message) => {
            repl.turn(&message).await?;
        }
        None => repl.interactive().await,
    }
    Ok(())
}

struct Repl {
    agent: AgentLoop,
    config: AppConfig,
    registry: ModelRegistry,
    reporter: Arc<ErrorReporter>,
}

enum Flow {
    Continue,
    Quit,
}

impl Repl {
    async fn interactive(&mut self) {
        println!();
        println!("  parrot - interactive mode");
        println!();
        println!("  Model:     {}", self.config.model);
        println!("  Directory: {}", self.agent.working_dir().display());
        println!("  Tools:     {}", self.agent.tools().names().join(", "));
        println!("  {}", self.agent.session().read().await.context.usage());
        println!();
        println!("  Type your message and press Enter. /help lists commands.");
        println!("  Ctrl-C cancels a running request; at the prompt it exits.");
        println!();

        let mut lines = input::spawn_reader();
        loop {
            prompt();
            let line = tokio::select! {
                line = lines.recv() => match line {
                    Some(line) => line,
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            };
            if line.is_empty() {
                continue;
            }

            if let Some(parsed) = SlashCommand::parse(&line) {
                let flow = match parsed {
                    Ok(command) => self.command(command).await,
                    Err(message) => {
                        eprintln!("  {message}");
                        Flow::Continue
                    }
                };
                match flow {
                    Flow::Continue => continue,
                    Flow::Quit => break,
                }
            }

            if let Err(e) = self.turn(&line).await
                && let Some(message) = self.reporter.turn_failure(&e)
            {
                eprintln!("  {message}");
            }
            println!();
        }

        println!();
        println!("  Goodbye!");
    }

    /// Run one turn; Ctrl-C cancels it. Tool calls already running finish.
    async fn turn(&self, input: &str) -> Result<String, AgentError> {
        let cancel = CancellationToken::new();
        let turn = self.agent.run_turn(input, &cancel);
        tokio::pin!(turn);

        loop {
            tokio::select! {
                result = &mut turn => return result,
                _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                    eprintln!();
                    eprintln!("  Cancelling...");
                    cancel.cancel();
                }
            }
        }
    }

    async fn command(&mut self, command: SlashCommand) -> Flow {
        match command {
            SlashCommand::Help => println!("{HELP}"),
            SlashCommand::Model(None) => self.list_models(),
            SlashCommand::Model(Some(spec)) => match self.switch_model(&spec) {
                Ok(selection) => println!("  Switched to {selection}"),
                Err(e) => eprintln!("  {e}"),
            },
            SlashCommand::Context { full } => self.show_context(full).await,
            SlashCommand::Prune(target) => self.prune(target),
            SlashCommand::Clear => self.clear().await,
            SlashCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn list_models(&self) {
        println!("  Current: {}", self.config.model);
        for (index, provider) in self.registry.providers() {
            println!("  {} ({})", provider.name, provider.id);
            for model in self.registry.models_for(index) {
                let current = provider.id == self.config.model.provider && model.id == self.config.model.model;
                let marker = if current { "*" } else { " " };
                println!("   {marker} {}:{}  {}", provider.id, model.id, model.name);
            }
        }
    }

    fn switch_model(&mut self, spec: &str) -> Result<SelectedModel, Box<dyn std::error::Error>> {
        let selection = SelectedModel::parse(spec)?;
        let resolved = self.registry.resolve_selected(&selection)?;
        let provider = parrot_providers::build_provider(&resolved)?;
        self.agent.set_model(provider, ModelSettings::from(&resolved));

        self.config.model = selection.clone();
        if let Err(e) = self.config.save() {
            eprintln!("  {}", self.reporter.system_failure("Saving model selection", &e));
        }
        Ok(selection)
    }

    async fn show_context(&self, full: bool) {
        let session = self.agent.session().read().await;
        println!("  {}", session.context.usage());
        println!("  Messages: {} active", session.messages.active().count());

        let files = session.context.files();
        println!("  Files ({}):", files.len());
        for file in files {
            match (file.is_ranged(), file.end_line) {
                (false, _) => println!("    {}", file.path.display()),
                (true, Some(end)) => println!("    {} (lines {}-{end})", file.path.display(), file.start_line),
                (true, None) => println!("    {} (from line {})", file.path.display(), file.start_line),
            }
        }
        let directories = session.context.directories();
        println!("  Directories ({}):", directories.len());
        for directory in directories {
            println!("    {}", directory.path.display());
        }

        if full {
            println!();
            println!("{}", session.context.serialize_files());
            println!();
            println!("{}", session.context.serialize_directories());
        }
    }

    /// Prune in the background; the report is printed when it finishes.
    fn prune(&self, target: Option<usize>) {
        println!("  Pruning context in the background...");
        let handle = Pruner::for_agent(&self.agent).spawn(target, CancellationToken::new());
        let reporter = Arc::clone(&self.reporter);
        tokio::spawn(async move {
            match handle.await {
                Ok(Ok(report)) => eprintln!("\n  {report}"),
                Ok(Err(e)) => eprintln!("\n  {}", reporter.system_failure("Pruning", &e)),
                Err(e) => eprintln!("\n  {}", reporter.system_failure("Pruning", &e)),
            }
        });
    }

    async fn clear(&self) {
        let mut session = self.agent.session().write().await;
        let cleared = session.messages.clear();
        session.context.clear();
        session.context.track_defaults();
        println!("  Cleared {cleared} messages and reset the live context.");
    }
}

fn prompt() {
    use std::io::Write;
    print!("> ");
    let _ = std::io::stdout().flush();
}
