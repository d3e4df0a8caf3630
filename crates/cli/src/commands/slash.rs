//! Slash command parsing.

pub const HELP: &str = "\
Commands:
  /help                     Show this help
  /model                    List configured models
  /model <provider:model>   Switch model and remember the choice
  /context                  Show live context usage and entries
  /context full             Also print the serialized live context
  /prune [target_chars]     Shrink messages and live context in the background
  /clear                    Delete all messages and reset the live context
  /quit                     Exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Model(Option<String>),
    Context { full: bool },
    Prune(Option<usize>),
    Clear,
    Quit,
}

impl SlashCommand {
    /// `None` when `line` is not a command at all.
    pub fn parse(line: &str) -> Option<Result<Self, String>> {
        let line = line.trim();
        if !line.starts_with('/') {
            return None;
        }

        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or("/");
        let arg = words.next();
        if let Some(extra) = words.next() {
            return Some(Err(format!("Unexpected argument for {name}: {extra}")));
        }

        let command = match (name, arg) {
            ("/help", None) => Ok(Self::Help),
            ("/model", arg) => Ok(Self::Model(arg.map(str::to_string))),
            ("/context", None) => Ok(Self::Context { full: false }),
            ("/context", Some("full")) => Ok(Self::Context { full: true }),
            ("/prune", None) => Ok(Self::Prune(None)),
            ("/prune", Some(raw)) => raw
                .parse()
                .map(|target| Self::Prune(Some(target)))
                .map_err(|_| format!("Invalid target size: {raw}")),
            ("/clear", None) => Ok(Self::Clear),
            ("/quit" | "/exit", None) => Ok(Self::Quit),
            ("/help" | "/context" | "/clear" | "/quit" | "/exit", Some(extra)) => {
                Err(format!("Unexpected argument for {name}: {extra}"))
            }
            _ => Err(format!("Unknown command: {name}. Type /help for available commands.")),
        };
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_not_a_command() {
        assert!(SlashCommand::parse("fix the tests").is_none());
        assert!(SlashCommand::parse("  explain /usr/bin").is_none());
    }

    #[test]
    fn parses_known_commands() {
        assert_eq!(SlashCommand::parse("/help"), Some(Ok(SlashCommand::Help)));
        assert_eq!(SlashCommand::parse("/model"), Some(Ok(SlashCommand::Model(None))));
        assert_eq!(
            SlashCommand::parse("/model openai:gpt-4o"),
            Some(Ok(SlashCommand::Model(Some("openai:gpt-4o".into()))))
        );
        assert_eq!(
            SlashCommand::parse("/context full"),
            Some(Ok(SlashCommand::Context { full: true }))
        );
        assert_eq!(SlashCommand::parse("/prune 5000"), Some(Ok(SlashCommand::Prune(Some(5000)))));
        assert_eq!(SlashCommand::parse("/prune"), Some(Ok(SlashCommand::Prune(None))));
        assert_eq!(SlashCommand::parse(" /clear "), Some(Ok(SlashCommand::Clear)));
        assert_eq!(SlashCommand::parse("/exit"), Some(Ok(SlashCommand::Quit)));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(SlashCommand::parse("/prune lots"), Some(Err(e)) if e.contains("lots")));
        assert!(matches!(SlashCommand::parse("/frobnicate"), Some(Err(e)) if e.starts_with("Unknown command")));
        assert!(matches!(SlashCommand::parse("/clear now"), Some(Err(_))));
        assert!(matches!(SlashCommand::parse("/context full please"), Some(Err(_))));
    }
}
