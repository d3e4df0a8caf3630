//! # Parrot Core
//!
//! Domain types, traits, and error definitions for the parrot coding agent.
//! Nothing here touches the network or spawns processes; this is the model
//! every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates:
//! - [`Provider`] is implemented by `parrot-providers`
//! - [`ContextStore`] is implemented by `parrot-context`
//! - [`Tool`] is implemented by `parrot-tools`
//!
//! The message log and the live context are shared between the agent loop
//! and background tasks through a single [`SharedSession`] lock.

pub mod context;
pub mod diagnostics;
pub mod error;
pub mod message;
pub mod paths;
pub mod provider;
pub mod schema;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use context::{ContextStore, ContextUsage, DirectoryEntry, FileEntry};
pub use diagnostics::ErrorReporter;
pub use error::{AgentError, ContextError, Error, ProviderError, Result, ToolError};
pub use message::{Message, MessageJournal, MessageLog, MessageStatus, Role, ToolCall};
pub use provider::{FragmentStream, Provider, ProviderRequest, StreamFragment, ToolDefinition};
pub use session::{Session, SharedSession};
pub use tool::{Tool, ToolContext, ToolOutput, ToolRegistry};
