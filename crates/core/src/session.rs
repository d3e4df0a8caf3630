//! Shared conversation state.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::context::ContextStore;
use crate::message::MessageLog;

/// Everything the agent loop and background tasks mutate.
///
/// Both halves live behind one lock: readers (status commands, prompt
/// building) share it, writers (appends, deletes, context changes) exclude
/// everyone else.
pub struct Session {
    pub messages: MessageLog,
    pub context: Box<dyn ContextStore>,
}

pub type SharedSession = Arc<RwLock<Session>>;

impl Session {
    pub fn new(messages: MessageLog, context: impl ContextStore + 'static) -> Self {
        Self {
            messages,
            context: Box::new(context),
        }
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(RwLock::new(self))
    }

    /// Active message bytes plus the serialized live context.
    pub fn character_count(&self) -> usize {
        self.messages.character_count()
            + self.context.serialize_files().len()
            + self.context.serialize_directories().len()
    }
}
