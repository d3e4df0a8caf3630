//! The interactive session and its slash commands.

pub mod agent;
pub mod slash;
