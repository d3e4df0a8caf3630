//! The agent loop: the heart of parrot.
//!
//! Every turn follows the same cycle:
//!
//! 1. **Receive** a user message and append it to the log
//! 2. **Build the prompt** fresh from the environment and the live context
//! 3. **Stream** the backend's answer through the [`accumulator`]
//! 4. **If tool calls**: [`consolidate`](consolidate::consolidate) them,
//!    dispatch each in order, append the results, and go back to step 2
//! 5. **If text only**: append the answer and return it
//!
//! A consecutive-failure budget and an optional iteration cap bound the
//! cycle. The [`pruner`] runs the same machinery in the background with a
//! restricted tool set to shrink the context.

pub mod accumulator;
pub mod consolidate;
pub mod event;
pub mod loop_runner;
pub mod prompt;
pub mod pruner;
pub mod session_log;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use accumulator::{AccumulatedResponse, StreamAccumulator};
pub use consolidate::consolidate;
pub use event::{AgentEvent, EventSink, NullSink, RecordingSink};
pub use loop_runner::{AgentLoop, LoopState, ModelSettings};
pub use pruner::{PruneReport, Pruner};
pub use session_log::SessionLog;
