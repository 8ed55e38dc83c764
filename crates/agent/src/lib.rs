//! # webpilot agent
//!
//! The orchestrator. An [`Agent`] owns a set of connectors, their merged
//! action space and a memory, and runs the observe, decide, act cycle
//! against a completion provider until the task completes or fails.
//!
//! ```text
//! Idle ─start─▶ Started ─act─▶ Deciding ⇄ Acting ─▶ Completed | Failed
//!                         (any state) ─stop─▶ Stopped
//! ```

pub mod agent;
pub mod narrator;
pub mod outcome;
pub mod scripted;

#[cfg(test)]
mod test_helpers;

pub use agent::{Agent, AgentOptions, DEFAULT_MAX_STEPS, merge_action_space};
pub use narrator::spawn_narrator;
pub use outcome::{AgentOutcome, AgentStatus, FailureRecord};
pub use scripted::ScriptedProvider;
