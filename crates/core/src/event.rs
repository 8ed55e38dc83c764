//! Lifecycle events: fire-and-forget notifications from the agent loop.
//!
//! The orchestrator publishes; narrators, telemetry and UIs subscribe.
//! Nothing a subscriber does can change how the loop proceeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::action::Action;
use crate::error::FailureVariant;

/// Every transition the agent loop announces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// All connectors are up and the baseline state is recorded
    Started {
        run_id: String,
        connectors: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A task began
    TaskStarted {
        run_id: String,
        task: String,
        timestamp: DateTime<Utc>,
    },

    /// The provider's reasoning was written to memory
    ThoughtRecorded {
        run_id: String,
        thought: String,
        timestamp: DateTime<Utc>,
    },

    /// An action is about to be dispatched
    ActionStarted {
        run_id: String,
        step: u32,
        action: Action,
        description: String,
        timestamp: DateTime<Utc>,
    },

    /// An action resolved and its turn was recorded
    ActionDone {
        run_id: String,
        step: u32,
        action: Action,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The completion action fired
    Completed {
        run_id: String,
        evidence: String,
        steps: u32,
        timestamp: DateTime<Utc>,
    },

    /// A check is being judged
    CheckStarted {
        run_id: String,
        check: String,
        timestamp: DateTime<Utc>,
    },

    /// A check held
    CheckPassed {
        run_id: String,
        check: String,
        timestamp: DateTime<Utc>,
    },

    /// The loop ended in failure, or a check did not hold
    Failed {
        run_id: String,
        variant: FailureVariant,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Every started connector has been stopped
    Stopped {
        run_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl AgentEvent {
    /// Short event name, for log lines and wire framing.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::TaskStarted { .. } => "task_started",
            Self::ThoughtRecorded { .. } => "thought_recorded",
            Self::ActionStarted { .. } => "action_started",
            Self::ActionDone { .. } => "action_done",
            Self::Completed { .. } => "completed",
            Self::CheckStarted { .. } => "check_started",
            Self::CheckPassed { .. } => "check_passed",
            Self::Failed { .. } => "failed",
            Self::Stopped { .. } => "stopped",
        }
    }
}

/// A broadcast-based event bus for lifecycle events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Slow
/// subscribers lag and lose events; the publisher never waits.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
