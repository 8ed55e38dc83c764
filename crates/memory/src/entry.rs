//! Memory entries: the closed set of things the agent remembers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use webpilot_core::{Action, AgentState, Observation};

/// One historical record. Entries are immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryEntry {
    /// The state the agent saw when it started.
    Baseline {
        timestamp: DateTime<Utc>,
        state: AgentState,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        observations: Vec<Observation>,
    },

    Thought {
        timestamp: DateTime<Utc>,
        message: String,
    },

    Turn {
        timestamp: DateTime<Utc>,
        #[serde(flatten)]
        turn: Turn,
    },
}

impl MemoryEntry {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Baseline { timestamp, .. }
            | Self::Thought { timestamp, .. }
            | Self::Turn { timestamp, .. } => *timestamp,
        }
    }

    pub fn is_thought(&self) -> bool {
        matches!(self, Self::Thought { .. })
    }

    /// Observations attached to this entry, in recorded order.
    pub fn observations(&self) -> &[Observation] {
        match self {
            Self::Baseline { observations, .. } => observations,
            Self::Turn { turn, .. } => &turn.observations,
            Self::Thought { .. } => &[],
        }
    }
}

/// One completed action plus what the agent saw afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub action: Action,

    /// Human-readable rendering of the action
    pub description: String,

    #[serde(default)]
    pub observations: Vec<Observation>,

    /// Post-action state
    #[serde(default)]
    pub state: AgentState,
}

impl Turn {
    pub fn new(action: Action, description: impl Into<String>) -> Self {
        Self {
            action,
            description: description.into(),
            observations: Vec::new(),
            state: AgentState::new(),
        }
    }

    pub fn with_observations(mut self, observations: Vec<Observation>) -> Self {
        self.observations = observations;
        self
    }

    pub fn with_state(mut self, state: AgentState) -> Self {
        self.state = state;
        self
    }
}
