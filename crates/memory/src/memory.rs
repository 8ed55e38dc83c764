//! Append-only agent memory and context building.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use webpilot_core::{
    AgentState, Connector, ConnectorSnapshot, HistoryItem, HistoryKind, MemoryContext,
    MemoryError, Observation, Renderable, Result, time_label,
};

use crate::entry::{MemoryEntry, Turn};
use crate::masking::{keep_last, mask_observations};

/// Thoughts older than this many are left out of rendered context.
pub const DEFAULT_THOUGHT_LIMIT: usize = 20;

/// Chronological log of one agent's thoughts and turns.
///
/// Entries are appended in the order they complete and never removed.
/// Rendering may hide some of them (thought limit, observation retention,
/// unchanged heavyweight facets) but the log itself stays whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMemory {
    #[serde(default = "default_thought_limit")]
    thought_limit: usize,
    entries: Vec<MemoryEntry>,
}

fn default_thought_limit() -> usize {
    DEFAULT_THOUGHT_LIMIT
}

impl Default for AgentMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMemory {
    pub fn new() -> Self {
        Self {
            thought_limit: DEFAULT_THOUGHT_LIMIT,
            entries: Vec::new(),
        }
    }

    pub fn with_thought_limit(mut self, limit: usize) -> Self {
        self.thought_limit = limit;
        self
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record the state the agent woke up to.
    pub fn inscribe_initial_state(
        &mut self,
        state: AgentState,
        observations: Vec<Observation>,
        at: Option<DateTime<Utc>>,
    ) {
        let timestamp = self.next_timestamp(at);
        self.entries.push(MemoryEntry::Baseline {
            timestamp,
            state,
            observations,
        });
    }

    pub fn record_thought(&mut self, message: impl Into<String>, at: Option<DateTime<Utc>>) {
        let timestamp = self.next_timestamp(at);
        let message = message.into();
        debug!(chars = message.len(), "Recording thought");
        self.entries.push(MemoryEntry::Thought { timestamp, message });
    }

    pub fn record_turn(&mut self, turn: Turn, at: Option<DateTime<Utc>>) {
        let timestamp = self.next_timestamp(at);
        debug!(
            action = %turn.action.name,
            observations = turn.observations.len(),
            "Recording turn"
        );
        self.entries.push(MemoryEntry::Turn { timestamp, turn });
    }

    /// The most recent thought, if any was recorded.
    pub fn last_thought_message(&self) -> Option<&str> {
        self.entries.iter().rev().find_map(|entry| match entry {
            MemoryEntry::Thought { message, .. } => Some(message.as_str()),
            _ => None,
        })
    }

    /// Insertion order is chronological order. A caller-supplied timestamp
    /// older than the last entry is raised to it.
    fn next_timestamp(&self, at: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let requested = at.unwrap_or_else(Utc::now);
        match self.entries.last().map(MemoryEntry::timestamp) {
            Some(last) if requested < last => {
                warn!(%requested, %last, "Timestamp precedes last entry, clamping");
                last
            }
            _ => requested,
        }
    }

    /// Render the log into the context handed to the next decision.
    ///
    /// One linear pass. A facet is rendered only when it differs from the
    /// last rendered value of that same facet; the turn description is
    /// always kept. Observations go through retention masking, and only
    /// the most recent `thought_limit` thoughts are shown.
    pub async fn build_context(&self, connectors: &[Arc<dyn Connector>]) -> Result<MemoryContext> {
        let history = self.render_history();

        let mut connector_states = Vec::new();
        for connector in connectors {
            let elements = connector.render_current_state().await?;
            if !elements.is_empty() {
                connector_states.push(ConnectorSnapshot {
                    connector_id: connector.id().to_string(),
                    elements,
                });
            }
        }

        Ok(MemoryContext {
            history,
            current_timestamp: time_label(&Utc::now()),
            connector_states,
        })
    }

    fn render_history(&self) -> Vec<HistoryItem> {
        let observations: Vec<&Observation> = self
            .entries
            .iter()
            .flat_map(|entry| entry.observations().iter())
            .collect();
        let observation_mask = mask_observations(&observations);
        let thought_mask = keep_last(&self.entries, self.thought_limit, MemoryEntry::is_thought);

        let mut rendered_state = AgentState::new();
        let mut obs_cursor = 0;
        let mut history = Vec::with_capacity(self.entries.len());

        for (entry, thought_visible) in self.entries.iter().zip(thought_mask) {
            let mut visible_observations = |count: usize| -> Vec<Renderable> {
                let start = obs_cursor;
                obs_cursor += count;
                observations[start..obs_cursor]
                    .iter()
                    .zip(&observation_mask[start..obs_cursor])
                    .filter(|(_, visible)| **visible)
                    .flat_map(|(obs, _)| obs.render())
                    .collect()
            };

            let kind = match entry {
                MemoryEntry::Baseline {
                    state,
                    observations: recorded,
                    ..
                } => {
                    let mut content = changed_facets(state, &mut rendered_state);
                    content.extend(visible_observations(recorded.len()));
                    HistoryKind::Baseline { content }
                }
                MemoryEntry::Thought { message, .. } => {
                    if !thought_visible {
                        continue;
                    }
                    HistoryKind::Thought {
                        message: message.clone(),
                    }
                }
                MemoryEntry::Turn { turn, .. } => {
                    let mut content = changed_facets(&turn.state, &mut rendered_state);
                    content.extend(visible_observations(turn.observations.len()));
                    HistoryKind::Turn {
                        action: turn.description.clone(),
                        content,
                    }
                }
            };

            history.push(HistoryItem {
                timestamp: entry.timestamp(),
                kind,
            });
        }

        history
    }

    /// Serialize the whole log (entries and settings) to JSON.
    pub fn to_json(&self) -> std::result::Result<String, MemoryError> {
        serde_json::to_string_pretty(self).map_err(|e| MemoryError::Snapshot(e.to_string()))
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, MemoryError> {
        serde_json::from_str(json).map_err(|e| MemoryError::Snapshot(e.to_string()))
    }

    /// Write a snapshot to disk, creating parent directories.
    pub fn save(&self, path: &Path) -> std::result::Result<(), MemoryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create snapshot directory: {e}"))
            })?;
        }
        std::fs::write(path, self.to_json()?)
            .map_err(|e| MemoryError::Storage(format!("Failed to write snapshot: {e}")))?;
        debug!(path = %path.display(), entries = self.entries.len(), "Memory snapshot saved");
        Ok(())
    }

    pub fn load(path: &Path) -> std::result::Result<Self, MemoryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MemoryError::Storage(format!("Failed to read snapshot: {e}")))?;
        Self::from_json(&content)
    }
}

/// Render facets of `state` that differ from what was last rendered, and
/// remember them as rendered.
fn changed_facets(state: &AgentState, rendered: &mut AgentState) -> Vec<Renderable> {
    let delta = state.delta(rendered);
    let content = state
        .facets()
        .filter(|(name, _)| delta.changed(name))
        .map(|(_, value)| value.render())
        .collect();
    rendered.merge(state.clone());
    content
}
