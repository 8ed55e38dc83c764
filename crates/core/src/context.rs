//! The rendered form of agent memory handed to the completion provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::observation::Renderable;

/// Timestamp label used in rendered history (`HH:MM:SS`, UTC).
pub fn time_label(at: &DateTime<Utc>) -> String {
    at.format("%H:%M:%S").to_string()
}

/// One rendered history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: HistoryKind,
}

impl HistoryItem {
    pub fn label(&self) -> String {
        time_label(&self.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum HistoryKind {
    /// The state the agent woke up to
    Baseline { content: Vec<Renderable> },

    Thought { message: String },

    Turn {
        /// The action, described for a human
        action: String,
        content: Vec<Renderable>,
    },
}

/// What one connector shows of its surface right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorSnapshot {
    pub connector_id: String,
    pub elements: Vec<Renderable>,
}

/// Everything the provider needs to pick the next action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryContext {
    pub history: Vec<HistoryItem>,
    pub current_timestamp: String,
    pub connector_states: Vec<ConnectorSnapshot>,
}

impl MemoryContext {
    /// Number of images across history and snapshots.
    pub fn image_count(&self) -> usize {
        let in_history = self.history.iter().map(|item| match &item.kind {
            HistoryKind::Baseline { content } | HistoryKind::Turn { content, .. } => {
                content.iter().filter(|r| r.is_image()).count()
            }
            HistoryKind::Thought { .. } => 0,
        });
        let in_snapshots = self
            .connector_states
            .iter()
            .map(|s| s.elements.iter().filter(|r| r.is_image()).count());
        in_history.chain(in_snapshots).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn time_label_is_clock_time() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 14, 5, 9).unwrap();
        assert_eq!(time_label(&at), "14:05:09");
    }

    #[test]
    fn history_items_serialize_flat() {
        let item = HistoryItem {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            kind: HistoryKind::Thought {
                message: "Scroll down to find the footer".into(),
            },
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["variant"], "thought");
        assert_eq!(json["message"], "Scroll down to find the footer");
    }
}
