//! Agent state: facet-wise snapshots of the perceivable world.
//!
//! Each connector contributes named facets (`web.screenshot`, `web.tabs`,
//! ...). Two states are compared facet by facet, each facet against its own
//! previous value; that comparison drives delta-state rendering in memory.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::observation::{Image, Renderable};

/// The value of one facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FacetValue {
    Image { image: Image },
    Text { text: String },
}

impl FacetValue {
    /// Whether this facet is expensive to repeat in context.
    pub fn is_heavyweight(&self) -> bool {
        matches!(self, Self::Image { .. })
    }

    pub fn render(&self) -> Renderable {
        match self {
            Self::Image { image } => Renderable::image(image.clone()),
            Self::Text { text } => Renderable::text(text.clone()),
        }
    }
}

/// A snapshot of every facet the active connectors can see.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    facets: BTreeMap<String, FacetValue>,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, facet: impl Into<String>, image: Image) -> Self {
        self.facets.insert(facet.into(), FacetValue::Image { image });
        self
    }

    pub fn with_text(mut self, facet: impl Into<String>, text: impl Into<String>) -> Self {
        self.facets.insert(facet.into(), FacetValue::Text { text: text.into() });
        self
    }

    pub fn get(&self, facet: &str) -> Option<&FacetValue> {
        self.facets.get(facet)
    }

    pub fn facets(&self) -> impl Iterator<Item = (&str, &FacetValue)> {
        self.facets.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    /// Fold another connector's state into this one.
    pub fn merge(&mut self, other: AgentState) {
        self.facets.extend(other.facets);
    }

    /// Facets that differ from `previous` (new facets count as changed).
    pub fn delta(&self, previous: &AgentState) -> DeltaState {
        let changed = self
            .facets
            .iter()
            .filter(|(name, value)| previous.facets.get(*name) != Some(*value))
            .map(|(name, _)| name.clone())
            .collect();
        DeltaState { changed }
    }
}

/// Which facets changed between two consecutive states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaState {
    changed: BTreeSet<String>,
}

impl DeltaState {
    pub fn changed(&self, facet: &str) -> bool {
        self.changed.contains(facet)
    }

    pub fn is_unchanged(&self) -> bool {
        self.changed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ImageFormat;

    fn shot(bytes: &[u8]) -> Image {
        Image::new(ImageFormat::Png, 1280, 720, bytes.to_vec())
    }

    #[test]
    fn delta_compares_each_facet_against_itself() {
        let before = AgentState::new()
            .with_image("web.screenshot", shot(b"page-1"))
            .with_text("web.tabs", "[ACTIVE] Home (https://example.com)");
        let after = AgentState::new()
            .with_image("web.screenshot", shot(b"page-1"))
            .with_text("web.tabs", "[ACTIVE] Login (https://example.com/login)");

        let delta = after.delta(&before);
        assert!(!delta.changed("web.screenshot"));
        assert!(delta.changed("web.tabs"));
    }

    #[test]
    fn new_facets_count_as_changed() {
        let after = AgentState::new().with_image("desktop.screenshot", shot(b"x"));
        let delta = after.delta(&AgentState::new());
        assert!(delta.changed("desktop.screenshot"));
        assert!(!after.delta(&after).changed("desktop.screenshot"));
        assert!(after.delta(&after).is_unchanged());
    }

    #[test]
    fn merge_combines_connectors() {
        let mut state = AgentState::new().with_text("web.tabs", "a");
        state.merge(AgentState::new().with_text("desktop.windows", "b"));
        assert_eq!(state.facets().count(), 2);
        assert!(state.get("desktop.windows").is_some());
    }
}
