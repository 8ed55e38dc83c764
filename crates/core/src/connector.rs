//! Connector trait: the abstraction over automation surfaces.
//!
//! A connector contributes part of the action space and knows how to look
//! at its surface. The agent starts every connector before the first cycle
//! and stops each started one exactly once, whatever the outcome.

use async_trait::async_trait;

use crate::action::ActionDefinition;
use crate::error::Result;
use crate::observation::{Observation, Renderable};
use crate::state::AgentState;

#[async_trait]
pub trait Connector: Send + Sync {
    /// Unique id among the agent's connectors (e.g. "web", "desktop").
    fn id(&self) -> &str;

    /// Acquire whatever the surface needs (driver session, initial page).
    async fn on_start(&self) -> Result<()> {
        Ok(())
    }

    /// Release everything acquired in `on_start`.
    async fn on_stop(&self) -> Result<()> {
        Ok(())
    }

    /// Actions this connector contributes to the merged action space.
    fn action_space(&self) -> Vec<ActionDefinition> {
        vec![]
    }

    /// Fresh observations after an action. Zero is a valid answer.
    async fn collect_observations(&self) -> Result<Vec<Observation>> {
        Ok(vec![])
    }

    /// Facets of the current surface, compared turn to turn.
    async fn capture_state(&self) -> Result<AgentState> {
        Ok(AgentState::new())
    }

    /// Lightweight rendering of what the surface shows right now.
    async fn render_current_state(&self) -> Result<Vec<Renderable>> {
        Ok(vec![])
    }

    /// Extra guidance forwarded to the provider with each decision.
    fn instructions(&self) -> Option<String> {
        None
    }
}
