//! Pointer and keyboard actions shared by the web and desktop connectors.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use webpilot_core::{
    ActionContext, ActionDefinition, ActionOutcome, ActionResolver, ConfigurationError, Result,
};

use crate::session::SessionSlot;

fn coordinates() -> serde_json::Value {
    serde_json::json!({
        "x": { "type": "number", "description": "Horizontal position" },
        "y": { "type": "number", "description": "Vertical position" }
    })
}

/// `<prefix>:click {x, y}`
pub fn click(
    prefix: &str,
    description: &str,
    slot: &Arc<SessionSlot>,
) -> std::result::Result<ActionDefinition, ConfigurationError> {
    Ok(ActionDefinition::new(
        format!("{prefix}:click"),
        description,
        serde_json::json!({
            "type": "object",
            "properties": coordinates(),
            "required": ["x", "y"]
        }),
        Arc::new(Click(slot.clone())),
    )?
    .with_renderer(|input| format!("Click at ({}, {})", input["x"], input["y"])))
}

/// `<prefix>:type {content}`
pub fn type_text(
    prefix: &str,
    description: &str,
    slot: &Arc<SessionSlot>,
) -> std::result::Result<ActionDefinition, ConfigurationError> {
    Ok(ActionDefinition::new(
        format!("{prefix}:type"),
        description,
        serde_json::json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "Text to type; <enter> and <tab> press those keys"
                }
            },
            "required": ["content"]
        }),
        Arc::new(TypeText(slot.clone())),
    )?
    .with_renderer(|input| format!("Type {}", input["content"])))
}

/// `<prefix>:scroll {x, y, deltaX, deltaY}`
pub fn scroll(
    prefix: &str,
    description: &str,
    slot: &Arc<SessionSlot>,
) -> std::result::Result<ActionDefinition, ConfigurationError> {
    let mut properties = coordinates();
    properties["deltaX"] =
        serde_json::json!({ "type": "number", "description": "Distance to scroll horizontally" });
    properties["deltaY"] =
        serde_json::json!({ "type": "number", "description": "Distance to scroll vertically" });

    Ok(ActionDefinition::new(
        format!("{prefix}:scroll"),
        description,
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": ["x", "y", "deltaX", "deltaY"]
        }),
        Arc::new(Scroll(slot.clone())),
    )?
    .with_renderer(|input| {
        format!(
            "Scroll by ({}, {}) at ({}, {})",
            input["deltaX"], input["deltaY"], input["x"], input["y"]
        )
    }))
}

// Positions arrive in the model's coordinate space and may be fractional;
// the slot's screen transform maps and rounds them.
#[derive(Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrollInput {
    x: f64,
    y: f64,
    delta_x: f64,
    delta_y: f64,
}

#[derive(Deserialize)]
struct TypeInput {
    content: String,
}

struct Click(Arc<SessionSlot>);

#[async_trait]
impl ActionResolver for Click {
    async fn resolve(&self, input: serde_json::Value, ctx: ActionContext) -> Result<ActionOutcome> {
        let Point { x, y } = ctx.parse_input(input)?;
        let (x, y) = self.0.to_real(x, y).await?;
        self.0.run("click", |s| async move { s.click(x, y).await }).await?;
        Ok(ActionOutcome::proceed())
    }
}

struct TypeText(Arc<SessionSlot>);

#[async_trait]
impl ActionResolver for TypeText {
    async fn resolve(&self, input: serde_json::Value, ctx: ActionContext) -> Result<ActionOutcome> {
        let TypeInput { content } = ctx.parse_input(input)?;
        let content = content.as_str();
        self.0.run("type", |s| async move { s.type_text(content).await }).await?;
        Ok(ActionOutcome::proceed())
    }
}

struct Scroll(Arc<SessionSlot>);

#[async_trait]
impl ActionResolver for Scroll {
    async fn resolve(&self, input: serde_json::Value, ctx: ActionContext) -> Result<ActionOutcome> {
        let ScrollInput {
            x,
            y,
            delta_x,
            delta_y,
        } = ctx.parse_input(input)?;
        let (x, y) = self.0.to_real(x, y).await?;
        let (delta_x, delta_y) = self.0.to_real(delta_x, delta_y).await?;
        self.0
            .run("scroll", |s| async move { s.scroll(x, y, delta_x, delta_y).await })
            .await?;
        Ok(ActionOutcome::proceed())
    }
}
