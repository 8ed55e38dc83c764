//! Web connector: browser actions and screen state over a driver session.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use webpilot_core::{
    ActionContext, ActionDefinition, ActionOutcome, ActionResolver, AgentState, ConfigurationError,
    Connector, DriverHandle, Renderable, Result, RetryPolicy, SurfaceList,
};

use crate::pointer;
use crate::session::SessionSlot;

pub const SCREENSHOT_FACET: &str = "web.screenshot";
pub const TABS_FACET: &str = "web.tabs";

#[derive(Debug, Clone, Default)]
pub struct WebOptions {
    /// Page opened when the connector starts
    pub start_url: Option<String>,

    /// Coordinate grid the model works on, mapped onto the real screen
    pub virtual_screen: Option<(u32, u32)>,

    /// Policy for retrying transient driver failures
    pub retry: RetryPolicy,
}

/// Drives one browser session.
///
/// The screen is reported as two facets of [`AgentState`]: the screenshot
/// and the tab list. Memory compares each against its own previous value.
pub struct WebConnector {
    slot: Arc<SessionSlot>,
    options: WebOptions,
    actions: Vec<ActionDefinition>,
}

impl WebConnector {
    pub const ID: &'static str = "web";

    pub fn new(
        driver: Arc<DriverHandle>,
        options: WebOptions,
    ) -> std::result::Result<Self, ConfigurationError> {
        let slot = Arc::new(
            SessionSlot::new(Self::ID, driver, options.retry.clone())
                .with_virtual_screen(options.virtual_screen),
        );
        let actions = web_actions(&slot)?;
        Ok(Self {
            slot,
            options,
            actions,
        })
    }

    async fn tabs(&self) -> Result<SurfaceList> {
        Ok(self.slot.run("list tabs", |s| async move { s.surfaces().await }).await?)
    }
}

/// `Open Tabs:` followed by one line per tab, the focused one marked.
pub fn render_tabs(tabs: &SurfaceList) -> String {
    let mut text = String::from("Open Tabs:\n");
    for (index, tab) in tabs.surfaces.iter().enumerate() {
        if index == tabs.active {
            text.push_str("[ACTIVE] ");
        }
        text.push_str(&format!("{} ({})\n", tab.title, tab.url));
    }
    text
}

fn web_actions(
    slot: &Arc<SessionSlot>,
) -> std::result::Result<Vec<ActionDefinition>, ConfigurationError> {
    Ok(vec![
        pointer::click("browser", "Click at a point on the page", slot)?,
        pointer::type_text("browser", "Type into the focused element", slot)?,
        pointer::scroll("browser", "Hover over a point and scroll", slot)?,
        ActionDefinition::new(
            "browser:nav",
            "Navigate the current tab to a URL",
            serde_json::json!({
                "type": "object",
                "properties": { "url": { "type": "string", "minLength": 1 } },
                "required": ["url"]
            }),
            Arc::new(Navigate(slot.clone())),
        )?
        .with_renderer(|input| {
            format!("Navigate to {}", input["url"].as_str().unwrap_or_default())
        }),
        ActionDefinition::new(
            "browser:tab:switch",
            "Switch to another open tab",
            serde_json::json!({
                "type": "object",
                "properties": { "index": { "type": "integer", "minimum": 0 } },
                "required": ["index"]
            }),
            Arc::new(SwitchTab(slot.clone())),
        )?
        .with_renderer(|input| format!("Switch to tab {}", input["index"])),
    ])
}

#[derive(Deserialize)]
struct NavInput {
    url: String,
}

#[derive(Deserialize)]
struct TabInput {
    index: usize,
}

struct Navigate(Arc<SessionSlot>);

#[async_trait]
impl ActionResolver for Navigate {
    async fn resolve(&self, input: serde_json::Value, ctx: ActionContext) -> Result<ActionOutcome> {
        let NavInput { url } = ctx.parse_input(input)?;
        let url = url.as_str();
        self.0.run("navigate", |s| async move { s.navigate(url).await }).await?;
        Ok(ActionOutcome::proceed())
    }
}

struct SwitchTab(Arc<SessionSlot>);

#[async_trait]
impl ActionResolver for SwitchTab {
    async fn resolve(&self, input: serde_json::Value, ctx: ActionContext) -> Result<ActionOutcome> {
        let TabInput { index } = ctx.parse_input(input)?;
        self.0
            .run("switch tab", |s| async move { s.switch_surface(index).await })
            .await?;
        Ok(ActionOutcome::proceed())
    }
}

#[async_trait]
impl Connector for WebConnector {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn on_start(&self) -> Result<()> {
        self.slot.open().await?;
        if let Some(url) = self.options.start_url.as_deref() {
            self.slot.run("navigate", |s| async move { s.navigate(url).await }).await?;
        }
        info!(start_url = ?self.options.start_url, "Web connector started");
        Ok(())
    }

    async fn on_stop(&self) -> Result<()> {
        self.slot.close().await?;
        info!("Web connector stopped");
        Ok(())
    }

    fn action_space(&self) -> Vec<ActionDefinition> {
        self.actions.clone()
    }

    async fn capture_state(&self) -> Result<AgentState> {
        let screenshot = self.slot.screenshot().await?;
        let tabs = self.tabs().await?;
        Ok(AgentState::new()
            .with_image(SCREENSHOT_FACET, screenshot)
            .with_text(TABS_FACET, render_tabs(&tabs)))
    }

    async fn render_current_state(&self) -> Result<Vec<Renderable>> {
        let tabs = self.tabs().await?;
        Ok(vec![Renderable::text(render_tabs(&tabs))])
    }

    fn instructions(&self) -> Option<String> {
        self.slot.screen().instructions()
    }
}
