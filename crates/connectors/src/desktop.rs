//! Desktop connector: pointer and keyboard control of a whole screen.
//!
//! Unlike the web connector, the desktop reports what it sees as
//! observations rather than state facets. Screenshots carry a retention
//! policy (deduplicated, last `min_screenshots` kept) and the window list
//! only ever shows its latest copy.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use webpilot_core::{
    ActionContext, ActionDefinition, ActionOutcome, ActionResolver, ConfigurationError, Connector,
    DriverError, DriverHandle, Observation, Result, Retention, RetryPolicy, SurfaceList,
};

use crate::pointer;
use crate::session::SessionSlot;

pub const SCREENSHOT_KIND: &str = "desktop.screenshot";
pub const WINDOWS_KIND: &str = "desktop.windows";
pub const DEFAULT_MIN_SCREENSHOTS: usize = 2;

#[derive(Debug, Clone)]
pub struct DesktopOptions {
    pub min_screenshots: usize,
    pub virtual_screen: Option<(u32, u32)>,
    pub retry: RetryPolicy,
}

impl Default for DesktopOptions {
    fn default() -> Self {
        Self {
            min_screenshots: DEFAULT_MIN_SCREENSHOTS,
            virtual_screen: None,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct DesktopConnector {
    slot: Arc<SessionSlot>,
    options: DesktopOptions,
    actions: Vec<ActionDefinition>,
}

impl DesktopConnector {
    pub const ID: &'static str = "desktop";

    pub fn new(
        driver: Arc<DriverHandle>,
        options: DesktopOptions,
    ) -> std::result::Result<Self, ConfigurationError> {
        let slot = Arc::new(
            SessionSlot::new(Self::ID, driver, options.retry.clone())
                .with_virtual_screen(options.virtual_screen),
        );
        let actions = vec![
            pointer::click("desktop", "Click at a point on the screen", &slot)?,
            pointer::type_text("desktop", "Type with the keyboard", &slot)?,
            pointer::scroll("desktop", "Scroll at a point on the screen", &slot)?,
            ActionDefinition::new(
                "desktop:window:focus",
                "Bring a window to the front by its title",
                serde_json::json!({
                    "type": "object",
                    "properties": { "title": { "type": "string", "minLength": 1 } },
                    "required": ["title"]
                }),
                Arc::new(FocusWindow(slot.clone())),
            )?
            .with_renderer(|input| {
                format!("Focus window {}", input["title"].as_str().unwrap_or_default())
            }),
        ];
        Ok(Self {
            slot,
            options,
            actions,
        })
    }
}

/// `Open Windows:` followed by one line per window, the focused one marked.
pub fn render_windows(windows: &SurfaceList) -> String {
    let mut text = String::from("Open Windows:\n");
    for (index, window) in windows.surfaces.iter().enumerate() {
        if index == windows.active {
            text.push_str("[ACTIVE] ");
        }
        text.push_str(&format!("{} ({})\n", window.title, window.url));
    }
    text
}

#[derive(Deserialize)]
struct FocusInput {
    title: String,
}

struct FocusWindow(Arc<SessionSlot>);

#[async_trait]
impl ActionResolver for FocusWindow {
    async fn resolve(&self, input: serde_json::Value, ctx: ActionContext) -> Result<ActionOutcome> {
        let FocusInput { title } = ctx.parse_input(input)?;
        let windows = self.0.run("list windows", |s| async move { s.surfaces().await }).await?;
        let index = windows
            .surfaces
            .iter()
            .position(|w| w.title == title)
            .ok_or_else(|| DriverError::ActionExecution {
                operation: "focus window".into(),
                reason: format!("no window titled '{title}'"),
            })?;
        self.0
            .run("focus window", |s| async move { s.switch_surface(index).await })
            .await?;
        Ok(ActionOutcome::proceed())
    }
}

#[async_trait]
impl Connector for DesktopConnector {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn on_start(&self) -> Result<()> {
        self.slot.open().await?;
        info!("Desktop connector started");
        Ok(())
    }

    async fn on_stop(&self) -> Result<()> {
        self.slot.close().await?;
        info!("Desktop connector stopped");
        Ok(())
    }

    fn action_space(&self) -> Vec<ActionDefinition> {
        self.actions.clone()
    }

    async fn collect_observations(&self) -> Result<Vec<Observation>> {
        let screenshot = self.slot.screenshot().await?;

        let mut observations = vec![Observation::image(Self::ID, screenshot).with_retention(
            Retention::kind(SCREENSHOT_KIND)
                .limit(self.options.min_screenshots)
                .dedupe(),
        )];

        // The window list is a nicety; a screen without it is still usable.
        match self.slot.run("list windows", |s| async move { s.surfaces().await }).await {
            Ok(windows) => observations.push(
                Observation::text(Self::ID, render_windows(&windows))
                    .with_retention(Retention::kind(WINDOWS_KIND).limit(1)),
            ),
            Err(error) => warn!(error = %error, "Failed to list desktop windows"),
        }

        Ok(observations)
    }

    fn instructions(&self) -> Option<String> {
        self.slot.screen().instructions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DriverCall, RecordingDriver};
    use webpilot_core::{Action, ActionRegistry, Error, Renderable};

    async fn started(driver: &RecordingDriver) -> (DesktopConnector, ActionRegistry) {
        let desktop =
            DesktopConnector::new(Arc::new(driver.handle()), DesktopOptions::default()).unwrap();
        desktop.on_start().await.unwrap();
        let mut registry = ActionRegistry::new();
        for action in desktop.action_space() {
            registry.register(desktop.id(), action).unwrap();
        }
        (desktop, registry)
    }

    #[tokio::test]
    async fn observations_carry_retention() {
        let driver = RecordingDriver::new().with_tab("Terminal", "terminal.app").await;
        let (desktop, _) = started(&driver).await;

        let observations = desktop.collect_observations().await.unwrap();
        assert_eq!(observations.len(), 2);

        let shot = observations[0].retention.as_ref().unwrap();
        assert_eq!(shot.kind, SCREENSHOT_KIND);
        assert_eq!(shot.limit, Some(DEFAULT_MIN_SCREENSHOTS));
        assert!(shot.dedupe);

        let windows = observations[1].retention.as_ref().unwrap();
        assert_eq!((windows.kind.as_str(), windows.limit), (WINDOWS_KIND, Some(1)));
        assert_eq!(
            observations[1].content,
            vec![Renderable::text(
                "Open Windows:\n[ACTIVE] about:blank (about:blank)\nTerminal (terminal.app)\n"
            )]
        );
    }

    #[tokio::test]
    async fn window_list_failure_still_yields_screenshot() {
        let driver = RecordingDriver::new();
        let (desktop, _) = started(&driver).await;
        driver
            .fail_next_on(
                "surfaces",
                DriverError::Unsupported {
                    driver: "recording".into(),
                    operation: "surfaces".into(),
                },
            )
            .await;

        let observations = desktop.collect_observations().await.unwrap();
        assert_eq!(observations.len(), 1);
        assert!(observations[0].content[0].is_image());
    }

    #[tokio::test]
    async fn screenshot_failure_is_an_error() {
        let driver = RecordingDriver::new();
        let (desktop, _) = started(&driver).await;
        driver
            .fail_next_on(
                "screenshot",
                DriverError::Unavailable("display server went away".into()),
            )
            .await;
        assert!(desktop.collect_observations().await.is_err());
    }

    #[tokio::test]
    async fn focus_window_by_title() {
        let driver = RecordingDriver::new().with_tab("Mail", "mail.app").await;
        let (_desktop, registry) = started(&driver).await;

        registry
            .dispatch(
                &Action::new("desktop:window:focus", serde_json::json!({ "title": "Mail" })),
                ActionContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(driver.calls().await, vec![DriverCall::SwitchSurface { index: 1 }]);

        let err = registry
            .dispatch(
                &Action::new("desktop:window:focus", serde_json::json!({ "title": "Calendar" })),
                ActionContext::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Driver(DriverError::ActionExecution { .. })));
    }

    #[tokio::test]
    async fn pointer_actions_are_namespaced() {
        let driver = RecordingDriver::new();
        let (_desktop, registry) = started(&driver).await;
        assert_eq!(
            registry.names(),
            vec!["desktop:click", "desktop:type", "desktop:scroll", "desktop:window:focus"]
        );
        let hello = Action::new("desktop:type", serde_json::json!({ "content": "hello" }));
        registry.dispatch(&hello, ActionContext::default()).await.unwrap();
        assert_eq!(driver.calls().await, vec![DriverCall::Type { content: "hello".into() }]);
    }

    #[tokio::test]
    async fn virtual_clicks_are_scaled_to_the_screen() {
        let driver = RecordingDriver::new();
        let options = DesktopOptions {
            virtual_screen: Some((1920, 1080)),
            ..DesktopOptions::default()
        };
        let desktop = DesktopConnector::new(Arc::new(driver.handle()), options).unwrap();
        desktop.on_start().await.unwrap();
        let mut registry = ActionRegistry::new();
        for action in desktop.action_space() {
            registry.register(desktop.id(), action).unwrap();
        }

        let corner = Action::new("desktop:click", serde_json::json!({ "x": 1920, "y": 1080 }));
        registry.dispatch(&corner, ActionContext::default()).await.unwrap();
        assert_eq!(driver.calls().await, vec![DriverCall::Click { x: 1280, y: 720 }]);
    }
}
