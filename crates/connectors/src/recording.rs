//! In-memory automation driver that records every operation.
//!
//! Used by `webpilot replay` and by tests. It keeps a small model of a
//! browser: a list of tabs, an active tab, and a per-tab revision counter
//! bumped by anything that would repaint the page. Screenshots are derived
//! from that model, so identical screens produce identical bytes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use webpilot_core::{
    AutomationDriver, DriverError, DriverHandle, DriverSession, Image, ImageFormat, SurfaceInfo,
    SurfaceList,
};

pub const SCREEN_WIDTH: u32 = 1280;
pub const SCREEN_HEIGHT: u32 = 720;

/// One successful driver operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DriverCall {
    Click { x: i64, y: i64 },
    Type { content: String },
    Scroll { x: i64, y: i64, delta_x: i64, delta_y: i64 },
    Navigate { url: String },
    SwitchSurface { index: usize },
}

#[derive(Debug, Clone)]
struct Tab {
    title: String,
    url: String,
    revision: u32,
}

#[derive(Debug, Default)]
struct World {
    tabs: Vec<Tab>,
    active: usize,
    calls: Vec<DriverCall>,
    failures: VecDeque<(Option<&'static str>, DriverError)>,
    sessions_opened: u32,
    sessions_closed: u32,
    shut_down: bool,
}

impl World {
    /// Pop the queued failure if it targets `operation` (or any operation).
    fn take_failure(&mut self, operation: &str) -> Result<(), DriverError> {
        let targeted = matches!(
            self.failures.front(),
            Some((target, _)) if target.is_none_or(|t| t == operation)
        );
        match self.failures.pop_front() {
            Some((_, error)) if targeted => Err(error),
            Some(pending) => {
                self.failures.push_front(pending);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn active_tab(&mut self) -> Result<&mut Tab, DriverError> {
        let active = self.active;
        self.tabs.get_mut(active).ok_or_else(|| DriverError::ActionExecution {
            operation: "active tab".into(),
            reason: "no tab is open".into(),
        })
    }

    fn repaint(&mut self) -> Result<(), DriverError> {
        self.active_tab()?.revision += 1;
        Ok(())
    }
}

/// A scripted, recording [`AutomationDriver`].
#[derive(Clone, Default)]
pub struct RecordingDriver {
    world: Arc<Mutex<World>>,
}

impl RecordingDriver {
    /// A driver with one blank tab.
    pub fn new() -> Self {
        let world = World {
            tabs: vec![Tab {
                title: "about:blank".into(),
                url: "about:blank".into(),
                revision: 0,
            }],
            ..World::default()
        };
        Self {
            world: Arc::new(Mutex::new(world)),
        }
    }

    /// Open an extra tab in the background.
    pub async fn with_tab(self, title: impl Into<String>, url: impl Into<String>) -> Self {
        self.world.lock().await.tabs.push(Tab {
            title: title.into(),
            url: url.into(),
            revision: 0,
        });
        self
    }

    /// A handle around this driver, already launched.
    pub fn handle(&self) -> DriverHandle {
        DriverHandle::from_driver(Arc::new(self.clone()))
    }

    /// Make the next operation (of any kind) fail with `error`.
    pub async fn fail_next(&self, error: DriverError) {
        self.world.lock().await.failures.push_back((None, error));
    }

    /// Make the next call of one operation fail (`"click"`, `"type"`,
    /// `"scroll"`, `"navigate"`, `"screenshot"`, `"surfaces"`,
    /// `"switch_surface"`). Other operations pass until it fires.
    pub async fn fail_next_on(&self, operation: &'static str, error: DriverError) {
        self.world
            .lock()
            .await
            .failures
            .push_back((Some(operation), error));
    }

    pub async fn calls(&self) -> Vec<DriverCall> {
        self.world.lock().await.calls.clone()
    }

    pub async fn opened_sessions(&self) -> u32 {
        self.world.lock().await.sessions_opened
    }

    pub async fn closed_sessions(&self) -> u32 {
        self.world.lock().await.sessions_closed
    }

    pub async fn is_shut_down(&self) -> bool {
        self.world.lock().await.shut_down
    }
}

#[async_trait]
impl AutomationDriver for RecordingDriver {
    fn name(&self) -> &str {
        "recording"
    }

    async fn new_session(&self) -> Result<Arc<dyn DriverSession>, DriverError> {
        let mut world = self.world.lock().await;
        if world.shut_down {
            return Err(DriverError::Unavailable("driver is shut down".into()));
        }
        world.sessions_opened += 1;
        Ok(Arc::new(RecordingSession {
            world: Arc::clone(&self.world),
        }))
    }

    async fn shutdown(&self) -> Result<(), DriverError> {
        self.world.lock().await.shut_down = true;
        Ok(())
    }
}

struct RecordingSession {
    world: Arc<Mutex<World>>,
}

#[async_trait]
impl DriverSession for RecordingSession {
    async fn click(&self, x: i64, y: i64) -> Result<(), DriverError> {
        let mut world = self.world.lock().await;
        world.take_failure("click")?;
        world.repaint()?;
        world.calls.push(DriverCall::Click { x, y });
        Ok(())
    }

    async fn type_text(&self, content: &str) -> Result<(), DriverError> {
        let mut world = self.world.lock().await;
        world.take_failure("type")?;
        world.repaint()?;
        world.calls.push(DriverCall::Type {
            content: content.to_string(),
        });
        Ok(())
    }

    async fn scroll(&self, x: i64, y: i64, delta_x: i64, delta_y: i64) -> Result<(), DriverError> {
        let mut world = self.world.lock().await;
        world.take_failure("scroll")?;
        if delta_x != 0 || delta_y != 0 {
            world.repaint()?;
        }
        world.calls.push(DriverCall::Scroll {
            x,
            y,
            delta_x,
            delta_y,
        });
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let mut world = self.world.lock().await;
        world.take_failure("navigate")?;
        if url.trim().is_empty() {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "empty url".into(),
            });
        }
        let tab = world.active_tab()?;
        tab.url = url.to_string();
        tab.title = url.to_string();
        tab.revision = 0;
        world.calls.push(DriverCall::Navigate {
            url: url.to_string(),
        });
        Ok(())
    }

    async fn screenshot(&self) -> Result<Image, DriverError> {
        let mut world = self.world.lock().await;
        world.take_failure("screenshot")?;
        let tab = world.active_tab()?;
        let frame = format!("{}#{}", tab.url, tab.revision);
        Ok(Image::new(ImageFormat::Png, SCREEN_WIDTH, SCREEN_HEIGHT, frame.into_bytes()))
    }

    async fn surfaces(&self) -> Result<SurfaceList, DriverError> {
        let mut world = self.world.lock().await;
        world.take_failure("surfaces")?;
        Ok(SurfaceList {
            active: world.active,
            surfaces: world
                .tabs
                .iter()
                .map(|tab| SurfaceInfo::new(tab.title.clone(), tab.url.clone()))
                .collect(),
        })
    }

    async fn switch_surface(&self, index: usize) -> Result<(), DriverError> {
        let mut world = self.world.lock().await;
        world.take_failure("switch_surface")?;
        if index >= world.tabs.len() {
            return Err(DriverError::ActionExecution {
                operation: "switch surface".into(),
                reason: format!("no surface at index {index} ({} open)", world.tabs.len()),
            });
        }
        world.active = index;
        world.calls.push(DriverCall::SwitchSurface { index });
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.world.lock().await.sessions_closed += 1;
        Ok(())
    }
}
