//! Built-in connectors for webpilot.
//!
//! Connectors give the agent something to act on: the task connector
//! contributes the actions that end a task, the web connector drives a
//! browser session, and the desktop connector drives a whole screen.
//! The recording driver stands in for a real automation backend.

pub mod desktop;
pub mod pointer;
pub mod recording;
pub mod screen;
pub mod session;
pub mod task;
pub mod web;

pub use desktop::{DesktopConnector, DesktopOptions};
pub use recording::{DriverCall, RecordingDriver};
pub use screen::ScreenTransform;
pub use session::SessionSlot;
pub use task::{TASK_DONE, TASK_FAIL, TaskConnector};
pub use web::{WebConnector, WebOptions};
