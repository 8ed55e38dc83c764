//! `webpilot actions` - Print the merged action space.

use std::path::Path;
use std::sync::Arc;
use webpilot_agent::merge_action_space;
use webpilot_connectors::{RecordingDriver, TaskConnector};
use webpilot_core::Connector;

use crate::stack;

pub async fn run(config: Option<&Path>) -> anyhow::Result<()> {
    let config = stack::load_config(config)?;

    // Building connectors never touches the driver, so the in-memory one will do.
    let driver = Arc::new(RecordingDriver::new().handle());
    let mut connectors: Vec<Arc<dyn Connector>> = vec![Arc::new(TaskConnector::new()?)];
    connectors.extend(stack::connectors(&config, driver)?);

    let registry = merge_action_space(&connectors)?;
    println!("{}", serde_json::to_string_pretty(&registry.specs())?);
    Ok(())
}
