//! `webpilot replay` - Run an agent on a decision script with the in-memory driver.

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use webpilot_agent::{Agent, AgentOutcome, ScriptedProvider, spawn_narrator};
use webpilot_connectors::RecordingDriver;
use webpilot_core::{EventBus, StepOptions};

use crate::stack;

/// What the replayed task sees: its description, open tabs and test data.
pub struct Inputs<'a> {
    pub task: &'a str,
    pub tabs: &'a [String],
    pub data: &'a [String],
}

pub async fn run(
    config: Option<&Path>,
    script: &Path,
    inputs: Inputs<'_>,
    memory_out: Option<&Path>,
) -> anyhow::Result<()> {
    let config = stack::load_config(config)?;

    let script_json = std::fs::read_to_string(script)
        .with_context(|| format!("Failed to read decision script {}", script.display()))?;
    let provider = Arc::new(ScriptedProvider::from_json(&script_json)?);

    let mut options = StepOptions::default();
    if !inputs.data.is_empty() {
        let fields = inputs
            .data
            .iter()
            .map(|arg| stack::parse_data(arg))
            .collect::<anyhow::Result<Vec<_>>>()?;
        options = StepOptions::with_fields(fields);
    }

    let mut driver = RecordingDriver::new();
    for tab in inputs.tabs {
        let (title, url) = stack::parse_tab(tab)?;
        driver = driver.with_tab(title, url).await;
    }
    let handle = Arc::new(driver.handle());

    let events = Arc::new(EventBus::new(config.agent.event_capacity));
    let narrator = spawn_narrator(&events);

    let mut agent = Agent::new(provider)
        .with_options(stack::agent_options(&config))
        .with_event_bus(events)
        .with_connectors(stack::connectors(&config, Arc::clone(&handle))?);

    // Ctrl-C ends the run at the next step boundary.
    let cancel = agent.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            cancel.cancel();
        }
    });

    let outcome = agent.run_with(inputs.task, options).await;
    interrupt.abort();

    if let Err(error) = handle.shutdown().await {
        warn!(error = %error, "Driver did not shut down cleanly");
    }
    if let Some(path) = memory_out {
        agent.memory().save(path)?;
        info!(path = %path.display(), entries = agent.memory().len(), "Memory saved");
    }

    // Dropping the agent closes the event bus, which lets the narrator finish.
    drop(agent);
    if let Err(error) = narrator.await {
        warn!(error = %error, "Narrator task failed");
    }

    let outcome = outcome?;
    let report = serde_json::json!({
        "outcome": outcome,
        "driver_calls": driver.calls().await,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let AgentOutcome::Failed(failure) = &outcome {
        anyhow::bail!("Task failed ({}): {}", failure.variant, failure.message);
    }
    Ok(())
}
