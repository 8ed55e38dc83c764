//! Turns lifecycle events into log lines.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webpilot_core::{AgentEvent, EventBus};

/// Subscribe to `bus` and log every event until the bus is dropped.
///
/// The narrator only listens. If it falls behind, skipped events are
/// reported and the stream picks up again.
pub fn spawn_narrator(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => narrate(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Narrator fell behind, events were dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn narrate(event: &AgentEvent) {
    match event {
        AgentEvent::Started { connectors, .. } => {
            info!(connectors = %connectors.join(", "), "Connectors ready");
        }
        AgentEvent::TaskStarted { task, .. } => info!("Task: {task}"),
        AgentEvent::ThoughtRecorded { thought, .. } => info!("Thinking: {thought}"),
        AgentEvent::ActionStarted {
            step, description, ..
        } => info!(step, "Acting: {description}"),
        AgentEvent::ActionDone {
            step,
            action,
            duration_ms,
            ..
        } => debug!(step, action = %action.name, duration_ms, "Action done"),
        AgentEvent::Completed {
            evidence, steps, ..
        } => info!(steps, "Done: {evidence}"),
        AgentEvent::CheckStarted { check, .. } => info!("Checking: {check}"),
        AgentEvent::CheckPassed { check, .. } => info!("Check passed: {check}"),
        AgentEvent::Failed {
            variant, reason, ..
        } => warn!(%variant, "Failed: {reason}"),
        AgentEvent::Stopped { run_id, .. } => debug!(%run_id, "Stopped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn exits_when_bus_is_dropped() {
        let bus = EventBus::new(8);
        let narrator = spawn_narrator(&bus);
        bus.publish(AgentEvent::Stopped {
            run_id: "run-1".into(),
            timestamp: Utc::now(),
        });
        drop(bus);
        narrator.await.unwrap();
    }

    #[tokio::test]
    async fn survives_lagging() {
        let bus = EventBus::new(1);
        let narrator = spawn_narrator(&bus);
        for i in 0..16 {
            bus.publish(AgentEvent::TaskStarted {
                run_id: "run-1".into(),
                task: format!("task {i}"),
                timestamp: Utc::now(),
            });
        }
        drop(bus);
        narrator.await.unwrap();
    }
}
