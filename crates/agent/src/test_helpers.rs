//! Shared test doubles for agent tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use webpilot_core::{ActionDefinition, ActionOutcome, Connector, DriverError, Result};

/// Shared log of connector lifecycle calls.
#[derive(Clone, Default)]
pub struct Lifecycle {
    events: Arc<Mutex<Vec<String>>>,
    pokes: Arc<AtomicU32>,
}

impl Lifecycle {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.events().iter().filter(|e| e.starts_with("stop ")).count()
    }

    pub fn pokes(&self) -> u32 {
        self.pokes.load(Ordering::SeqCst)
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

/// A connector with no surface that logs its lifecycle.
pub struct StubConnector {
    id: String,
    lifecycle: Lifecycle,
    actions: Vec<ActionDefinition>,
    fail_start: bool,
}

impl StubConnector {
    pub fn new(id: &str, lifecycle: &Lifecycle) -> Self {
        Self {
            id: id.to_string(),
            lifecycle: lifecycle.clone(),
            actions: vec![],
            fail_start: false,
        }
    }

    /// Add an action `{times: integer}` that counts pokes.
    pub fn with_action(mut self, name: &str) -> Self {
        let pokes = Arc::clone(&self.lifecycle.pokes);
        let definition = ActionDefinition::from_fn(
            name,
            "Poke the stub",
            serde_json::json!({
                "type": "object",
                "properties": { "times": { "type": "integer" } },
                "required": ["times"]
            }),
            move |_, _| {
                pokes.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(ActionOutcome::proceed()) })
            },
        )
        .unwrap();
        self.actions.push(definition);
        self
    }

    pub fn with_definition(mut self, definition: ActionDefinition) -> Self {
        self.actions.push(definition);
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }
}

#[async_trait]
impl Connector for StubConnector {
    fn id(&self) -> &str {
        &self.id
    }

    async fn on_start(&self) -> Result<()> {
        self.lifecycle.push(format!("start {}", self.id));
        if self.fail_start {
            return Err(DriverError::Unavailable(format!("{} refused to start", self.id)).into());
        }
        Ok(())
    }

    async fn on_stop(&self) -> Result<()> {
        self.lifecycle.push(format!("stop {}", self.id));
        Ok(())
    }

    fn action_space(&self) -> Vec<ActionDefinition> {
        self.actions.clone()
    }
}
