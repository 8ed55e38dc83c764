//! Task connector: the two actions that end a task.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use webpilot_core::{
    ActionContext, ActionDefinition, ActionOutcome, ActionResolver, AgentError, ConfigurationError,
    Connector, Result,
};

pub const TASK_DONE: &str = "task:done";
pub const TASK_FAIL: &str = "task:fail";

/// Contributes `task:done` and `task:fail`.
///
/// Included in every agent by default. It has no surface, so it never
/// observes anything.
pub struct TaskConnector {
    actions: Vec<ActionDefinition>,
}

impl TaskConnector {
    pub fn new() -> std::result::Result<Self, ConfigurationError> {
        let done = ActionDefinition::new(
            TASK_DONE,
            "Declare the task complete, citing what on screen proves it.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "evidence": {
                        "type": "string",
                        "description": "What you observed that shows the task is done"
                    }
                },
                "required": ["evidence"]
            }),
            Arc::new(Done),
        )?
        .with_renderer(|input| match input["evidence"].as_str() {
            Some(evidence) => format!("Task done: {evidence}"),
            None => "Task done".to_string(),
        });

        let fail = ActionDefinition::new(
            TASK_FAIL,
            "Give up on the task. Explain why in your thought first.",
            serde_json::json!({ "type": "object", "properties": {} }),
            Arc::new(Fail),
        )?
        .with_renderer(|_| "Task failed".to_string());

        Ok(Self {
            actions: vec![done, fail],
        })
    }
}

#[derive(Deserialize)]
struct DoneInput {
    evidence: String,
}

struct Done;

#[async_trait]
impl ActionResolver for Done {
    async fn resolve(&self, input: serde_json::Value, ctx: ActionContext) -> Result<ActionOutcome> {
        let DoneInput { evidence } = ctx.parse_input(input)?;
        info!(evidence = %evidence, "Task marked done");
        Ok(ActionOutcome::Complete { evidence })
    }
}

struct Fail;

#[async_trait]
impl ActionResolver for Fail {
    async fn resolve(
        &self,
        _input: serde_json::Value,
        ctx: ActionContext,
    ) -> Result<ActionOutcome> {
        let reason = ctx.last_thought.as_deref().unwrap_or("No thought recorded");
        Err(AgentError::explicit(format!("Task failed: {reason}")).into())
    }
}

#[async_trait]
impl Connector for TaskConnector {
    fn id(&self) -> &str {
        "task"
    }

    fn action_space(&self) -> Vec<ActionDefinition> {
        self.actions.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core::{Action, ActionRegistry, Error, FailureVariant};

    fn registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        for action in TaskConnector::new().unwrap().action_space() {
            registry.register("task", action).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn done_completes_with_evidence() {
        let outcome = registry()
            .dispatch(
                &Action::new(TASK_DONE, serde_json::json!({ "evidence": "Order #1042 confirmed" })),
                ActionContext::default(),
            )
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ActionOutcome::Complete { evidence } if evidence == "Order #1042 confirmed"
        ));
    }

    #[tokio::test]
    async fn done_without_evidence_is_rejected() {
        let err = registry()
            .dispatch(&Action::bare(TASK_DONE), ActionContext::default())
            .await
            .unwrap_err();
        match err {
            Error::Validation(e) => assert_eq!(e.paths(), vec!["/evidence"]),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[tokio::test]
    async fn fail_carries_last_thought() {
        let ctx = ActionContext {
            last_thought: Some("The checkout button never enables".into()),
            step: 4,
            ..ActionContext::default()
        };
        let err = registry().dispatch(&Action::bare(TASK_FAIL), ctx).await.unwrap_err();
        match err {
            Error::Agent(e) => {
                assert_eq!(e.variant, FailureVariant::Explicit);
                assert_eq!(e.message, "Task failed: The checkout button never enables");
            }
            other => panic!("expected agent error, got {other}"),
        }
    }

    #[tokio::test]
    async fn fail_without_thought_says_so() {
        let err = registry()
            .dispatch(&Action::bare(TASK_FAIL), ActionContext::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Task failed: No thought recorded"));
    }

    #[test]
    fn renders_for_memory() {
        let registry = registry();
        let saved = Action::new(TASK_DONE, serde_json::json!({ "evidence": "Saved" }));
        let described = registry.describe(&saved);
        assert_eq!(described, "Task done: Saved");
    }
}
