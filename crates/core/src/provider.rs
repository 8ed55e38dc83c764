//! Completion provider trait: the abstraction over the decision service.
//!
//! A provider sees the rendered memory, the merged action space and a
//! target schema, and answers with exactly one action (plus an optional
//! thought). Transport, prompting and model choice are its own business.
//! Providers may also judge checks: a yes/no question about the current
//! screen, asked between tasks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::action::{Action, ActionSpec};
use crate::context::MemoryContext;
use crate::error::ProviderError;

/// Everything needed for one decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// The task the agent is working on
    pub task: String,

    /// Connector-supplied guidance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<String>,

    /// Chronological history plus current connector snapshots
    pub context: MemoryContext,

    /// The merged action space
    pub actions: Vec<ActionSpec>,

    /// JSON Schema the answer must conform to
    pub schema: serde_json::Value,

    /// Values the task should use, e.g. form input or credentials
    #[serde(default, skip_serializing_if = "TestData::is_empty")]
    pub data: TestData,
}

/// One named value handed to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDataEntry {
    pub key: String,
    pub value: String,

    /// Providers must not echo sensitive values into thoughts
    #[serde(default)]
    pub sensitive: bool,
}

/// Test data for one task: named entries and free-form notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<TestDataEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other: Option<String>,
}

impl TestData {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.other.is_none()
    }
}

/// Data attached to a task, as a caller writes it.
///
/// Either free text (`"use the guest account"`) or a map of named
/// values (`{"email": "a@b.test"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepData {
    Text(String),
    Fields(BTreeMap<String, String>),
}

/// Per-task options, as passed to `Agent::act_with`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<StepData>,
}

impl StepOptions {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            data: Some(StepData::Text(text.into())),
        }
    }

    pub fn with_fields<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            data: Some(StepData::Fields(fields)),
        }
    }

    /// The data in the shape providers receive.
    pub fn test_data(&self) -> TestData {
        match &self.data {
            None => TestData::default(),
            Some(StepData::Text(text)) => TestData {
                entries: vec![],
                other: Some(text.clone()),
            },
            Some(StepData::Fields(fields)) => TestData {
                entries: fields
                    .iter()
                    .map(|(key, value)| TestDataEntry {
                        key: key.clone(),
                        value: value.clone(),
                        sensitive: false,
                    })
                    .collect(),
                other: None,
            },
        }
    }
}

/// A yes/no question about the current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    /// What should hold, e.g. "the cart shows two items"
    pub check: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<String>,

    /// History so far plus current connector snapshots
    pub context: MemoryContext,
}

/// A provider's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    pub action: Action,
}

impl Decision {
    pub fn new(action: Action) -> Self {
        Self {
            thought: None,
            action,
        }
    }

    pub fn with_thought(mut self, thought: impl Into<String>) -> Self {
        self.thought = Some(thought.into());
        self
    }

    /// Parse a raw model answer shaped like the decision schema.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ProviderError> {
        let decision: Decision = serde_json::from_value(value)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        if decision.action.name.trim().is_empty() {
            return Err(ProviderError::MalformedResponse(
                "action name is empty".into(),
            ));
        }
        Ok(decision)
    }
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name, for logs.
    fn name(&self) -> &str;

    /// Choose the next action.
    async fn decide(&self, request: DecisionRequest) -> Result<Decision, ProviderError>;

    /// Judge whether `request.check` holds. `Ok(false)` is a failed check,
    /// not an error.
    ///
    /// Default implementation returns an error indicating checks aren't supported.
    async fn evaluate_check(&self, _request: CheckRequest) -> Result<bool, ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "Provider '{}' does not evaluate checks",
            self.name()
        )))
    }
}
