//! Actions: the vocabulary the agent can act with.
//!
//! An [`ActionDefinition`] pairs a name with a JSON Schema, a resolver and a
//! renderer. Connectors contribute definitions; the [`ActionRegistry`] merges
//! them and is the only path by which an [`Action`] reaches a resolver.

use async_trait::async_trait;
use futures::future::BoxFuture;
use jsonschema::error::ValidationErrorKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ConfigurationError, FieldIssue, Result, ValidationError};
use crate::observation::Observation;

/// One concrete invocation chosen by the completion provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Name of the definition this action invokes
    pub name: String,

    /// Payload, validated against the definition's schema at dispatch
    #[serde(default = "empty_object")]
    pub input: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl Action {
    pub fn new(name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            input,
        }
    }

    /// An action that takes no input.
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, empty_object())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.input)
    }
}

/// What a resolver can see about the agent that dispatched it.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    /// Most recent thought in memory, if any
    pub last_thought: Option<String>,

    /// Zero-based step index within the current task
    pub step: u32,

    /// Name of the action being resolved, filled in by the registry
    pub action: String,
}

impl ActionContext {
    /// Deserialize a payload that already passed schema validation.
    ///
    /// JSON Schema and serde disagree at the edges (`1.0` is an integer to
    /// the former, not the latter), so a payload the resolver's types cannot
    /// hold is reported as a validation error, not a serialization one.
    pub fn parse_input<T: DeserializeOwned>(
        &self,
        input: serde_json::Value,
    ) -> std::result::Result<T, ValidationError> {
        serde_json::from_value(input).map_err(|e| ValidationError::Schema {
            action: self.action.clone(),
            issues: vec![FieldIssue {
                path: String::new(),
                message: e.to_string(),
            }],
        })
    }
}

/// What happened after a resolver ran.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    /// Keep going; any observations the action produced go into the turn.
    Continue(Vec<Observation>),

    /// The task is finished; `evidence` is the success artifact.
    Complete { evidence: String },
}

impl ActionOutcome {
    pub fn proceed() -> Self {
        Self::Continue(vec![])
    }
}

/// The effectful half of an action definition.
#[async_trait]
pub trait ActionResolver: Send + Sync {
    async fn resolve(&self, input: serde_json::Value, ctx: ActionContext) -> Result<ActionOutcome>;
}

/// Adapts a closure returning a boxed future into a resolver.
struct FnResolver<F>(F);

#[async_trait]
impl<F> ActionResolver for FnResolver<F>
where
    F: Fn(serde_json::Value, ActionContext) -> BoxFuture<'static, Result<ActionOutcome>>
        + Send
        + Sync,
{
    async fn resolve(&self, input: serde_json::Value, ctx: ActionContext) -> Result<ActionOutcome> {
        (self.0)(input, ctx).await
    }
}

type Renderer = Arc<dyn Fn(&serde_json::Value) -> String + Send + Sync>;

/// A capability the agent may invoke.
///
/// The schema is compiled once, here, so a broken schema surfaces as a
/// configuration error when the connector builds its action space.
#[derive(Clone)]
pub struct ActionDefinition {
    name: String,
    description: String,
    schema: serde_json::Value,
    validator: Arc<jsonschema::Validator>,
    resolver: Arc<dyn ActionResolver>,
    renderer: Option<Renderer>,
}

impl ActionDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: serde_json::Value,
        resolver: Arc<dyn ActionResolver>,
    ) -> std::result::Result<Self, ConfigurationError> {
        let name = name.into();
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| ConfigurationError::InvalidSchema {
                action: name.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            name,
            description: description.into(),
            schema,
            validator: Arc::new(validator),
            resolver,
            renderer: None,
        })
    }

    /// Build a definition from a closure resolver.
    pub fn from_fn<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: serde_json::Value,
        resolver: F,
    ) -> std::result::Result<Self, ConfigurationError>
    where
        F: Fn(serde_json::Value, ActionContext) -> BoxFuture<'static, Result<ActionOutcome>>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, description, schema, Arc::new(FnResolver(resolver)))
    }

    /// Override how actions of this kind are described in memory.
    pub fn with_renderer<R>(mut self, renderer: R) -> Self
    where
        R: Fn(&serde_json::Value) -> String + Send + Sync + 'static,
    {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn schema(&self) -> &serde_json::Value {
        &self.schema
    }

    /// Check a payload without resolving it.
    pub fn validate(&self, input: &serde_json::Value) -> std::result::Result<(), ValidationError> {
        let issues: Vec<FieldIssue> = self
            .validator
            .iter_errors(input)
            .map(|error| {
                let base = error.instance_path.to_string();
                let path = match &error.kind {
                    ValidationErrorKind::Required { property } => {
                        let field = property
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| property.to_string());
                        format!("{base}/{field}")
                    }
                    _ => base,
                };
                FieldIssue {
                    path,
                    message: error.to_string(),
                }
            })
            .collect();

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Schema {
                action: self.name.clone(),
                issues,
            })
        }
    }

    pub fn render(&self, input: &serde_json::Value) -> String {
        match &self.renderer {
            Some(render) => render(input),
            None => format!("{} {}", self.name, input),
        }
    }

    pub fn spec(&self) -> ActionSpec {
        ActionSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            schema: self.schema.clone(),
        }
    }
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Declarative view of a definition, as presented to the completion provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    pub schema: serde_json::Value,
}

/// The merged action space of every active connector.
///
/// Definitions live in registration order; the index maps names to slots.
#[derive(Default)]
pub struct ActionRegistry {
    definitions: Vec<RegisteredAction>,
    index: HashMap<String, usize>,
}

struct RegisteredAction {
    connector: String,
    definition: ActionDefinition,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition on behalf of a connector. Names never shadow.
    pub fn register(
        &mut self,
        connector: &str,
        definition: ActionDefinition,
    ) -> std::result::Result<(), ConfigurationError> {
        if self.index.contains_key(definition.name()) {
            return Err(ConfigurationError::DuplicateActionName {
                name: definition.name().to_string(),
                connector: connector.to_string(),
            });
        }
        self.index
            .insert(definition.name().to_string(), self.definitions.len());
        self.definitions.push(RegisteredAction {
            connector: connector.to_string(),
            definition,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ActionDefinition> {
        self.index.get(name).map(|&i| &self.definitions[i].definition)
    }

    /// Which connector contributed an action.
    pub fn owner(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&i| self.definitions[i].connector.as_str())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.definitions
            .iter()
            .map(|r| r.definition.name())
            .collect()
    }

    /// Definitions in registration order (for sending to the provider).
    pub fn specs(&self) -> Vec<ActionSpec> {
        self.definitions.iter().map(|r| r.definition.spec()).collect()
    }

    /// Target schema for one decision: an optional thought plus exactly one action.
    pub fn decision_schema(&self) -> serde_json::Value {
        let variants: Vec<serde_json::Value> = self
            .definitions
            .iter()
            .map(|r| {
                serde_json::json!({
                    "type": "object",
                    "description": r.definition.description(),
                    "properties": {
                        "name": { "const": r.definition.name() },
                        "input": r.definition.schema(),
                    },
                    "required": ["name", "input"],
                })
            })
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": {
                "thought": { "type": "string" },
                "action": { "oneOf": variants },
            },
            "required": ["action"],
        })
    }

    /// Validate and resolve one action. The resolver runs at most once and
    /// never sees a payload that fails validation.
    pub async fn dispatch(&self, action: &Action, ctx: ActionContext) -> Result<ActionOutcome> {
        let definition = self
            .get(&action.name)
            .ok_or_else(|| ValidationError::UnknownAction(action.name.clone()))?;
        definition.validate(&action.input)?;
        let ctx = ActionContext {
            action: action.name.clone(),
            ..ctx
        };
        definition.resolver.resolve(action.input.clone(), ctx).await
    }

    /// Human-readable description of an action.
    pub fn describe(&self, action: &Action) -> String {
        match self.get(&action.name) {
            Some(definition) => definition.render(&action.input),
            None => action.to_string(),
        }
    }
}
