//! # webpilot core
//!
//! Domain types, traits and error definitions for the webpilot agent loop.
//!
//! Every seam of the loop is a trait here: connectors, completion
//! providers and automation drivers. Implementations live in their own
//! crates and depend inward on this one.

pub mod action;
pub mod connector;
pub mod context;
pub mod driver;
pub mod error;
pub mod event;
pub mod observation;
pub mod provider;
pub mod retry;
pub mod state;

// Re-export key types at crate root for ergonomics
pub use action::{
    Action, ActionContext, ActionDefinition, ActionOutcome, ActionRegistry, ActionResolver,
    ActionSpec,
};
pub use connector::Connector;
pub use context::{ConnectorSnapshot, HistoryItem, HistoryKind, MemoryContext, time_label};
pub use driver::{AutomationDriver, DriverHandle, DriverSession, SurfaceInfo, SurfaceList};
pub use error::{
    AgentError, ConfigurationError, DriverError, Error, FailureVariant, FieldIssue, MemoryError,
    ProviderError, Result, ValidationError,
};
pub use event::{AgentEvent, EventBus};
pub use observation::{Image, ImageFormat, Observation, Renderable, Retention};
pub use provider::{
    CheckRequest, CompletionProvider, Decision, DecisionRequest, StepData, StepOptions, TestData,
    TestDataEntry,
};
pub use retry::{Exponential, Retry, RetryPolicy, retry};
pub use state::{AgentState, DeltaState, FacetValue};
