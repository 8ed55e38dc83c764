//! Error types for the webpilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; [`Error`] unifies them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::Action;

/// The top-level error type for all webpilot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Dispatch boundary ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Automation surfaces ---
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    // --- Deliberate loop termination ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Startup structure ---
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    // --- Completion provider ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- History persistence ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// One schema violation inside an action payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    /// JSON pointer to the offending field (`/text`, `/coords/0`, ...)
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    #[error("Payload for '{action}' violates its schema at {}", format_paths(.issues))]
    Schema {
        action: String,
        issues: Vec<FieldIssue>,
    },
}

impl ValidationError {
    /// The offending field paths (empty for unknown actions).
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Self::UnknownAction(_) => vec![],
            Self::Schema { issues, .. } => issues.iter().map(|i| i.path.as_str()).collect(),
        }
    }
}

fn format_paths(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{} ({})", i.path, i.message))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Error)]
pub enum DriverError {
    #[error("Failed to navigate to {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Driver failed while executing {operation}: {reason}")]
    ActionExecution { operation: String, reason: String },

    #[error("Driver operation {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Operation {operation} is not supported by {driver}")]
    Unsupported { driver: String, operation: String },

    #[error("Driver unavailable: {0}")]
    Unavailable(String),
}

impl DriverError {
    /// Whether another attempt at the same operation might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Navigation { .. } | Self::Timeout { .. })
    }
}

/// Categories of deliberate loop termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureVariant {
    /// The agent chose the failure action.
    Explicit,
    /// An expectation about the surface did not hold.
    CheckFailed,
    /// Step count or wall-clock budget ran out.
    BudgetExhausted,
    /// Cancelled from outside between steps.
    Cancelled,
    /// The chosen action did not fit the surface or its schema.
    Misalignment,
    /// The completion provider could not produce a decision.
    Provider,
    /// The automation driver failed.
    Browser,
    Network,
    Unknown,
}

impl std::fmt::Display for FailureVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Explicit => "explicit",
            Self::CheckFailed => "check_failed",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Cancelled => "cancelled",
            Self::Misalignment => "misalignment",
            Self::Provider => "provider",
            Self::Browser => "browser",
            Self::Network => "network",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Raised by resolvers (or the loop itself) to end the run in `Failed`.
#[derive(Debug, Clone, Error)]
#[error("{variant}: {message}")]
pub struct AgentError {
    pub variant: FailureVariant,
    pub message: String,
    pub action: Option<Action>,
}

impl AgentError {
    pub fn new(variant: FailureVariant, message: impl Into<String>) -> Self {
        Self {
            variant,
            message: message.into(),
            action: None,
        }
    }

    pub fn explicit(message: impl Into<String>) -> Self {
        Self::new(FailureVariant::Explicit, message)
    }

    pub fn check_failed(message: impl Into<String>) -> Self {
        Self::new(FailureVariant::CheckFailed, message)
    }

    /// Attach the action that was being executed when the error arose.
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }
}

#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    #[error("Action '{name}' from connector '{connector}' is already registered")]
    DuplicateActionName { name: String, connector: String },

    #[error("Connector id '{0}' is used more than once")]
    DuplicateConnectorId(String),

    #[error("Invalid schema for action '{action}': {reason}")]
    InvalidSchema { action: String, reason: String },

    #[error("Agent is {state}, expected {expected}")]
    InvalidState { state: String, expected: String },

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unreadable snapshot: {0}")]
    Snapshot(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Model refused: {0}")]
    Refusal(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether a repeated request has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::RateLimited { .. }
            | Self::MalformedResponse(_)
            | Self::Timeout(_)
            | Self::Network(_) => true,
            Self::AuthenticationFailed(_) | Self::Refusal(_) | Self::NotConfigured(_) => false,
        }
    }
}
