//! How a task ends.

use serde::{Deserialize, Serialize};
use webpilot_core::{Action, AgentError, Error, FailureVariant};

/// Where the agent is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Started,
    Deciding,
    Acting,
    Completed,
    Failed,
    Stopped,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Started => "started",
            Self::Deciding => "deciding",
            Self::Acting => "acting",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Structured description of a failed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub variant: FailureVariant,
    pub message: String,

    /// The action being executed when the task failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl From<AgentError> for FailureRecord {
    fn from(error: AgentError) -> Self {
        Self {
            variant: error.variant,
            message: error.message,
            action: error.action,
        }
    }
}

impl From<Error> for FailureRecord {
    fn from(error: Error) -> Self {
        classify(error).into()
    }
}

/// Map any loop error onto the failure taxonomy.
pub(crate) fn classify(error: Error) -> AgentError {
    use webpilot_core::DriverError;

    let variant = match &error {
        Error::Agent(e) => return e.clone(),
        Error::Validation(_) => FailureVariant::Misalignment,
        Error::Provider(_) => FailureVariant::Provider,
        Error::Driver(DriverError::Navigation { .. }) => FailureVariant::Network,
        Error::Driver(_) => FailureVariant::Browser,
        Error::Configuration(_)
        | Error::Memory(_)
        | Error::Serialization(_)
        | Error::Internal(_) => FailureVariant::Unknown,
    };
    AgentError::new(variant, error.to_string())
}

/// The terminal result of one task or check. A finished task is always
/// `Completed` or `Failed`; a check is `Passed` or `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AgentOutcome {
    Completed { evidence: String, steps: u32 },
    Passed { check: String },
    Failed(FailureRecord),
}

impl AgentOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }

    pub fn failure(&self) -> Option<&FailureRecord> {
        match self {
            Self::Failed(record) => Some(record),
            Self::Completed { .. } | Self::Passed { .. } => None,
        }
    }
}
