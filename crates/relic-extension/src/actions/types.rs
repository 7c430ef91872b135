//! Action protocol wire types.

use std::collections::BTreeMap;

use relic_checks::{CheckResult, DisplayMetric, FailureDetail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Error body, used both for failed HTTP calls and for failed steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionKitError {
    /// User-facing summary.
    pub title: String,
    /// Further detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// `failed` for a violated check; absent for errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ErrorStatus>,
}

impl From<FailureDetail> for ActionKitError {
    fn from(failure: FailureDetail) -> Self {
        Self {
            title: failure.title,
            detail: None,
            status: Some(ErrorStatus::Failed),
        }
    }
}

/// How a step ended unsuccessfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStatus {
    /// The checked condition was violated.
    Failed,
    /// The step could not be executed.
    Errored,
}

/// A target as sent with a prepare request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTarget {
    /// Target label.
    #[serde(default)]
    pub name: String,
    /// Target attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl ActionTarget {
    /// The first value of an attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Context of the experiment execution running the step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Experiment key, such as `ADM-1`.
    #[serde(default)]
    pub experiment_key: Option<String>,
    /// Numeric experiment execution id.
    #[serde(default)]
    pub execution_id: Option<i64>,
    /// Link to the execution in the platform UI.
    #[serde(default)]
    pub execution_uri: Option<String>,
}

/// Body of a prepare call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    /// Id of this step execution.
    pub execution_id: Uuid,
    /// The target the step runs against.
    #[serde(default)]
    pub target: Option<ActionTarget>,
    /// Step parameters.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Experiment context.
    #[serde(default)]
    pub execution_context: Option<ExecutionContext>,
}

/// Opaque state handed back by prepare and sent with every later call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionState {
    /// Key of the instance in the execution registry.
    pub execution_id: Uuid,
}

/// Body of start, status and stop calls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StateRequest {
    /// State returned by prepare.
    pub state: ActionState,
}

/// Result of a prepare call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareResult {
    /// State for subsequent calls.
    pub state: ActionState,
}

/// A message shown in the step log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Log level.
    pub level: String,
    /// Message text.
    pub message: String,
}

impl Message {
    /// An info-level message.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: "info".to_string(),
            message: message.into(),
        }
    }
}

/// Result of a start call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartResult {
    /// Failure of the first poll, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionKitError>,
    /// Metrics of the first poll.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<DisplayMetric>>,
    /// Messages for the step log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}

/// Result of a status call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResult {
    /// Whether the step is done.
    pub completed: bool,
    /// Failure of this poll, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionKitError>,
    /// Metrics of this poll.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<DisplayMetric>>,
}

impl From<CheckResult> for StatusResult {
    fn from(result: CheckResult) -> Self {
        Self {
            completed: result.completed,
            error: result.error.map(ActionKitError::from),
            metrics: (!result.metrics.is_empty()).then_some(result.metrics),
        }
    }
}

impl From<StatusResult> for StartResult {
    fn from(status: StatusResult) -> Self {
        Self {
            error: status.error,
            metrics: status.metrics,
            messages: None,
        }
    }
}

/// Result of a stop call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResult {
    /// Messages for the step log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}
