//! Wire types exchanged with New Relic.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A workload collection as listed by NerdGraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    /// Workload GUID.
    pub guid: String,
    /// Display name.
    pub name: String,
    /// Link to the workload in the New Relic UI.
    #[serde(default)]
    pub permalink: String,
}

/// Kind of a custom event posted to the event ingest API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// An experiment execution started.
    ExperimentStarted,
    /// An experiment execution ended.
    ExperimentEnded,
    /// An attack step started on a target.
    AttackStarted,
    /// An attack step ended on a target.
    AttackEnded,
}

impl EventType {
    /// Returns the wire name of the event type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ExperimentStarted => "ExperimentStarted",
            Self::ExperimentEnded => "ExperimentEnded",
            Self::AttackStarted => "AttackStarted",
            Self::AttackEnded => "AttackEnded",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A custom event for the event ingest API.
///
/// Empty fields are omitted from the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventIngest {
    /// Event kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    /// Experiment key, such as `ADM-1`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub experiment_key: String,
    /// Experiment name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub experiment_name: String,
    /// Experiment execution id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub execution_id: String,
    /// Experiment execution state.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    /// Owning team name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub team_name: String,
    /// Owning team key.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub team_key: String,
    /// Environment the experiment ran in.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment_name: String,
    /// Who started the experiment: `user`, `access_token` or `batch`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub principal_type: String,
    /// Display name of the principal.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub principal_name: String,
    /// Username of the principal.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub principal_username: String,
    /// Id of the step's action.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action_id: String,
    /// Name of the step's action.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action_name: String,
    /// Custom label of the step.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action_custom_label: String,
    /// Target label.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
    /// Target type id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_type: String,
    /// Target execution state.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_state: String,
}
