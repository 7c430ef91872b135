//! Core types shared by the workload and incident checks.
//!
//! - [`ConditionMode`]: how repeated polls combine into a verdict
//! - [`CheckWindow`]: the time span a check runs over
//! - [`FailureDetail`]: a violated condition, as shown to the user
//! - [`ColorState`] / [`DisplayMetric`]: what a poll renders in the experiment UI
//! - [`CheckResult`]: the outcome of one poll
//! - [`IncidentRecord`]: an active incident as returned by the provider

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CheckError, Result};

/// Workload status labels reported by New Relic.
pub mod status {
    /// Everything is fine.
    pub const OPERATIONAL: &str = "OPERATIONAL";
    /// Partially affected.
    pub const DEGRADED: &str = "DEGRADED";
    /// Heavily affected.
    pub const DISRUPTED: &str = "DISRUPTED";
    /// Down.
    pub const CRITICAL: &str = "CRITICAL";
    /// No status could be determined.
    pub const UNKNOWN: &str = "UNKNOWN";

    /// All labels, in severity order.
    pub const ALL: [&str; 5] = [OPERATIONAL, DEGRADED, DISRUPTED, CRITICAL, UNKNOWN];
}

/// Governs how repeated poll observations combine into a final verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionMode {
    /// The condition must hold on every poll.
    #[default]
    AllTheTime,
    /// The condition must hold on at least one poll within the window.
    AtLeastOnce,
}

impl ConditionMode {
    /// Returns the wire value of this mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AllTheTime => "allTheTime",
            Self::AtLeastOnce => "atLeastOnce",
        }
    }
}

impl fmt::Display for ConditionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionMode {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "allTheTime" => Ok(Self::AllTheTime),
            "atLeastOnce" => Ok(Self::AtLeastOnce),
            other => Err(CheckError::InvalidConfig {
                reason: format!("unknown condition check mode '{other}'"),
            }),
        }
    }
}

/// The time span a check runs over.
///
/// `end` is fixed when the window is created; only the wall clock advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl CheckWindow {
    /// Creates a window starting at `start` and lasting `duration`.
    ///
    /// # Errors
    ///
    /// Returns `CheckError::InvalidConfig` if the end would not be representable.
    pub fn starting_at(start: DateTime<Utc>, duration: Duration) -> Result<Self> {
        let end = TimeDelta::from_std(duration)
            .ok()
            .and_then(|delta| start.checked_add_signed(delta))
            .ok_or_else(|| CheckError::InvalidConfig {
                reason: format!("duration {duration:?} is out of range"),
            })?;
        Ok(Self { start, end })
    }

    /// Returns the window start.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the window end.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns true once `now` has reached the window end.
    #[must_use]
    pub fn is_complete_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }
}

/// A violated condition, reported to the user as a failed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// Summary of what was expected versus observed.
    pub title: String,
}

impl FailureDetail {
    /// Creates a failure with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

/// Visual severity of a display metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorState {
    /// Healthy.
    Success,
    /// Broken.
    Danger,
    /// Neither, or unknown.
    Info,
}

impl ColorState {
    /// Maps a workload status label to its color. Total over all inputs.
    #[must_use]
    pub fn for_workload_status(status: Option<&str>) -> Self {
        match status {
            Some(status::OPERATIONAL) => Self::Success,
            Some(status::DISRUPTED | status::CRITICAL) => Self::Danger,
            _ => Self::Info,
        }
    }

    /// Returns the color as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Danger => "danger",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for ColorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric rendered by the state-over-time widget of a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMetric {
    /// Metric name.
    pub name: String,
    /// Widget fields (identity, title, state, tooltip, url).
    pub metric: BTreeMap<String, String>,
    /// When the poll happened.
    pub timestamp: DateTime<Utc>,
    /// Always zero; the widget hides the value.
    pub value: f64,
}

impl DisplayMetric {
    /// Creates an empty metric.
    pub fn new(name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            metric: BTreeMap::new(),
            timestamp,
            value: 0.0,
        }
    }

    /// Adds a widget field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metric.insert(key.into(), value.into());
        self
    }

    /// Returns a widget field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&str> {
        self.metric.get(key).map(String::as_str)
    }
}

/// The outcome of a single poll.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CheckResult {
    /// Whether the check window has ended.
    pub completed: bool,
    /// The violated condition, if any.
    pub error: Option<FailureDetail>,
    /// Metrics to display for this poll.
    pub metrics: Vec<DisplayMetric>,
}

/// An active incident as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// Incident identifier.
    #[serde(rename = "incidentId")]
    pub id: String,
    /// GUID of the related entity.
    #[serde(rename = "entityGuids")]
    pub entity_ref: String,
    /// Display names of the related entities.
    #[serde(rename = "entityNames")]
    pub entity_display_name: String,
    /// Incident priority (LOW, MEDIUM, HIGH, CRITICAL).
    pub priority: String,
    /// Incident title.
    pub title: String,
    /// Description lines.
    #[serde(default)]
    pub description: Vec<String>,
}

/// The declared pass/fail predicate of an incident check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IncidentCondition {
    /// Display incidents without gating the step.
    #[default]
    ShowOnly,
    /// No incident may be present.
    NoIncidents,
    /// At least one incident must be present.
    AtLeastOneIncident,
}

impl IncidentCondition {
    /// Returns the wire value of this condition.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ShowOnly => "showOnly",
            Self::NoIncidents => "noIncidents",
            Self::AtLeastOneIncident => "atLeastOneIncident",
        }
    }

    /// Whether a poll with `incident_count` matching incidents satisfies this condition.
    #[must_use]
    pub const fn is_satisfied_by(&self, incident_count: usize) -> bool {
        match self {
            Self::ShowOnly => true,
            Self::NoIncidents => incident_count == 0,
            Self::AtLeastOneIncident => incident_count > 0,
        }
    }
}

impl fmt::Display for IncidentCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentCondition {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "showOnly" => Ok(Self::ShowOnly),
            "noIncidents" => Ok(Self::NoIncidents),
            "atLeastOneIncident" => Ok(Self::AtLeastOneIncident),
            other => Err(CheckError::InvalidConfig {
                reason: format!("unknown condition '{other}'"),
            }),
        }
    }
}
