//! Incident check.
//!
//! Polls the active incidents of an account, keeps those whose entity carries
//! the required tags, and evaluates their presence or absence against an
//! [`IncidentCondition`].
//!
//! Failure titles differ between modes: `AllTheTime` includes the incident
//! count, `AtLeastOnce` does not. Operators match on these strings, so both
//! forms are kept as they are.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::api::IncidentsApi;
use crate::error::{CheckError, Result};
use crate::evaluator::{evaluate, ConditionSuccessFlag, Violation};
use crate::filter::{filter_incidents, EntityTagFilter};
use crate::types::{
    CheckResult, CheckWindow, ColorState, ConditionMode, DisplayMetric, IncidentCondition,
    IncidentRecord,
};

/// Name of the metric emitted per matching incident.
pub const INCIDENT_METRIC_NAME: &str = "new_relic_incidents";

/// Title reported when incidents cannot be fetched.
pub const INCIDENT_FETCH_FAILED: &str = "Failed to get incidents from New Relic.";

/// Configuration of an incident check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentCheckConfig {
    /// Account to query.
    pub account_id: i64,
    /// Priorities to include (passed to the provider).
    pub priority_filter: Vec<String>,
    /// Required entity tags; empty disables tag filtering.
    pub entity_tag_filter: EntityTagFilter,
    /// The declared condition.
    pub condition: IncidentCondition,
    /// How polls combine.
    pub mode: ConditionMode,
    /// How long the check runs.
    pub duration: Duration,
}

/// A running incident check.
#[derive(Debug, Clone)]
pub struct IncidentCheck {
    account_id: i64,
    priority_filter: Vec<String>,
    entity_tag_filter: EntityTagFilter,
    condition: IncidentCondition,
    mode: ConditionMode,
    window: CheckWindow,
    success: ConditionSuccessFlag,
}

impl IncidentCheck {
    /// Prepares a check whose window starts now.
    ///
    /// # Errors
    ///
    /// Returns `CheckError::InvalidConfig` if the duration is out of range.
    pub fn prepare(config: IncidentCheckConfig) -> Result<Self> {
        Self::prepare_at(config, Utc::now())
    }

    /// Prepares a check whose window starts at `now`.
    ///
    /// # Errors
    ///
    /// Returns `CheckError::InvalidConfig` if the duration is out of range.
    pub fn prepare_at(config: IncidentCheckConfig, now: DateTime<Utc>) -> Result<Self> {
        let window = CheckWindow::starting_at(now, config.duration)?;
        debug!(
            account_id = config.account_id,
            condition = %config.condition,
            mode = %config.mode,
            tag_filters = config.entity_tag_filter.len(),
            "prepared incident check"
        );

        Ok(Self {
            account_id: config.account_id,
            priority_filter: config.priority_filter,
            entity_tag_filter: config.entity_tag_filter,
            condition: config.condition,
            mode: config.mode,
            window,
            success: ConditionSuccessFlag::new(),
        })
    }

    /// Returns the check window.
    #[must_use]
    pub const fn window(&self) -> &CheckWindow {
        &self.window
    }

    /// Returns whether the condition held on some poll (`AtLeastOnce` only).
    #[must_use]
    pub const fn condition_succeeded(&self) -> bool {
        self.success.is_set()
    }

    /// Polls the incidents once.
    ///
    /// # Errors
    ///
    /// Returns `CheckError::Fetch` if the incident list cannot be fetched.
    pub async fn poll<A>(&mut self, api: &A) -> Result<CheckResult>
    where
        A: IncidentsApi,
    {
        self.poll_at(api, Utc::now()).await
    }

    /// Polls the incidents, treating `now` as the current time.
    ///
    /// # Errors
    ///
    /// Returns `CheckError::Fetch` if the incident list cannot be fetched.
    /// Failing to fetch the tags of a single entity only drops that incident.
    pub async fn poll_at<A>(&mut self, api: &A, now: DateTime<Utc>) -> Result<CheckResult>
    where
        A: IncidentsApi,
    {
        let incidents = api
            .incidents(&self.priority_filter, self.account_id)
            .await
            .map_err(|source| {
                warn!(account_id = self.account_id, error = %source, "incident fetch failed");
                CheckError::Fetch {
                    title: INCIDENT_FETCH_FAILED,
                    source,
                }
            })?;
        let fetched = incidents.len();

        let incidents = filter_incidents(api, incidents, &self.entity_tag_filter).await;
        let found = incidents.len();
        let satisfied = self.condition.is_satisfied_by(found);

        let evaluation = evaluate(now, &self.window, self.mode, satisfied, &mut self.success, &());
        debug!(
            account_id = self.account_id,
            fetched,
            matching = found,
            satisfied,
            completed = evaluation.completed,
            "polled incidents"
        );

        let condition = self.condition;
        let error = evaluation.failure_with(|violation| failure_title(condition, violation, found));

        Ok(CheckResult {
            completed: evaluation.completed,
            error,
            metrics: incidents.iter().map(|i| incident_metric(i, now)).collect(),
        })
    }
}

fn failure_title(condition: IncidentCondition, violation: Violation, found: usize) -> String {
    match (condition, violation) {
        (IncidentCondition::NoIncidents, Violation::Unsatisfied) => {
            format!("No incident expected, but {found} incidents found.")
        }
        (IncidentCondition::NoIncidents, Violation::NeverSatisfied) => {
            "No incident expected, but incidents found.".to_string()
        }
        (IncidentCondition::AtLeastOneIncident, _) => {
            "At least one incident expected, but no incidents found.".to_string()
        }
        // ShowOnly is always satisfied.
        (IncidentCondition::ShowOnly, _) => String::new(),
    }
}

/// Builds the state-over-time metric for one incident.
///
/// Incidents always render as `danger`; the condition only gates the step.
pub fn incident_metric(incident: &IncidentRecord, now: DateTime<Utc>) -> DisplayMetric {
    let title = if incident.entity_display_name.is_empty() {
        &incident.title
    } else {
        &incident.entity_display_name
    };
    let description = incident.description.first().map_or("", String::as_str);

    DisplayMetric::new(INCIDENT_METRIC_NAME, now)
        .with_field("id", incident.id.clone())
        .with_field("title", title.clone())
        .with_field("state", ColorState::Danger.as_str())
        .with_field(
            "tooltip",
            format!(
                "Priority: {}\nTitle: {}\nDescription: {}\nEntity: {}",
                incident.priority, incident.title, description, incident.entity_display_name
            ),
        )
}
