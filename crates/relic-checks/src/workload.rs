//! Workload status check.
//!
//! Polls the status of one New Relic workload over a declared duration and
//! evaluates it against a set of expected states.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::WorkloadStatusApi;
use crate::error::{CheckError, Result};
use crate::evaluator::{evaluate, ObservedStateSet, Violation};
use crate::types::{status, CheckResult, CheckWindow, ColorState, ConditionMode, DisplayMetric};

/// Name of the metric emitted on every poll.
pub const WORKLOAD_METRIC_NAME: &str = "new_relic_workload";

/// Title reported when the status cannot be fetched.
pub const WORKLOAD_FETCH_FAILED: &str = "Failed to get workload status from New Relic.";

/// The workload a check runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadTarget {
    /// Workload GUID.
    pub guid: String,
    /// Account the workload belongs to.
    pub account_id: i64,
    /// Display name.
    pub name: String,
    /// Link to the workload in New Relic.
    pub permalink: String,
}

/// Configuration of a workload check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadCheckConfig {
    /// The workload to check.
    pub target: WorkloadTarget,
    /// States that satisfy the check.
    pub expected_states: Vec<String>,
    /// How long the check runs.
    pub duration: Duration,
    /// How polls combine.
    pub mode: ConditionMode,
}

/// A running workload check.
#[derive(Debug, Clone)]
pub struct WorkloadCheck {
    target: WorkloadTarget,
    expected_states: Vec<String>,
    mode: ConditionMode,
    window: CheckWindow,
    observed: ObservedStateSet,
}

impl WorkloadCheck {
    /// Prepares a check whose window starts now.
    ///
    /// # Errors
    ///
    /// Returns `CheckError::InvalidConfig` if no expected state is given or the
    /// duration is out of range.
    pub fn prepare(config: WorkloadCheckConfig) -> Result<Self> {
        Self::prepare_at(config, Utc::now())
    }

    /// Prepares a check whose window starts at `now`.
    ///
    /// # Errors
    ///
    /// See [`WorkloadCheck::prepare`].
    pub fn prepare_at(config: WorkloadCheckConfig, now: DateTime<Utc>) -> Result<Self> {
        if config.expected_states.is_empty() {
            return Err(CheckError::InvalidConfig {
                reason: "at least one expected state is required".to_string(),
            });
        }
        if config.target.guid.is_empty() {
            return Err(CheckError::InvalidConfig {
                reason: "workload guid cannot be empty".to_string(),
            });
        }

        let window = CheckWindow::starting_at(now, config.duration)?;
        debug!(
            workload = %config.target.guid,
            mode = %config.mode,
            end = %window.end(),
            "prepared workload check"
        );

        Ok(Self {
            target: config.target,
            expected_states: config.expected_states,
            mode: config.mode,
            window,
            observed: ObservedStateSet::new(),
        })
    }

    /// Returns the target workload.
    #[must_use]
    pub const fn target(&self) -> &WorkloadTarget {
        &self.target
    }

    /// Returns the check window.
    #[must_use]
    pub const fn window(&self) -> &CheckWindow {
        &self.window
    }

    /// Returns the states observed so far (`AtLeastOnce` only).
    #[must_use]
    pub const fn observed_states(&self) -> &ObservedStateSet {
        &self.observed
    }

    /// Polls the workload status once.
    ///
    /// # Errors
    ///
    /// Returns `CheckError::Fetch` if the status cannot be fetched.
    pub async fn poll<A>(&mut self, api: &A) -> Result<CheckResult>
    where
        A: WorkloadStatusApi,
    {
        self.poll_at(api, Utc::now()).await
    }

    /// Polls the workload status, treating `now` as the current time.
    ///
    /// # Errors
    ///
    /// Returns `CheckError::Fetch` if the status cannot be fetched. The
    /// observed states are left untouched in that case.
    pub async fn poll_at<A>(&mut self, api: &A, now: DateTime<Utc>) -> Result<CheckResult>
    where
        A: WorkloadStatusApi,
    {
        let fetched = api
            .workload_status(&self.target.guid, self.target.account_id)
            .await
            .map_err(|source| {
                warn!(
                    workload = %self.target.guid,
                    error = %source,
                    "workload status fetch failed"
                );
                CheckError::Fetch {
                    title: WORKLOAD_FETCH_FAILED,
                    source,
                }
            })?;

        let label = fetched.as_deref().unwrap_or(status::UNKNOWN);
        let satisfied = self.expected_states.iter().any(|s| s == label);

        let evaluation = evaluate(
            now,
            &self.window,
            self.mode,
            satisfied,
            &mut self.observed,
            label,
        );
        debug!(
            workload = %self.target.guid,
            status = label,
            satisfied,
            completed = evaluation.completed,
            "polled workload status"
        );

        let error = evaluation.failure_with(|violation| match violation {
            Violation::Unsatisfied => format!("Unexpected status {label}"),
            Violation::NeverSatisfied => format!(
                "Expected state missing. Expected: {}, Observed: {}",
                self.expected_states.join(", "),
                self.observed.states().collect::<Vec<_>>().join(", ")
            ),
        });

        Ok(CheckResult {
            completed: evaluation.completed,
            error,
            metrics: vec![workload_metric(&self.target, fetched.as_deref(), now)],
        })
    }
}

/// Builds the state-over-time metric for one workload poll.
pub fn workload_metric(
    target: &WorkloadTarget,
    workload_status: Option<&str>,
    now: DateTime<Utc>,
) -> DisplayMetric {
    let label = workload_status.unwrap_or(status::UNKNOWN);
    DisplayMetric::new(WORKLOAD_METRIC_NAME, now)
        .with_field("newrelic.workload-id", target.guid.clone())
        .with_field("title", target.name.clone())
        .with_field(
            "state",
            ColorState::for_workload_status(workload_status).as_str(),
        )
        .with_field("tooltip", format!("Status: {label}"))
        .with_field("url", target.permalink.clone())
}
