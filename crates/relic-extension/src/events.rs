//! Forwarding of experiment events to New Relic as custom events.
//!
//! The platform posts experiment lifecycle events to the listener routes.
//! Experiment start and end are forwarded as they arrive. Target events are
//! only forwarded for attack steps, which requires remembering every started
//! step until its experiment completes.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::RwLock;
use relic_client::{EventIngest, EventType};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::api::NewRelicApi;
use crate::discovery::ATTR_LABEL;
use crate::error::{ExtensionError, ExtensionResult};
use crate::registry::Registry;

/// The event listener routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventListener {
    /// An experiment execution was created.
    ExperimentStarted,
    /// An experiment execution ended, in any state.
    ExperimentCompleted,
    /// A step execution started.
    StepStarted,
    /// A step started on a target.
    TargetStarted,
    /// A step ended on a target, in any state.
    TargetCompleted,
}

impl EventListener {
    /// All listeners.
    pub const ALL: [Self; 5] = [
        Self::ExperimentStarted,
        Self::ExperimentCompleted,
        Self::StepStarted,
        Self::TargetStarted,
        Self::TargetCompleted,
    ];

    /// Route the platform posts to.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::ExperimentStarted => "/events/experiment-started",
            Self::ExperimentCompleted => "/events/experiment-completed",
            Self::StepStarted => "/events/experiment-step-started",
            Self::TargetStarted => "/events/experiment-target-started",
            Self::TargetCompleted => "/events/experiment-target-completed",
        }
    }

    /// Looks up a listener by the last segment of its route.
    pub fn from_name(name: &str) -> ExtensionResult<Self> {
        Self::ALL
            .into_iter()
            .find(|listener| listener.path().strip_prefix("/events/") == Some(name))
            .ok_or_else(|| ExtensionError::UnknownEventListener(name.to_string()))
    }

    /// Platform event names delivered to this listener.
    #[must_use]
    pub const fn listen_to(self) -> &'static [&'static str] {
        match self {
            Self::ExperimentStarted => &["experiment.execution.created"],
            Self::ExperimentCompleted => &[
                "experiment.execution.completed",
                "experiment.execution.failed",
                "experiment.execution.canceled",
                "experiment.execution.errored",
            ],
            Self::StepStarted => &["experiment.execution.step-started"],
            Self::TargetStarted => &["experiment.execution.target-started"],
            Self::TargetCompleted => &[
                "experiment.execution.target-completed",
                "experiment.execution.target-canceled",
                "experiment.execution.target-errored",
                "experiment.execution.target-failed",
            ],
        }
    }

    /// Entry of the index listing.
    #[must_use]
    pub fn description(self) -> Value {
        json!({
            "method": "POST",
            "path": self.path(),
            "listenTo": self.listen_to(),
        })
    }
}

/// An event posted by the platform.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    /// Platform event name.
    #[serde(default)]
    pub event_name: String,
    /// Environment of the experiment.
    #[serde(default)]
    pub environment: Option<Environment>,
    /// Owning team.
    #[serde(default)]
    pub team: Option<Team>,
    /// Who triggered the experiment.
    #[serde(default)]
    pub principal: Option<Principal>,
    /// Set for experiment events.
    #[serde(default)]
    pub experiment_execution: Option<ExperimentExecution>,
    /// Set for step events.
    #[serde(default)]
    pub experiment_step_execution: Option<StepExecution>,
    /// Set for target events.
    #[serde(default)]
    pub experiment_step_target_execution: Option<TargetExecution>,
}

/// Environment of an event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Environment {
    /// Environment name.
    #[serde(default)]
    pub name: String,
}

/// Team of an event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Team {
    /// Team key.
    #[serde(default)]
    pub key: String,
    /// Team name.
    #[serde(default)]
    pub name: String,
}

/// Principal of an event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "principalType")]
pub enum Principal {
    /// A platform user.
    #[serde(rename = "user")]
    User {
        /// Login name.
        #[serde(default)]
        username: String,
        /// Display name.
        #[serde(default)]
        name: String,
    },
    /// An API access token.
    #[serde(rename = "access_token")]
    AccessToken {
        /// Token name.
        #[serde(default)]
        name: String,
    },
    /// A scheduled run.
    #[serde(rename = "batch")]
    Batch {
        /// Login name of the schedule owner.
        #[serde(default)]
        username: String,
    },
    /// Any other principal type.
    #[serde(other)]
    Other,
}

/// An experiment execution.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentExecution {
    /// Numeric execution id.
    pub execution_id: f64,
    /// Experiment key.
    #[serde(default)]
    pub experiment_key: String,
    /// Experiment name.
    #[serde(default)]
    pub name: String,
    /// Execution state.
    #[serde(default)]
    pub state: String,
}

/// A step execution.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecution {
    /// Step execution id.
    pub id: Uuid,
    /// Numeric id of the experiment execution.
    pub execution_id: f64,
    /// `action` or `wait`.
    #[serde(rename = "type", default)]
    pub step_type: String,
    /// Action id, for action steps.
    #[serde(default)]
    pub action_id: Option<String>,
    /// Action name.
    #[serde(default)]
    pub action_name: Option<String>,
    /// `attack`, `check`, `load_test` or `other`.
    #[serde(default)]
    pub action_kind: Option<String>,
    /// Label given by the experiment author.
    #[serde(default)]
    pub custom_label: Option<String>,
}

/// A step execution on one target.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetExecution {
    /// Numeric id of the experiment execution.
    pub execution_id: f64,
    /// Experiment key.
    #[serde(default)]
    pub experiment_key: String,
    /// Id of the step execution this target belongs to.
    pub step_execution_id: Uuid,
    /// Target execution state.
    #[serde(default)]
    pub state: String,
    /// Target type id.
    #[serde(default)]
    pub target_type: String,
    /// Target name.
    #[serde(default)]
    pub target_name: String,
    /// Target attributes.
    #[serde(default)]
    pub target_attributes: BTreeMap<String, Vec<String>>,
}

impl TargetExecution {
    fn display_name(&self) -> &str {
        self.target_attributes
            .get(ATTR_LABEL)
            .and_then(|values| values.first())
            .unwrap_or(&self.target_name)
    }
}

/// Formats a float in `%g` style: shortest representation, switching
/// to exponent form for exponents below -4 or from 6 on.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    let scientific = format!("{value:e}");
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if (-4..6).contains(&exponent) {
        value.to_string()
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs())
    }
}

/// Account ids to post events to, loaded on first use and cached for a TTL.
#[derive(Debug)]
pub struct AccountCache {
    ttl: Duration,
    entry: RwLock<Option<(Instant, Vec<i64>)>>,
}

impl AccountCache {
    /// Creates an empty cache.
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: RwLock::new(None),
        }
    }

    /// Returns the cached accounts, loading them if absent or expired.
    ///
    /// A failed load yields no accounts and is retried on the next call.
    pub async fn accounts<A: NewRelicApi>(&self, api: &A) -> Vec<i64> {
        let cached = self
            .entry
            .read()
            .as_ref()
            .filter(|(loaded_at, _)| loaded_at.elapsed() < self.ttl)
            .map(|(_, accounts)| accounts.clone());
        if let Some(accounts) = cached {
            return accounts;
        }

        debug!("loading accounts");
        match api.account_ids().await {
            Ok(accounts) => {
                debug!(count = accounts.len(), "loaded accounts");
                *self.entry.write() = Some((Instant::now(), accounts.clone()));
                accounts
            }
            Err(e) => {
                error!(error = %e, "Failed to load accounts.");
                *self.entry.write() = None;
                Vec::new()
            }
        }
    }
}

/// Turns platform events into New Relic events and posts them.
#[derive(Debug)]
pub struct EventForwarder {
    steps: Registry<Uuid, StepExecution>,
    accounts: AccountCache,
}

impl EventForwarder {
    /// Creates a forwarder whose account list expires after `account_ttl`.
    #[must_use]
    pub fn new(account_ttl: Duration) -> Self {
        Self {
            steps: Registry::new(),
            accounts: AccountCache::new(account_ttl),
        }
    }

    /// Number of remembered step executions.
    pub fn tracked_steps(&self) -> usize {
        self.steps.len()
    }

    /// Handles one posted event body.
    ///
    /// Failures to post to individual accounts are logged and not returned.
    pub async fn forward<A: NewRelicApi>(
        &self,
        api: &A,
        listener: EventListener,
        body: &[u8],
    ) -> ExtensionResult<()> {
        let request: EventRequest = serde_json::from_slice(body)
            .map_err(|e| ExtensionError::bad_request("Failed to decode event request body", e))?;

        let Some(event) = self.translate(listener, &request)? else {
            return Ok(());
        };

        let accounts = self.accounts.accounts(api).await;
        let posts = accounts.iter().map(|&account_id| {
            let event = &event;
            async move {
                if let Err(e) = api.post_event(event, account_id).await {
                    error!(account_id, error = %e, "Failed to send event to New Relic.");
                }
            }
        });
        join_all(posts).await;
        Ok(())
    }

    /// Maps an event to the New Relic event to post, if any.
    pub fn translate(
        &self,
        listener: EventListener,
        request: &EventRequest,
    ) -> ExtensionResult<Option<EventIngest>> {
        match listener {
            EventListener::ExperimentStarted => {
                let mut event = base_event(EventType::ExperimentStarted, request);
                if let Some(execution) = &request.experiment_execution {
                    add_execution(&mut event, execution);
                }
                Ok(Some(event))
            }
            EventListener::ExperimentCompleted => {
                let execution = request
                    .experiment_execution
                    .as_ref()
                    .ok_or_else(|| missing("ExperimentExecution"))?;
                self.forget_steps_of(execution.execution_id);

                let mut event = base_event(EventType::ExperimentEnded, request);
                add_execution(&mut event, execution);
                event.state.clone_from(&execution.state);
                Ok(Some(event))
            }
            EventListener::StepStarted => {
                let step = request
                    .experiment_step_execution
                    .as_ref()
                    .ok_or_else(|| missing("ExperimentStepExecution"))?;
                self.steps.insert(step.id, step.clone());
                Ok(None)
            }
            EventListener::TargetStarted | EventListener::TargetCompleted => {
                let target = request
                    .experiment_step_target_execution
                    .as_ref()
                    .ok_or_else(|| missing("ExperimentStepTargetExecution"))?;
                let Some(step) = self.steps.get(&target.step_execution_id) else {
                    warn!(
                        step_execution_id = %target.step_execution_id,
                        "Could not find step infos for step execution"
                    );
                    return Ok(None);
                };
                if step.action_kind.as_deref() != Some("attack") {
                    return Ok(None);
                }

                let event_type = if listener == EventListener::TargetStarted {
                    EventType::AttackStarted
                } else {
                    EventType::AttackEnded
                };
                let mut event = base_event(event_type, request);
                add_step(&mut event, &step);
                add_target(&mut event, target);
                if listener == EventListener::TargetCompleted {
                    event.target_state.clone_from(&target.state);
                }
                Ok(Some(event))
            }
        }
    }

    #[allow(clippy::float_cmp)]
    fn forget_steps_of(&self, execution_id: f64) {
        let removed = self
            .steps
            .remove_where(|_, step| step.execution_id == execution_id);
        if removed > 0 {
            debug!(
                execution_id = %format_float(execution_id),
                removed,
                "deleted step execution data"
            );
        }
    }
}

fn missing(what: &str) -> ExtensionError {
    ExtensionError::BadRequest {
        title: format!("missing {what} in event"),
        detail: None,
    }
}

fn base_event(event_type: EventType, request: &EventRequest) -> EventIngest {
    let mut event = EventIngest {
        event_type: Some(event_type),
        ..EventIngest::default()
    };
    if let Some(environment) = &request.environment {
        event.environment_name.clone_from(&environment.name);
    }
    if let Some(team) = &request.team {
        event.team_name.clone_from(&team.name);
        event.team_key.clone_from(&team.key);
    }
    match &request.principal {
        Some(Principal::User { username, name }) => {
            event.principal_type = "user".to_string();
            event.principal_username.clone_from(username);
            event.principal_name.clone_from(name);
        }
        Some(Principal::AccessToken { name }) => {
            event.principal_type = "access_token".to_string();
            event.principal_name.clone_from(name);
        }
        Some(Principal::Batch { username }) => {
            event.principal_type = "batch".to_string();
            event.principal_username.clone_from(username);
        }
        Some(Principal::Other) | None => {}
    }
    event
}

fn add_execution(event: &mut EventIngest, execution: &ExperimentExecution) {
    event.experiment_key.clone_from(&execution.experiment_key);
    event.experiment_name.clone_from(&execution.name);
    event.execution_id = format_float(execution.execution_id);
}

fn add_step(event: &mut EventIngest, step: &StepExecution) {
    if step.step_type == "action" {
        event.action_id = step.action_id.clone().unwrap_or_default();
    }
    if let Some(name) = &step.action_name {
        event.action_name.clone_from(name);
    }
    if let Some(label) = &step.custom_label {
        event.action_custom_label.clone_from(label);
    }
}

fn add_target(event: &mut EventIngest, target: &TargetExecution) {
    event.experiment_key.clone_from(&target.experiment_key);
    event.execution_id = format_float(target.execution_id);
    event.target = target.display_name().to_string();
    event.target_type.clone_from(&target.target_type);
}
