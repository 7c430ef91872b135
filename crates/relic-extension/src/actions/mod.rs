//! Actions offered to the platform and their per-execution state.

pub mod descriptors;
pub mod incident;
pub mod muting;
pub mod params;
pub mod types;
pub mod workload;

use chrono::{DateTime, Utc};
use relic_checks::{IncidentCheck, WorkloadCheck};
use serde_json::Value;

use crate::api::NewRelicApi;
use crate::error::{ExtensionError, ExtensionResult};

use self::incident::INCIDENT_CHECK_ACTION_ID;
use self::muting::{MutingRule, CREATE_MUTING_RULE_ACTION_ID};
use self::types::{PrepareRequest, StartResult, StatusResult, StopResult};
use self::workload::WORKLOAD_CHECK_ACTION_ID;

/// The registered actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Workload status check.
    WorkloadCheck,
    /// Incident check.
    IncidentCheck,
    /// Muting rule for the duration of a step.
    CreateMutingRule,
}

impl ActionKind {
    /// All registered actions.
    pub const ALL: [Self; 3] = [Self::WorkloadCheck, Self::IncidentCheck, Self::CreateMutingRule];

    /// The action id.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::WorkloadCheck => WORKLOAD_CHECK_ACTION_ID,
            Self::IncidentCheck => INCIDENT_CHECK_ACTION_ID,
            Self::CreateMutingRule => CREATE_MUTING_RULE_ACTION_ID,
        }
    }

    /// Looks up an action by id.
    pub fn from_id(id: &str) -> ExtensionResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == id)
            .ok_or_else(|| ExtensionError::UnknownAction(id.to_string()))
    }

    /// The action descriptor.
    #[must_use]
    pub fn descriptor(self) -> Value {
        match self {
            Self::WorkloadCheck => descriptors::workload_check(),
            Self::IncidentCheck => descriptors::incident_check(),
            Self::CreateMutingRule => descriptors::create_muting_rule(),
        }
    }
}

/// State of one prepared step.
#[derive(Debug, Clone)]
pub enum ActionInstance {
    /// A running workload check.
    Workload(WorkloadCheck),
    /// A running incident check.
    Incident(IncidentCheck),
    /// A muting rule step.
    MutingRule(MutingRule),
}

impl ActionInstance {
    /// Validates a prepare request and builds the step state.
    pub fn prepare(
        kind: ActionKind,
        request: &PrepareRequest,
        now: DateTime<Utc>,
    ) -> ExtensionResult<Self> {
        Ok(match kind {
            ActionKind::WorkloadCheck => Self::Workload(workload::prepare(request, now)?),
            ActionKind::IncidentCheck => Self::Incident(incident::prepare(request, now)?),
            ActionKind::CreateMutingRule => Self::MutingRule(MutingRule::prepare(request, now)?),
        })
    }

    /// The action this step belongs to.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Workload(_) => ActionKind::WorkloadCheck,
            Self::Incident(_) => ActionKind::IncidentCheck,
            Self::MutingRule(_) => ActionKind::CreateMutingRule,
        }
    }

    /// Starts the step. Checks run their first poll.
    pub async fn start<A: NewRelicApi>(
        &mut self,
        api: &A,
        now: DateTime<Utc>,
    ) -> ExtensionResult<StartResult> {
        match self {
            Self::Workload(_) | Self::Incident(_) => Ok(self.status(api, now).await?.into()),
            Self::MutingRule(rule) => rule.start(api).await,
        }
    }

    /// Polls the step.
    pub async fn status<A: NewRelicApi>(
        &mut self,
        api: &A,
        now: DateTime<Utc>,
    ) -> ExtensionResult<StatusResult> {
        let result = match self {
            Self::Workload(check) => check.poll_at(api, now).await?,
            Self::Incident(check) => check.poll_at(api, now).await?,
            Self::MutingRule(_) => return Ok(StatusResult::default()),
        };
        Ok(result.into())
    }

    /// Stops the step. Only muting rules have anything to undo.
    pub async fn stop<A: NewRelicApi>(&mut self, api: &A) -> ExtensionResult<StopResult> {
        match self {
            Self::Workload(_) | Self::Incident(_) => Ok(StopResult::default()),
            Self::MutingRule(rule) => rule.stop(api).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::types::ActionTarget;
    use crate::actions::workload::{ATTR_WORKLOAD_ACCOUNT, ATTR_WORKLOAD_GUID};
    use crate::testing::FakeApi;
    use chrono::TimeDelta;
    use std::collections::BTreeMap;
    use test_case::test_case;
    use uuid::Uuid;

    fn workload_request(mode: &str) -> PrepareRequest {
        PrepareRequest {
            execution_id: Uuid::new_v4(),
            target: Some(ActionTarget {
                name: "checkout".to_string(),
                attributes: BTreeMap::from([
                    (ATTR_WORKLOAD_GUID.to_string(), vec!["Mjg0".to_string()]),
                    (ATTR_WORKLOAD_ACCOUNT.to_string(), vec!["1".to_string()]),
                ]),
            }),
            config: serde_json::from_value(serde_json::json!({
                "duration": 10_000,
                "expectedStates": ["OPERATIONAL"],
                "conditionCheckMode": mode
            }))
            .unwrap(),
            execution_context: None,
        }
    }

    #[test_case(ActionKind::WorkloadCheck ; "workload")]
    #[test_case(ActionKind::IncidentCheck ; "incident")]
    #[test_case(ActionKind::CreateMutingRule ; "muting")]
    fn ids_round_trip(kind: ActionKind) {
        assert_eq!(ActionKind::from_id(kind.id()).unwrap(), kind);
        assert_eq!(kind.descriptor()["id"], kind.id());
    }

    #[test]
    fn unknown_id_is_rejected() {
        assert!(matches!(
            ActionKind::from_id("com.example.nope"),
            Err(ExtensionError::UnknownAction(_))
        ));
    }

    #[tokio::test]
    async fn workload_check_fails_on_first_bad_poll() {
        let api = FakeApi::default().with_workload_status(Some("DEGRADED"));
        let now = Utc::now();
        let mut instance = ActionInstance::prepare(
            ActionKind::WorkloadCheck,
            &workload_request("allTheTime"),
            now,
        )
        .unwrap();
        assert_eq!(instance.kind(), ActionKind::WorkloadCheck);

        let started = instance.start(&api, now).await.unwrap();
        let error = started.error.unwrap();
        assert_eq!(error.title, "Unexpected status DEGRADED");
        assert_eq!(started.metrics.map(|m| m.len()), Some(1));
    }

    #[tokio::test]
    async fn workload_check_completes_at_window_end() {
        let api = FakeApi::default().with_workload_status(Some("OPERATIONAL"));
        let now = Utc::now();
        let mut instance = ActionInstance::prepare(
            ActionKind::WorkloadCheck,
            &workload_request("atLeastOnce"),
            now,
        )
        .unwrap();

        let status = instance.status(&api, now + TimeDelta::seconds(5)).await.unwrap();
        assert!(!status.completed);
        let status = instance.status(&api, now + TimeDelta::seconds(10)).await.unwrap();
        assert!(status.completed);
        assert!(status.error.is_none());
        assert!(instance.stop(&api).await.unwrap().messages.is_none());
    }

    #[tokio::test]
    async fn fetch_failure_surfaces_as_upstream() {
        let api =
            FakeApi::default().failing_reads(relic_checks::FetchError::new("connection refused"));
        let now = Utc::now();
        let mut instance = ActionInstance::prepare(
            ActionKind::WorkloadCheck,
            &workload_request("allTheTime"),
            now,
        )
        .unwrap();
        let err = instance.status(&api, now).await.unwrap_err();
        assert_eq!(err.to_string(), relic_checks::WORKLOAD_FETCH_FAILED);
    }
}
