//! Workload check action.

use chrono::{DateTime, Utc};
use relic_checks::{WorkloadCheck, WorkloadCheckConfig, WorkloadTarget};

use crate::actions::params;
use crate::actions::types::{ActionTarget, PrepareRequest};
use crate::error::{ExtensionError, ExtensionResult};

/// Action id of the workload check.
pub const WORKLOAD_CHECK_ACTION_ID: &str = "com.steadybit.extension_newrelic.workload.check";

/// Target type of New Relic workloads.
pub const WORKLOAD_TARGET_TYPE: &str = "com.steadybit.extension_newrelic.workload";

/// Workload name attribute.
pub const ATTR_WORKLOAD_NAME: &str = "new-relic.workload.name";
/// Workload GUID attribute.
pub const ATTR_WORKLOAD_GUID: &str = "new-relic.workload.guid";
/// Workload permalink attribute.
pub const ATTR_WORKLOAD_PERMALINK: &str = "new-relic.workload.permalink";
/// Account id attribute of a workload.
pub const ATTR_WORKLOAD_ACCOUNT: &str = "new-relic.workload.account";

/// Reads the workload a step targets.
pub fn workload_target(target: &ActionTarget) -> ExtensionResult<WorkloadTarget> {
    let guid = target
        .attribute(ATTR_WORKLOAD_GUID)
        .ok_or_else(|| missing_attribute(ATTR_WORKLOAD_GUID))?;
    let account = target
        .attribute(ATTR_WORKLOAD_ACCOUNT)
        .ok_or_else(|| missing_attribute(ATTR_WORKLOAD_ACCOUNT))?;
    let account_id = account.parse::<i64>().map_err(|e| {
        ExtensionError::bad_request(
            format!("Invalid attribute {ATTR_WORKLOAD_ACCOUNT} '{account}'"),
            e,
        )
    })?;

    Ok(WorkloadTarget {
        guid: guid.to_string(),
        account_id,
        name: target
            .attribute(ATTR_WORKLOAD_NAME)
            .unwrap_or(&target.name)
            .to_string(),
        permalink: target
            .attribute(ATTR_WORKLOAD_PERMALINK)
            .unwrap_or_default()
            .to_string(),
    })
}

pub(crate) fn missing_attribute(name: &str) -> ExtensionError {
    ExtensionError::BadRequest {
        title: format!("Target is missing attribute {name}"),
        detail: None,
    }
}

/// Prepares a workload check from a prepare request.
pub fn prepare(request: &PrepareRequest, now: DateTime<Utc>) -> ExtensionResult<WorkloadCheck> {
    let target = request.target.as_ref().ok_or_else(|| ExtensionError::BadRequest {
        title: "Workload check requires a target".to_string(),
        detail: None,
    })?;

    let config = WorkloadCheckConfig {
        target: workload_target(target)?,
        expected_states: params::string_list(&request.config, "expectedStates")?,
        duration: params::duration(&request.config)?,
        mode: params::condition_mode(&request.config)?,
    };
    Ok(WorkloadCheck::prepare_at(config, now)?)
}
