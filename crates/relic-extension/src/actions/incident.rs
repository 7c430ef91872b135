//! Incident check action.

use chrono::{DateTime, Utc};
use relic_checks::{IncidentCheck, IncidentCheckConfig, IncidentCondition};

use crate::actions::params;
use crate::actions::types::{ActionTarget, PrepareRequest};
use crate::actions::workload::missing_attribute;
use crate::error::{ExtensionError, ExtensionResult};

/// Action id of the incident check.
pub const INCIDENT_CHECK_ACTION_ID: &str = "com.steadybit.extension_newrelic.incident.check";

/// Target type of New Relic accounts.
pub const ACCOUNT_TARGET_TYPE: &str = "com.steadybit.extension_newrelic.account";

/// Account id attribute.
pub const ATTR_ACCOUNT_ID: &str = "new-relic.account.id";

/// Reads the account id of an account target.
pub fn account_id(target: Option<&ActionTarget>) -> ExtensionResult<i64> {
    let raw = target
        .and_then(|t| t.attribute(ATTR_ACCOUNT_ID))
        .ok_or_else(|| missing_attribute(ATTR_ACCOUNT_ID))?;
    raw.parse::<i64>().map_err(|e| {
        ExtensionError::bad_request(format!("Invalid attribute {ATTR_ACCOUNT_ID} '{raw}'"), e)
    })
}

/// Prepares an incident check from a prepare request.
pub fn prepare(request: &PrepareRequest, now: DateTime<Utc>) -> ExtensionResult<IncidentCheck> {
    let condition = params::optional_string(&request.config, "condition")
        .map_or(Ok(IncidentCondition::default()), str::parse)?;

    let config = IncidentCheckConfig {
        account_id: account_id(request.target.as_ref())?,
        priority_filter: params::string_list(&request.config, "incidentPriorityFilter")?,
        entity_tag_filter: params::key_values(&request.config, "entityTagFilter")?,
        condition,
        mode: params::condition_mode(&request.config)?,
        duration: params::duration(&request.config)?,
    };
    Ok(IncidentCheck::prepare_at(config, now)?)
}
