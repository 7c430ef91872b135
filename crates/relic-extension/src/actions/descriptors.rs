//! Action descriptors served on `GET /actions/{id}`.

use serde_json::{json, Value};

use crate::actions::incident::{ACCOUNT_TARGET_TYPE, ATTR_ACCOUNT_ID, INCIDENT_CHECK_ACTION_ID};
use crate::actions::muting::CREATE_MUTING_RULE_ACTION_ID;
use crate::actions::workload::{ATTR_WORKLOAD_NAME, WORKLOAD_CHECK_ACTION_ID, WORKLOAD_TARGET_TYPE};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const CATEGORY: &str = "New Relic";
const STATUS_CALL_INTERVAL: &str = "5s";

fn endpoints(action_id: &str, with_status: bool, with_stop: bool) -> Value {
    let endpoint = |step: &str| {
        json!({
            "method": "POST",
            "path": format!("/actions/{action_id}/{step}"),
        })
    };

    let mut endpoints = json!({
        "prepare": endpoint("prepare"),
        "start": endpoint("start"),
    });
    if with_status {
        let mut status = endpoint("status");
        status["callInterval"] = json!(STATUS_CALL_INTERVAL);
        endpoints["status"] = status;
    }
    if with_stop {
        endpoints["stop"] = endpoint("stop");
    }
    endpoints
}

fn condition_check_mode() -> Value {
    json!({
        "name": "conditionCheckMode",
        "label": "Condition Check Mode",
        "description": "Should the step succeed if the condition is met at least once or all the time?",
        "type": "string",
        "defaultValue": "allTheTime",
        "options": [
            {"label": "All the time", "value": "allTheTime"},
            {"label": "At least once", "value": "atLeastOnce"}
        ],
        "required": true,
        "order": 4
    })
}

fn duration(order: u32) -> Value {
    json!({
        "name": "duration",
        "label": "Duration",
        "type": "duration",
        "defaultValue": "30s",
        "required": true,
        "order": order
    })
}

fn account_selection() -> Value {
    json!({
        "targetType": ACCOUNT_TARGET_TYPE,
        "quantityRestriction": "exactlyOne",
        "selectionTemplates": [{
            "label": "by account id",
            "query": format!("{ATTR_ACCOUNT_ID}=\"\"")
        }]
    })
}

/// Descriptor of the workload check.
pub fn workload_check() -> Value {
    let states = ["OPERATIONAL", "DEGRADED", "CRITICAL", "DISRUPTED", "UNKNOWN"];
    json!({
        "id": WORKLOAD_CHECK_ACTION_ID,
        "label": "Workload Check",
        "description": "Checks the status of a workload.",
        "version": VERSION,
        "category": CATEGORY,
        "kind": "check",
        "timeControl": "internal",
        "targetSelection": {
            "targetType": WORKLOAD_TARGET_TYPE,
            "quantityRestriction": "all",
            "selectionTemplates": [{
                "label": "by workload name",
                "query": format!("{ATTR_WORKLOAD_NAME}=\"\"")
            }]
        },
        "parameters": [
            duration(1),
            {
                "name": "expectedStates",
                "label": "Expected States",
                "type": "string_array",
                "options": states
                    .iter()
                    .map(|s| json!({"label": s, "value": s}))
                    .collect::<Vec<_>>(),
                "required": true,
                "order": 2
            },
            condition_check_mode()
        ],
        "widgets": [{
            "type": "stateOverTime",
            "title": "New Relic Workload State",
            "identity": {"from": "newrelic.workload-id"},
            "label": {"from": "title"},
            "state": {"from": "state"},
            "tooltip": {"from": "tooltip"},
            "url": {"from": "url"},
            "value": {"hide": true}
        }],
        "endpoints": endpoints(WORKLOAD_CHECK_ACTION_ID, true, true)
    })
}

/// Descriptor of the incident check.
pub fn incident_check() -> Value {
    let priorities = ["LOW", "MEDIUM", "HIGH", "CRITICAL"];
    json!({
        "id": INCIDENT_CHECK_ACTION_ID,
        "label": "Incident Check",
        "description": "Checks for the existence of incidents in New Relic.",
        "version": VERSION,
        "category": CATEGORY,
        "kind": "check",
        "timeControl": "internal",
        "targetSelection": account_selection(),
        "parameters": [
            duration(1),
            {
                "name": "incidentPriorityFilter",
                "label": "Incident Priority Filter",
                "type": "string_array",
                "options": priorities
                    .iter()
                    .map(|p| json!({"label": p, "value": p}))
                    .collect::<Vec<_>>(),
                "required": false,
                "order": 2
            },
            {
                "name": "entityTagFilter",
                "label": "Entity Tag Filter",
                "description": "Only incidents whose entity carries all of these tags are considered.",
                "type": "key_value",
                "required": false,
                "order": 3
            },
            {
                "name": "condition",
                "label": "Condition",
                "type": "string",
                "defaultValue": "showOnly",
                "options": [
                    {"label": "Show Only", "value": "showOnly"},
                    {"label": "No incidents", "value": "noIncidents"},
                    {"label": "At least one incident", "value": "atLeastOneIncident"}
                ],
                "required": true,
                "order": 4
            },
            condition_check_mode()
        ],
        "widgets": [{
            "type": "stateOverTime",
            "title": "New Relic Incidents",
            "identity": {"from": "id"},
            "label": {"from": "title"},
            "state": {"from": "state"},
            "tooltip": {"from": "tooltip"},
            "value": {"hide": true}
        }],
        "endpoints": endpoints(INCIDENT_CHECK_ACTION_ID, true, true)
    })
}

/// Descriptor of the muting rule action.
pub fn create_muting_rule() -> Value {
    json!({
        "id": CREATE_MUTING_RULE_ACTION_ID,
        "label": "Create Muting Rule",
        "description": "Mute your alerts for a given duration.",
        "version": VERSION,
        "category": CATEGORY,
        "kind": "other",
        "timeControl": "external",
        "targetSelection": account_selection(),
        "parameters": [duration(1)],
        "endpoints": endpoints(CREATE_MUTING_RULE_ACTION_ID, false, true)
    })
}
