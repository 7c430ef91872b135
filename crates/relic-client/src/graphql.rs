//! NerdGraph queries and response shapes.
//!
//! Every response type tolerates missing nesting levels: NerdGraph returns
//! `null` for fields it failed to resolve and reports the cause in `errors`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use relic_checks::IncidentRecord;

use crate::types::Workload;

/// Envelope of every NerdGraph response.
#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

impl<T> GraphQlResponse<T> {
    pub(crate) fn error_messages(&self) -> Vec<&str> {
        self.errors
            .iter()
            .flatten()
            .map(|e| e.message.as_str())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActorData<A> {
    pub actor: Option<A>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountsActor {
    #[serde(default)]
    pub accounts: Vec<AccountRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountRef {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountActor {
    pub account: Option<Account>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Account {
    pub workload: Option<WorkloadField>,
    #[serde(rename = "aiIssues")]
    pub ai_issues: Option<AiIssues>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkloadField {
    #[serde(default)]
    pub collections: Vec<Workload>,
    pub collection: Option<WorkloadCollection>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkloadCollection {
    pub status: Option<WorkloadStatus>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkloadStatus {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AiIssues {
    pub incidents: Option<IncidentPage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IncidentPage {
    #[serde(default)]
    pub incidents: Vec<IncidentRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EntitiesActor {
    #[serde(default)]
    pub entities: Vec<Entity>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Entity {
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Tag {
    pub key: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MutingRuleData {
    #[serde(rename = "alertsMutingRuleCreate")]
    pub created: Option<MutingRuleId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MutingRuleId {
    pub id: String,
}

/// Escapes a value for use inside a GraphQL string literal.
pub(crate) fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub(crate) const ACCOUNTS_QUERY: &str = "{actor {accounts {id}}}";

pub(crate) fn workloads_query(account_id: i64) -> String {
    format!(
        "{{actor {{account(id: {account_id}){{workload {{collections {{guid name permalink}}}}}}}}}}"
    )
}

pub(crate) fn workload_status_query(workload_guid: &str, account_id: i64) -> String {
    format!(
        "{{actor {{account(id: {account_id}){{ workload {{ collection(guid: {}) {{status {{value}}}}}}}}}}}}",
        string_literal(workload_guid)
    )
}

pub(crate) fn incidents_query(priority_filter: &[String], account_id: i64) -> String {
    let priorities = priority_filter
        .iter()
        .map(|p| string_literal(p))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{{actor {{account(id: {account_id}){{aiIssues {{incidents(filter: {{priority: [{priorities}], states: CREATED}}) {{incidents {{incidentId entityGuids entityNames title description priority}}}}}}}}}}}}"
    )
}

pub(crate) fn entity_tags_query(entity_guid: &str) -> String {
    format!(
        "{{actor {{entities(guids: {}){{tags {{key values}}}}}}}}",
        string_literal(entity_guid)
    )
}

/// Muting rule end times are sent without offset, in UTC.
pub(crate) fn muting_rule_end(end: DateTime<Utc>) -> String {
    end.format("%Y-%m-%dT%H:%M:%S").to_string()
}

pub(crate) fn create_muting_rule_mutation(
    account_id: i64,
    name: &str,
    description: &str,
    end: DateTime<Utc>,
) -> String {
    format!(
        "mutation{{alertsMutingRuleCreate(accountId: {account_id} rule: {{condition: {{conditions: {{attribute: \"accountId\", operator: EQUALS, values: \"{account_id}\"}}, operator: AND}}, name: {name}, schedule: {{endTime: \"{end}\", timeZone: \"UTC\"}}, description: {description}, enabled: true}}  ) {{id}}}}",
        name = string_literal(name),
        end = muting_rule_end(end),
        description = string_literal(description),
    )
}

pub(crate) fn delete_muting_rule_mutation(account_id: i64, rule_id: &str) -> String {
    format!("mutation {{alertsMutingRuleDelete(id: {rule_id}, accountId: {account_id}){{id}}}}")
}
