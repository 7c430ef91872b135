//! Client tests against an in-process mock of the New Relic APIs.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use relic_checks::{ConditionMode, IncidentCheck, IncidentCheckConfig, IncidentCondition};
use relic_client::{ClientConfig, ClientError, EventIngest, EventType, NewRelicClient};
use test_case::test_case;

// ==================== Fixtures ====================

const ACCOUNTS: &str = r#"{"data":{"actor":{"accounts":[{"id":12345678}]}}}"#;

const WORKLOADS: &str = r#"{"data":{"actor":{"account":{"workload":{"collections":[
    {"guid":"Mjg0NzgwNnxOUjF8V09SS0xPQUR8Mjg5MzM","name":"sandbox-demo"}]}}}}}"#;

const WORKLOAD_STATUS: &str =
    r#"{"data":{"actor":{"account":{"workload":{"collection":{"status":{"value":"OPERATIONAL"}}}}}}}"#;

const WORKLOAD_STATUS_TIMEOUT: &str = r#"{"data":{"actor":{"account":{"workload":{"collection":null}}}},
    "errors":[{"extensions":{"errorClass":"TIMEOUT"},"locations":[{"column":42,"line":1}],
    "message":"Resolution of this field timed out","path":["actor","account","workload","collection"]}]}"#;

const WORKLOAD_STATUS_NULL: &str =
    r#"{"data":{"actor":{"account":{"workload":{"collection":{"status":null}}}}}}"#;

const WORKLOAD_AUTH_ERROR: &str = r#"{"data":null,"errors":[{"message":"Invalid API key"}]}"#;

const WORKLOAD_NO_ACCOUNT: &str =
    r#"{"data":{"actor":{"account":null}},"errors":[{"message":"Account not found"}]}"#;

const INCIDENTS: &str = r#"{"data":{"actor":{"account":{"aiIssues":{"incidents":{"incidents":[
    {"description":["Policy: 'CPU load'. Condition: 'CPU load'"],"entityGuids":"entity-1",
     "entityNames":"ip-10-40-85-195.eu-central-1.compute.internal","incidentId":"incident-id-1",
     "priority":"CRITICAL","title":"CPU % > 20.0"},
    {"description":["Should be ignored - missing tags"],"entityGuids":"entity-2",
     "entityNames":"ip-10-40-85-195.eu-central-1.compute.internal","incidentId":"incident-id-2",
     "priority":"CRITICAL","title":"CPU % > 20.0"}]}}}}}}"#;

const TAGS_MATCHING: &str =
    r#"{"data":{"actor":{"entities":[{"tags":[{"key":"my-tag","values":["my-value"]}]}]}}}"#;

const TAGS_EMPTY: &str = r#"{"data":{"actor":{"entities":[{"tags":[]}]}}}"#;

const NO_ENTITIES: &str = r#"{"data":{"actor":{"entities":[]}}}"#;

const MUTING_RULE_CREATED: &str = r#"{"data":{"alertsMutingRuleCreate":{"id":"248760"}}}"#;

const MUTING_RULE_DELETED: &str = r#"{"data":{"alertsMutingRuleDelete":{"id":"248760"}}}"#;

// ==================== Mock server ====================

#[derive(Debug, Clone)]
struct Recorded {
    path: String,
    api_key: String,
    content_type: String,
    body: String,
}

#[derive(Clone)]
struct Mock {
    status_fixture: &'static str,
    fail_with: Option<StatusCode>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl Mock {
    fn new() -> Self {
        Self {
            status_fixture: WORKLOAD_STATUS,
            fail_with: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn record(&self, path: String, headers: &HeaderMap, body: &str) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        self.requests.lock().push(Recorded {
            path,
            api_key: header("api-key"),
            content_type: header("content-type"),
            body: body.to_string(),
        });
    }
}

async fn graphql(
    State(mock): State<Mock>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    mock.record("/graphql".to_string(), &headers, &body);
    if let Some(status) = mock.fail_with {
        return (status, String::from(r#"{"error":"nope"}"#));
    }

    let fixture = if body.contains("actor {accounts {id}}") {
        ACCOUNTS
    } else if body.contains("guid name permalink") {
        WORKLOADS
    } else if body.contains("status {value}") {
        mock.status_fixture
    } else if body.contains("aiIssues") {
        INCIDENTS
    } else if body.contains("tags {key values}") && body.contains("entity-1") {
        TAGS_MATCHING
    } else if body.contains("tags {key values}") && body.contains("entity-2") {
        TAGS_EMPTY
    } else if body.contains("tags {key values}") {
        NO_ENTITIES
    } else if body.contains("alertsMutingRuleCreate") {
        MUTING_RULE_CREATED
    } else if body.contains("alertsMutingRuleDelete") {
        MUTING_RULE_DELETED
    } else {
        return (StatusCode::BAD_REQUEST, String::new());
    };
    (StatusCode::OK, fixture.to_string())
}

async fn events(
    State(mock): State<Mock>,
    Path(account_id): Path<i64>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    mock.record(format!("/v1/accounts/{account_id}/events"), &headers, &body);
    (StatusCode::OK, String::from(r#"{"success":true}"#))
}

async fn start(mock: Mock) -> SocketAddr {
    let app = Router::new()
        .route("/graphql", post(graphql))
        .route("/v1/accounts/{account_id}/events", post(events))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn client_for(mock: Mock) -> NewRelicClient {
    let addr = start(mock).await;
    let base = format!("http://{addr}");
    let config = ClientConfig::new(&base, "user-key", &base, "ingest-key")
        .unwrap()
        .with_timeout(Duration::from_secs(5));
    NewRelicClient::new(config).unwrap()
}

// ==================== Queries ====================

#[tokio::test]
async fn lists_accounts() {
    let client = client_for(Mock::new()).await;
    assert_eq!(client.get_account_ids().await.unwrap(), vec![12_345_678]);
}

#[tokio::test]
async fn lists_workloads_without_permalink() {
    let client = client_for(Mock::new()).await;
    let workloads = client.get_workloads(12_345_678).await.unwrap();
    assert_eq!(workloads.len(), 1);
    assert_eq!(workloads[0].name, "sandbox-demo");
    assert_eq!(workloads[0].guid, "Mjg0NzgwNnxOUjF8V09SS0xPQUR8Mjg5MzM");
    assert!(workloads[0].permalink.is_empty());
}

#[tokio::test]
async fn reads_workload_status() {
    let client = client_for(Mock::new()).await;
    let status = client
        .get_workload_status("Mjg0NzgwNnxOUjF8V09SS0xPQUR8Mjg5MzM", 12_345_678)
        .await
        .unwrap();
    assert_eq!(status.as_deref(), Some("OPERATIONAL"));
}

#[tokio::test]
async fn timed_out_workload_status_is_unknown() {
    let mock = Mock {
        status_fixture: WORKLOAD_STATUS_TIMEOUT,
        ..Mock::new()
    };
    let client = client_for(mock).await;
    let status = client.get_workload_status("guid", 1).await.unwrap();
    assert_eq!(status.as_deref(), Some("UNKNOWN"));
}

#[tokio::test]
async fn null_workload_status_is_unknown() {
    let mock = Mock {
        status_fixture: WORKLOAD_STATUS_NULL,
        ..Mock::new()
    };
    let client = client_for(mock).await;
    let status = client.get_workload_status("guid", 1).await.unwrap();
    assert_eq!(status.as_deref(), Some("UNKNOWN"));
}

#[test_case(WORKLOAD_AUTH_ERROR ; "data null")]
#[test_case(WORKLOAD_NO_ACCOUNT ; "account null")]
#[tokio::test]
async fn workload_status_without_workload_is_an_error(fixture: &'static str) {
    let mock = Mock {
        status_fixture: fixture,
        ..Mock::new()
    };
    let client = client_for(mock).await;
    let err = client.get_workload_status("guid", 1).await.unwrap_err();
    assert!(matches!(err, ClientError::UnexpectedBody { .. }));
}

#[tokio::test]
async fn lists_incidents() {
    let mock = Mock::new();
    let requests = Arc::clone(&mock.requests);
    let client = client_for(mock).await;

    let incidents = client
        .get_incidents(&["HIGH".to_string(), "CRITICAL".to_string()], 12_345_678)
        .await
        .unwrap();
    let ids: Vec<_> = incidents.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["incident-id-1", "incident-id-2"]);
    assert_eq!(incidents[0].entity_ref, "entity-1");

    let recorded = requests.lock()[0].clone();
    assert!(recorded.body.contains(r#"priority: [\"HIGH\",\"CRITICAL\"], states: CREATED"#));
}

#[tokio::test]
async fn reads_entity_tags() {
    let client = client_for(Mock::new()).await;

    let tags = client.get_entity_tags("entity-1").await.unwrap();
    assert_eq!(tags.get("my-tag"), Some(&vec!["my-value".to_string()]));

    let tags = client.get_entity_tags("entity-2").await.unwrap();
    assert!(tags.is_empty());
}

#[tokio::test]
async fn entity_tags_require_exactly_one_entity() {
    let client = client_for(Mock::new()).await;
    let err = client.get_entity_tags("entity-3").await.unwrap_err();
    assert!(matches!(err, ClientError::UnexpectedBody { .. }));
}

#[tokio::test]
async fn non_200_is_an_error() {
    let mock = Mock {
        fail_with: Some(StatusCode::UNAUTHORIZED),
        ..Mock::new()
    };
    let client = client_for(mock).await;
    let err = client.get_account_ids().await.unwrap_err();
    assert!(matches!(err, ClientError::UnexpectedStatus { status: 401, .. }));
}

#[tokio::test]
async fn requests_carry_headers() {
    let mock = Mock::new();
    let requests = Arc::clone(&mock.requests);
    let client = client_for(mock).await;

    client.get_account_ids().await.unwrap();
    let recorded = requests.lock()[0].clone();
    assert_eq!(recorded.path, "/graphql");
    assert_eq!(recorded.api_key, "user-key");
    assert_eq!(recorded.content_type, "application/json; charset=UTF-8");

    let body: serde_json::Value = serde_json::from_str(&recorded.body).unwrap();
    assert_eq!(body["query"], "{actor {accounts {id}}}");
}

// ==================== Mutations and events ====================

#[tokio::test]
async fn creates_and_deletes_muting_rule() {
    let mock = Mock::new();
    let requests = Arc::clone(&mock.requests);
    let client = client_for(mock).await;
    let end = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 45).unwrap();

    let id = client
        .create_muting_rule(12_345_678, "Steadybit ADM-1 (42)", "https://platform/42", end)
        .await
        .unwrap();
    assert_eq!(id, "248760");
    client.delete_muting_rule(12_345_678, &id).await.unwrap();

    let recorded = requests.lock().clone();
    assert_eq!(recorded.len(), 2);
    assert!(recorded[0].body.contains("2024-03-01T10:30:45"));
    assert!(recorded[0].body.contains("Steadybit ADM-1 (42)"));
    assert!(recorded[1].body.contains("alertsMutingRuleDelete(id: 248760, accountId: 12345678)"));
}

#[tokio::test]
async fn posts_event_as_single_element_array() {
    let mock = Mock::new();
    let requests = Arc::clone(&mock.requests);
    let client = client_for(mock).await;

    let event = EventIngest {
        event_type: Some(EventType::ExperimentStarted),
        experiment_key: "ADM-1".to_string(),
        execution_id: "42".to_string(),
        ..EventIngest::default()
    };
    client.post_event(&event, 12_345_678).await.unwrap();

    let recorded = requests.lock()[0].clone();
    assert_eq!(recorded.path, "/v1/accounts/12345678/events");
    assert_eq!(recorded.api_key, "ingest-key");
    let body: serde_json::Value = serde_json::from_str(&recorded.body).unwrap();
    assert_eq!(
        body,
        serde_json::json!([{
            "eventType": "ExperimentStarted",
            "experimentKey": "ADM-1",
            "executionId": "42"
        }])
    );
}

// ==================== Checks against the client ====================

#[tokio::test]
async fn incident_check_filters_by_tags_through_client() {
    let client = client_for(Mock::new()).await;
    let start = Utc::now();
    let config = IncidentCheckConfig {
        account_id: 12_345_678,
        priority_filter: vec!["CRITICAL".to_string()],
        entity_tag_filter: BTreeMap::from([("my-tag".to_string(), "my-value".to_string())]),
        condition: IncidentCondition::NoIncidents,
        mode: ConditionMode::AllTheTime,
        duration: Duration::from_secs(60),
    };
    let mut check = IncidentCheck::prepare_at(config, start).unwrap();

    let result = check.poll_at(&client, start).await.unwrap();
    assert!(!result.completed);
    assert_eq!(result.metrics.len(), 1);
    assert_eq!(result.metrics[0].field("id"), Some("incident-id-1"));
    assert_eq!(
        result.error.unwrap().title,
        "No incident expected, but 1 incidents found."
    );
}
