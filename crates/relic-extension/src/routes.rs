//! Route configuration for the extension API.

use std::sync::Arc;

use axum::routing::{get, post, Router};
use tower_http::trace::TraceLayer;

use crate::api::NewRelicApi;
use crate::handlers::{
    action_status, describe_action, describe_discovery, discovered_targets, index, liveness,
    prepare_action, readiness, receive_event, start_action, stop_action,
};
use crate::state::AppState;

/// Create the extension router.
pub fn create_router<C: NewRelicApi>(state: Arc<AppState<C>>) -> Router {
    Router::new()
        .route("/", get(index))
        // Health
        .route("/health/liveness", get(liveness::<C>))
        .route("/health/readiness", get(readiness::<C>))
        // Actions
        .route("/actions/{id}", get(describe_action))
        .route("/actions/{id}/prepare", post(prepare_action::<C>))
        .route("/actions/{id}/start", post(start_action::<C>))
        .route("/actions/{id}/status", post(action_status::<C>))
        .route("/actions/{id}/stop", post(stop_action::<C>))
        // Discovery
        .route("/discovery/{target_type}", get(describe_discovery))
        .route("/discovery/{target_type}/targets", get(discovered_targets::<C>))
        // Event listeners
        .route("/events/{name}", post(receive_event::<C>))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::incident::{ACCOUNT_TARGET_TYPE, ATTR_ACCOUNT_ID, INCIDENT_CHECK_ACTION_ID};
    use crate::actions::muting::CREATE_MUTING_RULE_ACTION_ID;
    use crate::actions::workload::{
        ATTR_WORKLOAD_ACCOUNT, ATTR_WORKLOAD_GUID, WORKLOAD_CHECK_ACTION_ID, WORKLOAD_TARGET_TYPE,
    };
    use crate::config::ExtensionConfig;
    use crate::discovery::{account_target, DiscoveryKind};
    use crate::testing::FakeApi;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use relic_checks::{FetchError, IncidentRecord};
    use relic_client::ClientConfig;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn make_test_state(api: FakeApi) -> Arc<AppState<FakeApi>> {
        let client = ClientConfig::new(
            "https://api.newrelic.com",
            "NRAK-test",
            "https://insights-collector.newrelic.com",
            "ingest-test",
        )
        .unwrap();
        Arc::new(AppState::new(api, ExtensionConfig::new(client)))
    }

    async fn send(
        state: &Arc<AppState<FakeApi>>,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let app = create_router(Arc::clone(state));
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn workload_prepare(execution_id: Uuid) -> Value {
        json!({
            "executionId": execution_id,
            "target": {
                "name": "checkout (1)",
                "attributes": {
                    ATTR_WORKLOAD_GUID: ["Mjg0"],
                    ATTR_WORKLOAD_ACCOUNT: ["1"]
                }
            },
            "config": {
                "duration": 60_000,
                "expectedStates": ["OPERATIONAL"],
                "conditionCheckMode": "allTheTime"
            }
        })
    }

    fn muting_prepare(execution_id: Uuid) -> Value {
        json!({
            "executionId": execution_id,
            "target": {"name": "1", "attributes": {ATTR_ACCOUNT_ID: ["1"]}},
            "config": {"duration": 60_000},
            "executionContext": {
                "experimentKey": "ADM-1",
                "executionId": 42,
                "executionUri": "https://platform/42"
            }
        })
    }

    #[tokio::test]
    async fn test_index_lists_everything() {
        let state = make_test_state(FakeApi::default());
        let (status, json) = send(&state, "GET", "/", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["actions"].as_array().map(Vec::len), Some(3));
        assert_eq!(json["discoveries"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["eventListeners"].as_array().map(Vec::len), Some(5));
        assert_eq!(json["eventListeners"][0]["listenTo"][0], "experiment.execution.created");
    }

    #[tokio::test]
    async fn test_readiness_follows_startup() {
        let state = make_test_state(FakeApi::default());
        let (status, _) = send(&state, "GET", "/health/readiness", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        state.set_ready();
        let (status, json) = send(&state, "GET", "/health/readiness", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");

        let (status, _) = send(&state, "GET", "/health/liveness", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_action_descriptor() {
        let state = make_test_state(FakeApi::default());
        let (status, json) = send(
            &state,
            "GET",
            &format!("/actions/{WORKLOAD_CHECK_ACTION_ID}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["label"], "Workload Check");

        let (status, _) = send(&state, "GET", "/actions/com.example.unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_workload_check_lifecycle() {
        let state = make_test_state(FakeApi::default().with_workload_status(Some("OPERATIONAL")));
        let execution_id = Uuid::new_v4();
        let base = format!("/actions/{WORKLOAD_CHECK_ACTION_ID}");

        let (status, json) = send(
            &state,
            "POST",
            &format!("{base}/prepare"),
            Some(workload_prepare(execution_id)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"]["executionId"], execution_id.to_string());
        let action_state = json!({"state": json["state"]});

        let (status, json) = send(
            &state,
            "POST",
            &format!("{base}/start"),
            Some(action_state.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.get("error").is_none());
        assert_eq!(json["metrics"][0]["name"], "new_relic_workload");

        let (status, json) = send(
            &state,
            "POST",
            &format!("{base}/status"),
            Some(action_state.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["completed"], false);
        assert_eq!(state.execution_count(), 1);

        let (status, json) = send(
            &state,
            "POST",
            &format!("{base}/stop"),
            Some(action_state.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({}));
        assert_eq!(state.execution_count(), 0);

        let (status, _) = send(&state, "POST", &format!("{base}/status"), Some(action_state)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_violated_check_reports_failed_status() {
        let state = make_test_state(FakeApi::default().with_workload_status(Some("DISRUPTED")));
        let execution_id = Uuid::new_v4();
        let base = format!("/actions/{WORKLOAD_CHECK_ACTION_ID}");
        send(
            &state,
            "POST",
            &format!("{base}/prepare"),
            Some(workload_prepare(execution_id)),
        )
        .await;

        let (status, json) = send(
            &state,
            "POST",
            &format!("{base}/status"),
            Some(json!({"state": {"executionId": execution_id}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["error"]["title"], "Unexpected status DISRUPTED");
        assert_eq!(json["error"]["status"], "failed");
    }

    #[tokio::test]
    async fn test_prepare_rejects_invalid_config() {
        let state = make_test_state(FakeApi::default());
        let mut body = workload_prepare(Uuid::new_v4());
        body["config"]["conditionCheckMode"] = json!("sometimes");

        let (status, json) = send(
            &state,
            "POST",
            &format!("/actions/{WORKLOAD_CHECK_ACTION_ID}/prepare"),
            Some(body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["title"].as_str().unwrap().contains("sometimes"));
        assert_eq!(state.execution_count(), 0);
    }

    #[tokio::test]
    async fn test_state_of_other_action_is_rejected() {
        let state = make_test_state(FakeApi::default());
        let execution_id = Uuid::new_v4();
        send(
            &state,
            "POST",
            &format!("/actions/{WORKLOAD_CHECK_ACTION_ID}/prepare"),
            Some(workload_prepare(execution_id)),
        )
        .await;

        let (status, _) = send(
            &state,
            "POST",
            &format!("/actions/{INCIDENT_CHECK_ACTION_ID}/status"),
            Some(json!({"state": {"executionId": execution_id}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_incident_check_shows_incidents() {
        let incident = IncidentRecord {
            id: "inc-1".to_string(),
            entity_ref: "MXxBUE18".to_string(),
            entity_display_name: "checkout-service".to_string(),
            priority: "CRITICAL".to_string(),
            title: "High error rate".to_string(),
            description: vec!["errors > 5%".to_string()],
        };
        let state = make_test_state(FakeApi::default().with_incidents(vec![incident]));
        let execution_id = Uuid::new_v4();
        let base = format!("/actions/{INCIDENT_CHECK_ACTION_ID}");

        let prepare = json!({
            "executionId": execution_id,
            "target": {"name": "1", "attributes": {ATTR_ACCOUNT_ID: ["1"]}},
            "config": {"duration": 60_000, "condition": "noIncidents"}
        });
        let (status, _) = send(&state, "POST", &format!("{base}/prepare"), Some(prepare)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = send(
            &state,
            "POST",
            &format!("{base}/start"),
            Some(json!({"state": {"executionId": execution_id}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["error"]["title"], "No incident expected, but 1 incidents found.");
        assert_eq!(json["metrics"][0]["metric"]["id"], "inc-1");
    }

    #[tokio::test]
    async fn test_muting_rule_lifecycle() {
        let api = FakeApi::default();
        let state = make_test_state(api.clone());
        let execution_id = Uuid::new_v4();
        let base = format!("/actions/{CREATE_MUTING_RULE_ACTION_ID}");

        let prepare = muting_prepare(execution_id);
        send(&state, "POST", &format!("{base}/prepare"), Some(prepare)).await;
        let action_state = json!({"state": {"executionId": execution_id}});

        let (status, json) = send(
            &state,
            "POST",
            &format!("{base}/start"),
            Some(action_state.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["messages"][0]["message"], "Muting rule created. (id 248760)");

        let (status, json) = send(
            &state,
            "POST",
            &format!("{base}/stop"),
            Some(action_state),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["messages"][0]["message"], "Muting rule deleted. (id 248760)");
        assert_eq!(api.deleted_rules(), vec![(1, "248760".to_string())]);
    }

    #[tokio::test]
    async fn test_failed_muting_rule_delete_can_be_retried() {
        let api = FakeApi::default();
        let state = make_test_state(api.clone());
        let execution_id = Uuid::new_v4();
        let base = format!("/actions/{CREATE_MUTING_RULE_ACTION_ID}");

        let prepare = muting_prepare(execution_id);
        send(&state, "POST", &format!("{base}/prepare"), Some(prepare)).await;
        let action_state = json!({"state": {"executionId": execution_id}});
        send(&state, "POST", &format!("{base}/start"), Some(action_state.clone())).await;

        api.set_mutation_failure(Some(FetchError::new("unexpected response code 503")));
        let (status, json) = send(
            &state,
            "POST",
            &format!("{base}/stop"),
            Some(action_state.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["title"], "Failed to delete muting rule in New Relic.");
        assert_eq!(state.execution_count(), 1);
        assert!(api.deleted_rules().is_empty());

        api.set_mutation_failure(None);
        let (status, json) = send(
            &state,
            "POST",
            &format!("{base}/stop"),
            Some(action_state),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["messages"][0]["message"], "Muting rule deleted. (id 248760)");
        assert_eq!(state.execution_count(), 0);
        assert_eq!(api.deleted_rules(), vec![(1, "248760".to_string())]);
    }

    #[tokio::test]
    async fn test_discovery_endpoints() {
        let state = make_test_state(FakeApi::default());
        state
            .targets(DiscoveryKind::Account)
            .replace(vec![account_target(1), account_target(2)]);

        let (status, json) = send(
            &state,
            "GET",
            &format!("/discovery/{ACCOUNT_TARGET_TYPE}/targets"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["targets"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["targets"][0]["targetType"], ACCOUNT_TARGET_TYPE);

        let (status, json) = send(
            &state,
            "GET",
            &format!("/discovery/{WORKLOAD_TARGET_TYPE}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["id"], WORKLOAD_TARGET_TYPE);

        let (status, _) = send(&state, "GET", "/discovery/com.example.unknown/targets", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_event_listener_returns_empty_object() {
        let api = FakeApi::default().with_accounts(vec![1]);
        let state = make_test_state(api.clone());
        let event = json!({
            "eventName": "experiment.execution.created",
            "experimentExecution": {
                "executionId": 7,
                "experimentKey": "ADM-7",
                "name": "smoke",
                "state": "created"
            }
        });

        let (status, json) = send(&state, "POST", "/events/experiment-started", Some(event)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({}));
        assert_eq!(api.posted_events().len(), 1);

        let (status, json) = send(
            &state,
            "POST",
            "/events/experiment-step-started",
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["title"], "missing ExperimentStepExecution in event");
    }
}
