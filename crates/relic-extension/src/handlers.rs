//! HTTP request handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::actions::types::{
    ActionState, PrepareRequest, PrepareResult, StartResult, StateRequest, StatusResult, StopResult,
};
use crate::actions::{ActionInstance, ActionKind};
use crate::api::NewRelicApi;
use crate::discovery::{DiscoveredTargets, DiscoveryKind};
use crate::error::{ExtensionError, ExtensionResult};
use crate::events::EventListener;
use crate::state::{AppState, SharedInstance};

type AppStateRef<C> = State<Arc<AppState<C>>>;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status message.
    pub status: &'static str,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
}

/// Handle GET / - the extension index.
pub async fn index() -> Json<Value> {
    let actions: Vec<_> = ActionKind::ALL
        .iter()
        .map(|kind| json!({"method": "GET", "path": format!("/actions/{}", kind.id())}))
        .collect();
    let discoveries: Vec<_> = DiscoveryKind::ALL
        .iter()
        .map(|kind| json!({"method": "GET", "path": format!("/discovery/{}", kind.target_type())}))
        .collect();
    let event_listeners: Vec<_> = EventListener::ALL
        .iter()
        .map(|listener| listener.description())
        .collect();

    Json(json!({
        "actions": actions,
        "discoveries": discoveries,
        "eventListeners": event_listeners,
    }))
}

/// Handle GET /health/liveness.
pub async fn liveness<C: NewRelicApi>(State(state): AppStateRef<C>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.uptime_secs(),
    })
}

/// Handle GET /health/readiness - 503 until startup wiring has finished.
pub async fn readiness<C: NewRelicApi>(State(state): AppStateRef<C>) -> Response {
    let ready = state.is_ready();
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let body = HealthResponse {
        status: if ready { "ok" } else { "starting" },
        uptime_secs: state.uptime_secs(),
    };
    (status, Json(body)).into_response()
}

/// Handle GET /actions/{id} - the action descriptor.
pub async fn describe_action(Path(id): Path<String>) -> ExtensionResult<Json<Value>> {
    Ok(Json(ActionKind::from_id(&id)?.descriptor()))
}

/// Handle POST /actions/{id}/prepare.
pub async fn prepare_action<C: NewRelicApi>(
    State(state): AppStateRef<C>,
    Path(id): Path<String>,
    Json(request): Json<PrepareRequest>,
) -> ExtensionResult<Json<PrepareResult>> {
    let kind = ActionKind::from_id(&id)?;
    let instance = ActionInstance::prepare(kind, &request, Utc::now())?;
    state.register(request.execution_id, instance);
    info!(action = kind.id(), execution_id = %request.execution_id, "prepared action");

    Ok(Json(PrepareResult {
        state: ActionState {
            execution_id: request.execution_id,
        },
    }))
}

/// Handle POST /actions/{id}/start.
pub async fn start_action<C: NewRelicApi>(
    State(state): AppStateRef<C>,
    Path(id): Path<String>,
    Json(request): Json<StateRequest>,
) -> ExtensionResult<Json<StartResult>> {
    let instance = lookup(&state, &id, request.state)?;
    let mut instance = instance.lock().await;
    let result = instance.start(state.api(), Utc::now()).await?;
    info!(action = %id, execution_id = %request.state.execution_id, "started action");
    Ok(Json(result))
}

/// Handle POST /actions/{id}/status. Completed steps are dropped.
pub async fn action_status<C: NewRelicApi>(
    State(state): AppStateRef<C>,
    Path(id): Path<String>,
    Json(request): Json<StateRequest>,
) -> ExtensionResult<Json<StatusResult>> {
    let execution_id = request.state.execution_id;
    let instance = lookup(&state, &id, request.state)?;
    let result = instance.lock().await.status(state.api(), Utc::now()).await?;
    if result.completed {
        state.unregister(execution_id);
        debug!(action = %id, %execution_id, "action completed");
    }
    Ok(Json(result))
}

/// Handle POST /actions/{id}/stop. Stopping an unknown step is a no-op.
///
/// A step whose stop fails stays registered so the platform can retry.
pub async fn stop_action<C: NewRelicApi>(
    State(state): AppStateRef<C>,
    Path(id): Path<String>,
    Json(request): Json<StateRequest>,
) -> ExtensionResult<Json<StopResult>> {
    let execution_id = request.state.execution_id;
    let instance = match lookup(&state, &id, request.state) {
        Ok(instance) => instance,
        Err(ExtensionError::ExecutionNotFound(_)) => return Ok(Json(StopResult::default())),
        Err(e) => return Err(e),
    };
    let result = instance.lock().await.stop(state.api()).await?;
    state.unregister(execution_id);
    info!(action = %id, %execution_id, "stopped action");
    Ok(Json(result))
}

fn lookup<C: NewRelicApi>(
    state: &AppState<C>,
    action_id: &str,
    action_state: ActionState,
) -> ExtensionResult<SharedInstance> {
    let kind = ActionKind::from_id(action_id)?;
    let (registered, instance) = state.instance(action_state.execution_id)?;
    if registered != kind {
        return Err(ExtensionError::BadRequest {
            title: format!(
                "Execution {} belongs to {}, not {action_id}",
                action_state.execution_id,
                registered.id()
            ),
            detail: None,
        });
    }
    Ok(instance)
}

/// Handle GET /discovery/{type} - the discovery description.
pub async fn describe_discovery(Path(target_type): Path<String>) -> ExtensionResult<Json<Value>> {
    Ok(Json(DiscoveryKind::from_target_type(&target_type)?.description()))
}

/// Handle GET /discovery/{type}/targets.
pub async fn discovered_targets<C: NewRelicApi>(
    State(state): AppStateRef<C>,
    Path(target_type): Path<String>,
) -> ExtensionResult<Json<DiscoveredTargets>> {
    let kind = DiscoveryKind::from_target_type(&target_type)?;
    Ok(Json(DiscoveredTargets {
        targets: state.targets(kind).targets(),
    }))
}

/// Handle POST /events/{name}.
pub async fn receive_event<C: NewRelicApi>(
    State(state): AppStateRef<C>,
    Path(name): Path<String>,
    body: Bytes,
) -> ExtensionResult<Json<Value>> {
    let listener = EventListener::from_name(&name)?;
    state.events().forward(state.api(), listener, &body).await?;
    Ok(Json(json!({})))
}
