//! REST API Handlers
//!
//! Implements the REST API endpoints for LUN selection, node storage roles,
//! requirements, alerts, and filesystem and cluster creation.

use crate::controlplane::console::{NodeView, StorageConsole, ToggleOutcome};
use crate::controlplane::state::Alert;
use crate::engine::{Lun, RequirementCheck};
use crate::error::{Error, ErrorAction};
use axum::{
    extract::{Json, Path, State},
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Select or deselect one or all LUNs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSelectedRequest {
    pub selected: bool,
}

/// Add or remove the storage role on a node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRoleRequest {
    pub enabled: bool,
}

/// Filesystem creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFilesystemRequest {
    pub name: String,
}

/// Created resource summary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

/// Requirements check with its one-line-per-violation message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementsResponse {
    pub passes: bool,
    pub message: String,
    #[serde(flatten)]
    pub check: RequirementCheck,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiErrorResponse {
    fn from_error(error: &Error) -> (StatusCode, Self) {
        let (status, code) = match error {
            Error::NodeNotFound { .. } | Error::ResourceNotFound { .. } => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            Error::MutationInFlight { .. } => (StatusCode::CONFLICT, "mutation_in_flight"),
            Error::ResourceExists { .. } => (StatusCode::CONFLICT, "already_exists"),
            Error::InvalidFilesystemName { .. } => (StatusCode::BAD_REQUEST, "invalid_name"),
            Error::NoLunsSelected => (StatusCode::BAD_REQUEST, "no_luns_selected"),
            Error::RequirementsNotMet(_) => {
                (StatusCode::PRECONDITION_FAILED, "requirements_not_met")
            }
            Error::Kube(_) | Error::MutationFailed { .. } => {
                (StatusCode::BAD_GATEWAY, "mutation_failed")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        (
            status,
            Self {
                error: code.into(),
                message: error.to_string(),
                details: None,
            },
        )
    }
}

fn error_response(error: Error) -> Response {
    let (status, body) = ApiErrorResponse::from_error(&error);
    let mut response = (status, Json(body)).into_response();
    if let ErrorAction::RequeueAfter(delay) = error.action() {
        if let Ok(value) = HeaderValue::from_str(&delay.as_secs().to_string()) {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
    }
    response
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    console: Arc<StorageConsole>,
}

impl RestRouter {
    /// Create a new REST router
    pub fn new(console: Arc<StorageConsole>) -> Self {
        Self { console }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            console: self.console,
        };

        Router::new()
            // LUN endpoints
            .route("/v1/luns", get(list_luns))
            .route("/v1/luns/selected", put(set_all_luns_selected))
            .route("/v1/luns/:wwn/selected", put(set_lun_selected))
            // Node endpoints
            .route("/v1/nodes", get(list_nodes))
            .route("/v1/nodes/:name/storage-role", put(set_storage_role))
            // Requirements and alerts
            .route("/v1/requirements", get(get_requirements))
            .route("/v1/alerts", get(list_alerts))
            .route("/v1/alerts/:id", delete(dismiss_alert))
            // Creation endpoints
            .route("/v1/filesystems", post(create_filesystem))
            .route("/v1/cluster", post(create_cluster))
            // Health endpoint
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    console: Arc<StorageConsole>,
}

// =============================================================================
// Handlers
// =============================================================================

/// List candidate LUNs
async fn list_luns(State(state): State<AppState>) -> Json<Vec<Lun>> {
    Json(state.console.luns())
}

/// Select or deselect one LUN
async fn set_lun_selected(
    State(state): State<AppState>,
    Path(wwn): Path<String>,
    Json(request): Json<SetSelectedRequest>,
) -> Response {
    debug!(wwn = %wwn, selected = request.selected, "Setting LUN selection");
    match state.console.set_lun_selected(&wwn, request.selected) {
        Ok(()) => (StatusCode::OK, Json(state.console.luns())).into_response(),
        Err(e) => error_response(e),
    }
}

/// Select or deselect every LUN
async fn set_all_luns_selected(
    State(state): State<AppState>,
    Json(request): Json<SetSelectedRequest>,
) -> Json<Vec<Lun>> {
    state.console.set_all_luns_selected(request.selected);
    Json(state.console.luns())
}

/// List storage-eligible nodes
async fn list_nodes(State(state): State<AppState>) -> Json<Vec<NodeView>> {
    Json(state.console.nodes())
}

/// Add or remove the storage role label
async fn set_storage_role(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<StorageRoleRequest>,
) -> Response {
    info!(node = %name, enabled = request.enabled, "Storage role change requested");
    match state
        .console
        .toggle_node_storage_role(&name, request.enabled)
        .await
    {
        Ok(outcome @ ToggleOutcome::RolledBack { .. }) => {
            (StatusCode::BAD_GATEWAY, Json(outcome)).into_response()
        }
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Minimum requirements state
async fn get_requirements(State(state): State<AppState>) -> Json<RequirementsResponse> {
    let check = state.console.requirements();
    Json(RequirementsResponse {
        passes: check.passes(),
        message: check.message(),
        check,
    })
}

/// Current alerts
async fn list_alerts(State(state): State<AppState>) -> Json<Vec<Alert>> {
    Json(state.console.ui().alerts)
}

/// Dismiss an alert
async fn dismiss_alert(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if state.console.dismiss_alert(&id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(Error::ResourceNotFound {
            kind: "Alert".into(),
            name: id,
        })
    }
}

/// Create a FileSystemClaim from the selected LUNs
async fn create_filesystem(
    State(state): State<AppState>,
    Json(request): Json<CreateFilesystemRequest>,
) -> Response {
    match state.console.create_filesystem(&request.name).await {
        Ok(claim) => (
            StatusCode::CREATED,
            Json(CreatedResponse {
                kind: "FileSystemClaim".into(),
                name: request.name,
                namespace: claim.metadata.namespace,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Create the storage cluster
async fn create_cluster(State(state): State<AppState>) -> Response {
    match state.console.create_storage_cluster().await {
        Ok(cluster) => (
            StatusCode::CREATED,
            Json(CreatedResponse {
                kind: "Cluster".into(),
                name: cluster.metadata.name.unwrap_or_default(),
                namespace: cluster.metadata.namespace,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness check
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.console.is_loaded() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "watches not loaded")
    }
}
