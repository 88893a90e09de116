//! # HTTP API
//!
//! JSON API over the tracker. All mutations are serialised through one
//! `tokio::sync::Mutex`; a mutation is persisted before its response is
//! sent, and if persisting fails the in-memory state is reloaded from the
//! store so memory never runs ahead of disk.
//!
//! ## Endpoints
//!
//! | Method | Path                            | Notes                          |
//! |--------|---------------------------------|--------------------------------|
//! | GET    | `/health`                       |                                |
//! | POST   | `/actors`                       | register an actor              |
//! | POST   | `/commands`                     | acting actor in `x-actor-id`   |
//! | GET    | `/researchers/{id}/dashboard`   |                                |
//! | GET    | `/grants/{id}`                  | grant of proposal `id`         |
//! | GET    | `/departments/{hod}/summary`    |                                |
//! | GET    | `/actors/{id}/notifications`    | newest first                   |

use crate::dispatch::{Dispatcher, Outcome};
use crate::forms::{CommandForm, FormValidator, StrictForms};
use crate::store::Store;
use crate::views::{self, Dashboard, GrantDetail};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rgms_core::{
    ActorId, DepartmentSummary, ErrorKind, Notification, ProposalId, RgmsError, Tracker,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Header carrying the acting actor id.
pub const ACTOR_HEADER: &str = "x-actor-id";

// =============================================================================
// STATE
// =============================================================================

/// Shared server state.
pub struct AppState {
    tracker: Mutex<Tracker>,
    store: Store,
}

impl AppState {
    /// Load the tracker from `store`.
    pub fn new(store: Store) -> rgms_core::Result<Self> {
        let tracker = store.load()?;
        Ok(Self {
            tracker: Mutex::new(tracker),
            store,
        })
    }

    /// Apply `op` and persist it. On a failed save the tracker is reloaded.
    async fn mutate<T>(
        &self,
        op: impl FnOnce(&mut Tracker) -> rgms_core::Result<T>,
    ) -> Result<T, ApiError> {
        let mut tracker = self.tracker.lock().await;
        let base = tracker.revision();
        let out = op(&mut tracker)?;
        if tracker.revision() != base {
            if let Err(err) = self.store.save(&tracker, base) {
                error!(%err, "save failed, reloading state");
                match self.store.load() {
                    Ok(fresh) => *tracker = fresh,
                    Err(reload) => error!(%reload, "reload failed, memory may be ahead of disk"),
                }
                return Err(err.into());
            }
        }
        Ok(out)
    }

    async fn read<T>(
        &self,
        op: impl FnOnce(&Tracker) -> rgms_core::Result<T>,
    ) -> Result<T, ApiError> {
        let tracker = self.tracker.lock().await;
        Ok(op(&tracker)?)
    }
}

pub type SharedState = Arc<AppState>;

// =============================================================================
// ERRORS
// =============================================================================

/// Error response: `{ "kind": ..., "error": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: ErrorKind::InvalidInput,
            message: message.into(),
        }
    }
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InsufficientFunds
        | ErrorKind::BudgetExceeded
        | ErrorKind::IllegalStateTransition
        | ErrorKind::DuplicateEvaluation
        | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidInput | ErrorKind::InvalidDateRange => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<RgmsError> for ApiError {
    fn from(err: RgmsError) -> Self {
        let kind = err.kind();
        Self {
            status: status_for(kind),
            kind,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "kind": self.kind, "error": self.message })),
        )
            .into_response()
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the API router.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/actors", post(register_actor))
        .route("/commands", post(execute_command))
        .route("/researchers/{id}/dashboard", get(dashboard))
        .route("/grants/{id}", get(grant))
        .route("/departments/{hod}/summary", get(department_summary))
        .route("/actors/{id}/notifications", get(notifications))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Serve the API on `addr` until the process is stopped.
pub async fn serve(addr: SocketAddr, store: Store) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(store)?);
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "rgms API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn health(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let revision = state.tracker.lock().await.revision();
    Json(json!({ "status": "ok", "revision": revision }))
}

#[derive(Debug, Deserialize)]
struct RegisterActor {
    name: String,
    role: String,
    #[serde(default)]
    department: String,
}

#[derive(Debug, Serialize)]
struct Registered {
    id: ActorId,
}

async fn register_actor(
    State(state): State<SharedState>,
    Json(body): Json<RegisterActor>,
) -> Result<(StatusCode, Json<Registered>), ApiError> {
    let role = StrictForms::today().role(&body.role)?;
    let id = state
        .mutate(|t| t.register_actor(&body.name, role, &body.department))
        .await?;
    Ok((StatusCode::CREATED, Json(Registered { id })))
}

fn acting_actor(headers: &HeaderMap) -> Result<ActorId, ApiError> {
    let raw = headers
        .get(ACTOR_HEADER)
        .ok_or_else(|| ApiError::bad_request(format!("missing {ACTOR_HEADER} header")))?;
    raw.to_str()
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .map(ActorId)
        .ok_or_else(|| ApiError::bad_request(format!("{ACTOR_HEADER} must be an actor id")))
}

async fn execute_command(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(form): Json<CommandForm>,
) -> Result<Json<Outcome>, ApiError> {
    let actor = acting_actor(&headers)?;
    let command = StrictForms::today().command(form)?;
    let outcome = state
        .mutate(|t| Dispatcher::new(t).execute(actor, command))
        .await?;
    Ok(Json(outcome))
}

async fn dashboard(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<Json<Dashboard>, ApiError> {
    Ok(Json(state.read(|t| views::dashboard(t, ActorId(id))).await?))
}

async fn grant(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<Json<GrantDetail>, ApiError> {
    Ok(Json(state.read(|t| views::grant_detail(t, ProposalId(id))).await?))
}

async fn department_summary(
    State(state): State<SharedState>,
    Path(hod): Path<u64>,
) -> Result<Json<DepartmentSummary>, ApiError> {
    Ok(Json(state.read(|t| t.department_summary(ActorId(hod))).await?))
}

async fn notifications(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(state.read(|t| views::notifications(t, ActorId(id))).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_statuses() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::InsufficientFunds), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::InvalidDateRange), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::Unauthorized), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::Persistence), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
