use axum::Json;
use axum::extract::Query;
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::{EnrollmentRow, Semester};
use crate::services::{QueryService, SyncOrchestrator, SyncOutcome};
use crate::state::AppState;

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    name: String,
    semester: Option<String>,
    grade: Option<String>,
}

#[derive(Deserialize)]
struct SyncRequest {
    #[serde(default)]
    force: bool,
    first_group: Option<u32>,
    last_group: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/semesters", get(list_semesters))
        .route("/students/search", get(search_students))
        .route("/sync", post(sync_now))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.store.list_semesters().await?;
    Ok(StatusCode::OK)
}

async fn list_semesters(State(state): State<AppState>) -> Result<Json<Vec<Semester>>, AppError> {
    let semesters = QueryService::new(state.store.clone()).list_semesters().await?;
    Ok(Json(semesters))
}

async fn search_students(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<EnrollmentRow>>, AppError> {
    let name = params.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }

    let rows = QueryService::new(state.store.clone())
        .search(
            name,
            params.semester.as_deref().map(str::trim),
            params.grade.as_deref().map(str::trim),
        )
        .await?;
    Ok(Json(rows))
}

async fn sync_now(
    State(state): State<AppState>,
    Query(req): Query<SyncRequest>,
) -> Result<Json<SyncOutcome>, AppError> {
    let first = req.first_group.unwrap_or(state.sync.first_group);
    let last = req.last_group.unwrap_or(state.sync.last_group);
    if first == 0 || first > last || last > state.sync.last_group {
        return Err(AppError::BadRequest(format!(
            "invalid class group range {}..={} (allowed within 1..={})",
            first, last, state.sync.last_group
        )));
    }

    let _guard = state
        .sync_lock
        .try_lock()
        .map_err(|_| AppError::Conflict("a sync is already running".to_string()))?;

    let orchestrator = SyncOrchestrator::new(state.store.clone(), state.connector.clone())
        .with_request_delay(state.sync.request_delay());
    let outcome = orchestrator.run(first..=last, req.force).await?;
    Ok(Json(outcome))
}
