use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::{identity::Caller, AppState};
use crate::{error::AppResult, models::Workspace, workspaces};

pub fn new_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).delete(remove))
}

#[derive(Deserialize)]
struct NewWorkspace {
    name: String,
}

#[axum::debug_handler]
async fn create(
    State(s): State<AppState>,
    Caller(user): Caller,
    Json(ws): Json<NewWorkspace>,
) -> AppResult<(StatusCode, Json<Workspace>)> {
    log::info!("POST /workspaces by user {} - '{}'", user, ws.name);
    let created = workspaces::create_workspace(&s.stores, &ws.name, user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[axum::debug_handler]
async fn list(State(s): State<AppState>) -> AppResult<Json<Vec<Workspace>>> {
    log::info!("GET /workspaces");
    Ok(Json(s.stores.workspaces.list_workspaces().await?))
}

#[axum::debug_handler]
async fn show(State(s): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Workspace>> {
    log::info!("GET /workspaces/{}", id);
    Ok(Json(workspaces::get_workspace(&s.stores, id).await?))
}

#[axum::debug_handler]
async fn remove(
    State(s): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    log::info!("DELETE /workspaces/{} by user {}", id, user);
    workspaces::delete_workspace(&s.stores, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
