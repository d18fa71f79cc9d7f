use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;

use super::{identity::Caller, AppState};
use crate::{
    error::AppResult,
    forms::{entries, schema},
    models::{ExpenseEntry, ExpenseForm, NewEntry, NewForm},
};

pub fn new_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_forms).post(create_form))
        .route("/:id", delete(delete_form))
        .route("/entries", get(list_entries).post(create_entry))
        .route("/entries/:id", delete(delete_entry))
}

#[derive(Deserialize)]
struct FormsQuery {
    workspace_id: i64,
}

#[derive(Deserialize)]
struct DeleteFormQuery {
    #[serde(default)]
    cascade: bool,
}

#[derive(Deserialize)]
struct EntriesQuery {
    form_id: i64,
}

#[axum::debug_handler]
async fn create_form(
    State(s): State<AppState>,
    Caller(user): Caller,
    Json(form): Json<NewForm>,
) -> AppResult<(StatusCode, Json<ExpenseForm>)> {
    log::info!("POST /expense-forms by user {} - '{}'", user, form.name);
    let created = schema::create_form(&s.stores, form).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[axum::debug_handler]
async fn list_forms(
    State(s): State<AppState>,
    Query(q): Query<FormsQuery>,
) -> AppResult<Json<Vec<ExpenseForm>>> {
    log::info!("GET /expense-forms?workspace_id={}", q.workspace_id);
    Ok(Json(schema::list_forms(&s.stores, q.workspace_id).await?))
}

#[axum::debug_handler]
async fn delete_form(
    State(s): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<i64>,
    Query(q): Query<DeleteFormQuery>,
) -> AppResult<Json<schema::FormDeletion>> {
    log::info!(
        "DELETE /expense-forms/{} by user {} (cascade={})",
        id,
        user,
        q.cascade
    );
    Ok(Json(schema::delete_form(&s.stores, id, q.cascade).await?))
}

#[axum::debug_handler]
async fn create_entry(
    State(s): State<AppState>,
    Caller(user): Caller,
    Json(entry): Json<NewEntry>,
) -> AppResult<(StatusCode, Json<ExpenseEntry>)> {
    log::info!(
        "POST /expense-forms/entries by user {} - form {}",
        user,
        entry.form_id
    );
    let created = entries::create_entry(&s.stores, user, entry).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[axum::debug_handler]
async fn list_entries(
    State(s): State<AppState>,
    Query(q): Query<EntriesQuery>,
) -> AppResult<Json<Vec<ExpenseEntry>>> {
    log::info!("GET /expense-forms/entries?form_id={}", q.form_id);
    Ok(Json(entries::list_entries(&s.stores, q.form_id).await?))
}

#[axum::debug_handler]
async fn delete_entry(
    State(s): State<AppState>,
    Caller(user): Caller,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    log::info!("DELETE /expense-forms/entries/{} by user {}", id, user);
    entries::delete_entry(&s.stores, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
