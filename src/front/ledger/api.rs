use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Datelike;
use serde::Deserialize;

use crate::{
    error::AppResult,
    front::AppState,
    ledger::{self, dashboard, export, LedgerFilter},
    models::{Transaction, TransactionType},
};

#[derive(Deserialize, Debug)]
pub struct LedgerQuery {
    workspace_id: Option<i64>,
    #[serde(rename = "type")]
    kind: Option<TransactionType>,
    q: Option<String>,
}

impl LedgerQuery {
    fn filter(&self) -> LedgerFilter {
        LedgerFilter {
            kind: self.kind,
            q: self.q.clone(),
        }
    }
}

#[axum::debug_handler]
pub async fn get(
    State(s): State<AppState>,
    Query(q): Query<LedgerQuery>,
) -> AppResult<Json<Vec<Transaction>>> {
    log::info!("GET /ledger - query: {:?}", q);
    let all = ledger::build_ledger(&s.stores, q.workspace_id).await;
    Ok(Json(q.filter().apply(all)))
}

#[axum::debug_handler]
pub async fn export_csv(
    State(s): State<AppState>,
    Query(q): Query<LedgerQuery>,
) -> AppResult<Response> {
    log::info!("GET /ledger/export.csv - query: {:?}", q);
    let all = ledger::build_ledger(&s.stores, q.workspace_id).await;
    let body = export::to_csv(&q.filter().apply(all))?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"ledger.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}

#[derive(Deserialize, Debug)]
pub struct DashboardQuery {
    workspace_id: Option<i64>,
    year: Option<i32>,
}

#[axum::debug_handler]
pub async fn get_dashboard(
    State(s): State<AppState>,
    Query(q): Query<DashboardQuery>,
) -> AppResult<Json<dashboard::DashboardSummary>> {
    log::info!("GET /dashboard - query: {:?}", q);
    let year = q.year.unwrap_or_else(|| chrono::Local::now().year());
    let all = ledger::build_ledger(&s.stores, q.workspace_id).await;
    Ok(Json(dashboard::summarize(&all, year)))
}
