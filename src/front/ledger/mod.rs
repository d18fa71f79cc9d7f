pub mod api;

use axum::{
    extract::{Query, State},
    response::Response,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};

use super::{components::table, AppState};
use crate::{error::AppResult, ledger, models::Transaction, workspaces};

pub fn new_router() -> Router<AppState> {
    Router::new()
        .route("/", get(api::get))
        .route("/export.csv", get(api::export_csv))
        .route("/page", get(page))
}

#[derive(Deserialize, Debug)]
struct PageQuery {
    workspace_id: Option<i64>,
    page: Option<u32>,
    entries_per_page: Option<u32>,
}

#[derive(Serialize, Default)]
struct Record {
    date: String,
    #[serde(rename = "type")]
    kind: String,
    category: String,
    detail: String,
    amount: f64,
    comment: String,
}

impl From<&Transaction> for Record {
    fn from(t: &Transaction) -> Self {
        Record {
            date: t.date.clone(),
            kind: t.kind.as_str().to_string(),
            category: t.category.clone(),
            detail: t.sub_type.clone().unwrap_or_default(),
            amount: t.amount,
            comment: t.comment.clone(),
        }
    }
}

#[axum_macros::debug_handler]
async fn page(State(s): State<AppState>, Query(q): Query<PageQuery>) -> AppResult<Response> {
    log::info!("GET /ledger/page - query: {:?}", q);

    let workspace = match q.workspace_id {
        Some(id) => Some(workspaces::get_workspace(&s.stores, id).await?),
        None => None,
    };

    let query = table::Query {
        page: q.page,
        entries_per_page: q.entries_per_page,
    }
    .normalize();

    let all = ledger::build_ledger(&s.stores, q.workspace_id).await;
    let records: Vec<Record> = query.page_of(&all).iter().map(Record::from).collect();
    let base = match q.workspace_id {
        Some(id) => format!("/ledger/page?workspace_id={}", id),
        None => "/ledger/page".to_string(),
    };
    let table = table::TableComponent::new(records, all.len(), base, query)?;

    #[derive(Serialize)]
    struct Ctx {
        workspace: Option<String>,
        data: table::TableComponent<Record>,
    }

    let ctx = Ctx {
        workspace: workspace.map(|w| w.name),
        data: table,
    };

    Ok(s.t.render("ledger.page.hbs", &ctx))
}
