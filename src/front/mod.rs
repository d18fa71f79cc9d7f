pub mod components;
pub mod forms;
pub mod identity;
pub mod ledger;
pub mod template;
pub mod workspaces;

use anyhow::Context;
use axum::{
    http::{HeaderValue, Method},
    response::Redirect,
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

use crate::{config::Config, store::Stores};

#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub t: template::Template,
}

pub fn new_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/ledger/page") }))
        .nest("/workspaces", workspaces::new_router())
        .nest("/expense-forms", forms::new_router())
        .nest("/ledger", ledger::new_router())
        .route("/dashboard", get(ledger::api::get_dashboard))
        .with_state(state)
}

pub async fn start_web_server(config: &Config, stores: Stores) -> anyhow::Result<()> {
    log::info!("loading templates from {}", config.templates_dir.display());
    let t = template::Template::new(&config.templates_dir)?;

    let mut app = new_router(AppState { stores, t })
        .nest_service("/public", ServeDir::new(&config.public_dir));

    if let Some(origin) = &config.cors_origin {
        let origin = origin
            .parse::<HeaderValue>()
            .with_context(|| format!("invalid CORS origin '{}'", origin))?;
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers(Any),
        );
    }

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    log::info!("listening on http://{}", config.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
