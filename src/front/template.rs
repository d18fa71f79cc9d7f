use std::{fs, path::Path, sync::Arc};

use anyhow::anyhow;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use handlebars::handlebars_helper;
use serde::Serialize;

#[derive(Clone)]
pub struct Template {
    r: Arc<handlebars::Handlebars<'static>>,
}

impl Template {
    /// Registers every file of `dir` under its file name, e.g. `ledger.page.hbs`.
    pub fn new(dir: &Path) -> anyhow::Result<Self> {
        let mut handlebars = handlebars::Handlebars::new();
        for entity in fs::read_dir(dir)? {
            let entity = entity?;
            let name = entity
                .file_name()
                .into_string()
                .map_err(|n| anyhow!("template name is not utf-8: {:?}", n))?;
            handlebars
                .register_template_file(&name, entity.path())
                .map_err(|err| anyhow!("cannot register template '{}': {}", name, err))?;
        }

        handlebars_helper!(nor_amt: |v: f64| format!("{:.02}", v));
        handlebars.register_helper("nor_amt", Box::new(nor_amt));

        Ok(Self {
            r: Arc::new(handlebars),
        })
    }

    pub fn render<T>(&self, name: &str, data: &T) -> Response
    where
        T: Serialize,
    {
        log::debug!("render '{}'", name);
        match self.r.render(name, data) {
            Ok(html) => Html(html).into_response(),
            Err(err) => {
                log::error!("cannot render '{}': {}", name, err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to render template. Error: {err}"),
                )
                    .into_response()
            }
        }
    }
}
