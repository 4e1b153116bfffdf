//! HTTP routes served by the embedded web runtime.

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use serde_json::{Value, json};

use super::options::ServiceOptions;
use crate::context::RunContext;
use crate::port::{PortHandoff, UNSET_PORT};

pub(crate) fn router(context: RunContext) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/port", get(port))
        .with_state(context)
}

fn bound_port(ctx: &RunContext) -> u16 {
    ctx.get::<PortHandoff>()
        .map(|handoff| handoff.read())
        .unwrap_or(UNSET_PORT)
}

async fn index(State(ctx): State<RunContext>) -> Html<String> {
    let port = bound_port(&ctx);
    let app_name = ctx
        .get::<ServiceOptions>()
        .map(|options| options.app_name.clone())
        .unwrap_or_default();

    tracing::info!("hello");
    tracing::info!(port, "running http port");

    Html(format!(
        "<html><body><h1>Hello from {}</h1><p>running http port = {}</p></body></html>",
        app_name, port
    ))
}

async fn port(State(ctx): State<RunContext>) -> Json<Value> {
    Json(json!({ "port": bound_port(&ctx) }))
}
