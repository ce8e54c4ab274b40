use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tenant_metrics::{run_tenant, InvalidTenant, RunReport, Settings};

struct AppError(anyhow::Error);

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError(error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<InvalidTenant>().is_some() {
            StatusCode::BAD_REQUEST
        } else {
            error!(error = ?self.0, "metrics run failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": format!("{:#}", self.0) }))).into_response()
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn trigger_run(
    State(settings): State<Arc<Settings>>,
    Path(tenant): Path<String>,
) -> Result<Json<RunReport>, AppError> {
    let report = run_tenant(&settings, &tenant).await?;
    Ok(Json(report))
}

fn app(settings: Arc<Settings>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tenants/:tenant/runs", post(trigger_run))
        .with_state(settings)
}

async fn serve(settings: Settings) -> Result<()> {
    let addr: SocketAddr = settings
        .listen
        .parse()
        .with_context(|| format!("invalid listen address {}", settings.listen))?;
    info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(app(Arc::new(settings)).into_make_service())
        .await
        .context("serving http")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [] | ["serve"] => serve(settings).await,
        ["run", tenant] => {
            let report = run_tenant(&settings, tenant).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        _ => bail!("usage: tenant-metrics [serve | run <tenant>]"),
    }
}
