use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, response::Html, routing::get, Json, Router};
use riskdash_core::metrics::{LoanKpis, VerificationCounts};
use riskdash_core::{Dashboard, DashboardConfig, DashboardData};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    config: Arc<DashboardConfig>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct SummaryResponse {
    period: String,
    loan_kpis: LoanKpis,
    verification_counts: VerificationCounts,
}

pub fn router(config: DashboardConfig) -> Router {
    let state = AppState {
        config: Arc::new(config),
    };

    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/summary", get(summary))
        .with_state(state)
}

pub async fn serve(config: DashboardConfig) -> Result<()> {
    let bind = config.server.bind.clone();
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router(config).into_make_service()).await?;
    Ok(())
}

/// Run a blocking dashboard build off the async workers.
async fn build_with<T, F>(state: &AppState, build: F) -> Result<T, StatusCode>
where
    T: Send + 'static,
    F: FnOnce(&DashboardConfig) -> riskdash_core::Result<T> + Send + 'static,
{
    let config = Arc::clone(&state.config);
    tokio::task::spawn_blocking(move || build(config.as_ref()))
        .await
        .map_err(|err| {
            error!("dashboard task failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|err| {
            error!("dashboard build failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, StatusCode> {
    let page = build_with(&state, |config| Dashboard::build(config)?.render_page()).await?;
    Ok(Html(page))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn summary(State(state): State<AppState>) -> Result<Json<SummaryResponse>, StatusCode> {
    let data = build_with(&state, DashboardData::build).await?;
    Ok(Json(SummaryResponse {
        period: data.period,
        loan_kpis: data.loan_kpis,
        verification_counts: data.verification_counts,
    }))
}
