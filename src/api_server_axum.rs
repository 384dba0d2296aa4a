use crate::models::Grid;
use crate::oi::GridHandle;
use anyhow::{Context, Result};
use axum::{extract::State, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

// -----------------------------------------------
// API RESPONSE MODELS
// -----------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub processing_time_ms: Option<u64>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T, started: Instant) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            processing_time_ms: Some(started.elapsed().as_millis() as u64),
        }
    }

    fn err(error: impl Into<String>, started: Instant) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            processing_time_ms: Some(started.elapsed().as_millis() as u64),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GridResponse {
    /// Seconds since the grid was generated
    pub stale_secs: i64,
    #[serde(flatten)]
    pub grid: Grid,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: u64,
    pub last_cycle: Option<u64>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

// -----------------------------------------------
// APPLICATION STATE
// -----------------------------------------------

#[derive(Clone)]
pub struct AppState {
    grid: GridHandle,
    started: Instant,
}

impl AppState {
    pub fn new(grid: GridHandle) -> Self {
        Self {
            grid,
            started: Instant::now(),
        }
    }
}

// -----------------------------------------------
// API HANDLERS
// -----------------------------------------------

/// GET /api/grid - Latest published OI change grid
async fn get_grid(State(app_state): State<AppState>) -> Json<ApiResponse<GridResponse>> {
    let start_time = Instant::now();
    debug!("GET /api/grid");

    match app_state.grid.latest() {
        Some(grid) => {
            let stale_secs = (Utc::now() - grid.generated_at).num_seconds().max(0);
            Json(ApiResponse::ok(
                GridResponse {
                    stale_secs,
                    grid: (*grid).clone(),
                },
                start_time,
            ))
        }
        None => Json(ApiResponse::err("grid not yet available", start_time)),
    }
}

/// GET /api/health - Liveness plus last cycle info
async fn get_health(State(app_state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let start_time = Instant::now();
    debug!("GET /api/health");
    let latest = app_state.grid.latest();

    Json(ApiResponse::ok(
        HealthResponse {
            status: "ok",
            uptime_secs: app_state.started.elapsed().as_secs(),
            last_cycle: latest.as_ref().map(|g| g.cycle),
            last_cycle_at: latest.as_ref().map(|g| g.generated_at),
        },
        start_time,
    ))
}

// -----------------------------------------------
// SERVER SETUP
// -----------------------------------------------

pub fn router(grid: GridHandle) -> Router {
    Router::new()
        .route("/api/grid", get(get_grid))
        .route("/api/health", get(get_health))
        .layer(CorsLayer::permissive())
        .with_state(AppState::new(grid))
}

/// Serve the grid until `cancel` fires
pub async fn start_server(port: u16, grid: GridHandle, cancel: CancellationToken) -> Result<()> {
    let app = router(grid);

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(%addr, "OI API server running");
    info!("endpoints: GET /api/grid, GET /api/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("API server failed")?;

    info!("OI API server stopped");
    Ok(())
}
