//! Dispatch server.
//!
//! HTTP API for zone lookup, route assignment and route lifecycle changes,
//! backed by the embedded store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use fieldzone::assignment::{AssignmentBatchResult, AssignmentEngine, WorkloadRecommendations};
use fieldzone::config::Config;
use fieldzone::models::{GeoPoint, InspectorId, Route, RouteAction, RouteId, Zone};
use fieldzone::pip::{ZoneClassifier, ZoneDetection};
use fieldzone::routing::{optimize_route, RouteOptimization};
use fieldzone::store::{SledStore, StoreError, ZoneStore};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "dispatch")]
#[command(about = "Zone lookup and inspector dispatch server")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config
    #[arg(short, long)]
    listen: Option<String>,

    /// Store directory, overrides the config
    #[arg(long)]
    store: Option<PathBuf>,
}

/// Application state shared across handlers
struct AppState {
    store: SledStore,
    config: Config,
}

impl AppState {
    fn engine(&self) -> AssignmentEngine<'_, SledStore> {
        AssignmentEngine::new(&self.store, self.config.assignment.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(store) = args.store {
        config.store.path = store;
    }

    info!("Fieldzone Dispatch Server");
    let store = SledStore::open(&config.store.path).context("Failed to open store")?;
    let zones = store.find_all_active().await?;
    info!("Loaded store with {} active zones", zones.len());

    let listen = config.server.listen.clone();
    let state = Arc::new(AppState { store, config });

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/zones", get(zones_handler))
        .route("/v1/zones/lookup", get(lookup_handler))
        .route("/v1/assignments", post(assign_handler))
        .route("/v1/assignments/pending", post(assign_pending_handler))
        .route(
            "/v1/assignments/recommendations",
            get(recommendations_handler),
        )
        .route("/v1/inspectors/{id}/reassign", post(reassign_handler))
        .route("/v1/routes/{id}/optimize", post(optimize_handler))
        .route("/v1/routes/{id}/{action}", post(transition_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", listen);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    store: bool,
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let healthy = state.store.find_all_active().await.is_ok();
    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        store: healthy,
    })
}

/// Active zones
async fn zones_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Zone>>, (StatusCode, String)> {
    let zones = state
        .store
        .find_all_active()
        .await
        .map_err(|e| internal("Zone listing", e))?;
    Ok(Json(zones))
}

#[derive(Debug, Deserialize)]
struct LookupParams {
    lat: f64,
    lon: f64,
}

/// Containing or nearest zone of a coordinate
async fn lookup_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> Result<Json<ZoneDetection>, (StatusCode, String)> {
    let point = GeoPoint::new(params.lat, params.lon)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(Json(ZoneClassifier::new(&state.store).detect(&point).await))
}

#[derive(Debug, Deserialize)]
struct AssignRequest {
    route_ids: Vec<RouteId>,
}

async fn assign_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AssignRequest>,
) -> Json<AssignmentBatchResult> {
    Json(state.engine().assign_routes(&request.route_ids).await)
}

async fn assign_pending_handler(State(state): State<Arc<AppState>>) -> Json<AssignmentBatchResult> {
    Json(state.engine().assign_all_pending().await)
}

async fn reassign_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<InspectorId>,
) -> Json<AssignmentBatchResult> {
    Json(state.engine().reassign_inspector_routes(id).await)
}

async fn recommendations_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<WorkloadRecommendations>, (StatusCode, String)> {
    let report = state
        .engine()
        .recommendations()
        .await
        .map_err(|e| internal("Recommendations", e))?;
    Ok(Json(report))
}

/// Route lifecycle: start, finish, cancel, unassign
async fn transition_handler(
    State(state): State<Arc<AppState>>,
    Path((id, action)): Path<(RouteId, String)>,
) -> Result<Json<Route>, (StatusCode, String)> {
    let action = match action.as_str() {
        "start" => RouteAction::Start,
        "finish" => RouteAction::Finish,
        "cancel" => RouteAction::Cancel,
        "unassign" => RouteAction::Unassign,
        other => {
            return Err((
                StatusCode::NOT_FOUND,
                format!("unknown route action '{}'", other),
            ))
        }
    };

    let route = state
        .engine()
        .transition_route(id, action)
        .await
        .map_err(|e| store_error("Route transition", e))?;
    Ok(Json(route))
}

/// Re-sequence a route's stored points
async fn optimize_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<RouteId>,
) -> Result<Json<RouteOptimization>, (StatusCode, String)> {
    let optimization = optimize_route(&state.store, id)
        .await
        .map_err(|e| store_error("Route optimization", e))?;
    Ok(Json(optimization))
}

fn store_error(context: &str, e: StoreError) -> (StatusCode, String) {
    match e {
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, e.to_string()),
        StoreError::Transition(_) => (StatusCode::CONFLICT, e.to_string()),
        other => internal(context, other),
    }
}

fn internal(context: &str, e: StoreError) -> (StatusCode, String) {
    tracing::error!("{} failed: {}", context, e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
