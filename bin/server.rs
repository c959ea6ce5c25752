// Inventory Reconciliation - Web Server
// REST API over the matching engine with Axum

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inventory_reconcile::{
    similarity, BatchSummary, Config, LearnedPattern, MatchResult, PastedRecord, PatternStore,
    Reconciler, RegistryRecord, SqlitePatternStore, SystemRecord,
};

#[derive(Parser)]
#[command(name = "reconcile-server", version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "RECONCILE_PORT")]
    port: u16,

    /// TOML configuration file
    #[arg(short, long, default_value = "reconcile.toml", env = "RECONCILE_CONFIG")]
    config: PathBuf,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Reconciler<SqlitePatternStore>>>,
}

impl AppState {
    fn lock(&self) -> Result<MutexGuard<'_, Reconciler<SqlitePatternStore>>, StatusCode> {
        self.session.lock().map_err(|_| {
            error!("Reconciliation session lock poisoned");
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Deserialize)]
struct SimilarityRequest {
    a: String,
    b: String,
}

#[derive(Deserialize)]
struct RankRequest {
    item: SystemRecord,
    pool: Vec<RegistryRecord>,
}

/// Candidate response (owned copy of the borrowed ranking)
#[derive(Serialize)]
struct CandidateResponse {
    pool_index: usize,
    record: RegistryRecord,
    base_score: f64,
    bonus_score: f64,
    final_score: f64,
}

#[derive(Serialize)]
struct RankResponse {
    best_guess: Option<usize>,
    candidates: Vec<CandidateResponse>,
}

#[derive(Deserialize)]
struct MatchBatchRequest {
    pasted: Vec<PastedRecord>,
    pool: Vec<SystemRecord>,
}

#[derive(Serialize)]
struct MatchBatchResponse {
    results: Vec<MatchResultResponse>,
    summary: BatchSummary,
}

#[derive(Serialize)]
struct MatchResultResponse {
    #[serde(flatten)]
    result: MatchResult,
    label: String,
}

#[derive(Deserialize)]
struct ConfirmRequest {
    system: SystemRecord,
    registry: RegistryRecord,
    score: f64,
}

#[derive(Deserialize)]
struct PatternsQuery {
    limit: Option<usize>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/similarity - Score two descriptions
async fn post_similarity(Json(req): Json<SimilarityRequest>) -> impl IntoResponse {
    Json(ApiResponse::ok(similarity(&req.a, &req.b)))
}

/// POST /api/rank - Rank a registry pool against one system record
async fn post_rank(
    State(state): State<AppState>,
    Json(req): Json<RankRequest>,
) -> Result<Json<ApiResponse<RankResponse>>, StatusCode> {
    let session = state.lock()?;

    let ranked = session.rank(&req.item, &req.pool);
    let best_guess = session.best_guess(&ranked).map(|c| c.pool_index);
    let candidates = ranked
        .iter()
        .map(|c| CandidateResponse {
            pool_index: c.pool_index,
            record: c.record.clone(),
            base_score: c.base_score,
            bonus_score: c.bonus_score,
            final_score: c.final_score,
        })
        .collect();

    Ok(Json(ApiResponse::ok(RankResponse {
        best_guess,
        candidates,
    })))
}

/// POST /api/match-batch - Greedy-match pasted records against system records
async fn post_match_batch(
    State(state): State<AppState>,
    Json(req): Json<MatchBatchRequest>,
) -> Result<Json<ApiResponse<MatchBatchResponse>>, StatusCode> {
    let session = state.lock()?;

    let outcome = session.match_batch(&req.pasted, &req.pool);
    let summary = outcome.summary();
    let results = outcome
        .results
        .into_iter()
        .map(|result| MatchResultResponse {
            label: result.match_type.label(),
            result,
        })
        .collect();

    Ok(Json(ApiResponse::ok(MatchBatchResponse { results, summary })))
}

/// POST /api/patterns - Record a confirmed match (best-effort write)
async fn post_pattern(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ApiResponse<LearnedPattern>>, StatusCode> {
    let mut session = state.lock()?;
    let pattern = session.record_confirmed_match(&req.system, &req.registry, req.score);
    Ok(Json(ApiResponse::ok(pattern)))
}

/// GET /api/patterns?limit=N - Most recent stored patterns
async fn get_patterns(
    State(state): State<AppState>,
    Query(query): Query<PatternsQuery>,
) -> Result<Json<ApiResponse<Vec<LearnedPattern>>>, StatusCode> {
    let session = state.lock()?;
    let limit = query.limit.unwrap_or(session.memory().retention());

    match session.store().recent(limit) {
        Ok(patterns) => Ok(Json(ApiResponse::ok(patterns))),
        Err(e) => {
            error!("Error reading learned patterns: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inventory_reconcile=info,reconcile_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;

    let store = SqlitePatternStore::open(&config.patterns.database).with_context(|| {
        format!(
            "Failed to open pattern database {}",
            config.patterns.database.display()
        )
    })?;
    let session = Reconciler::start(store, config);

    let state = AppState {
        session: Arc::new(Mutex::new(session)),
    };

    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/similarity", post(post_similarity))
        .route("/api/rank", post(post_rank))
        .route("/api/match-batch", post(post_match_batch))
        .route("/api/patterns", get(get_patterns).post(post_pattern))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Reconciliation API listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
