//! REST API server for custodychain
//!
//! Thin transport over the sync service and chain store: request decoding,
//! error-to-status mapping, CORS, and request accounting live here; every
//! ledger decision is made below this layer.

use axum::{
    extract::{Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::ChainError;
use crate::ledger::{Block, ChainStore, RejectedEntry};
use crate::peers::PeerRegistry;
use crate::sync::{BlockRef, ReceiveOutcome, SyncPhase, SyncService};
use crate::transaction::Transaction;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct Node {
    pub sync: Arc<SyncService>,
    pub chain: Arc<RwLock<ChainStore>>,
    pub peers: PeerRegistry,
    api_stats: Arc<RwLock<ApiStats>>,
}

impl Node {
    /// Build an API node observing the orchestrator's chain store, peer
    /// registry, and sync service.
    pub fn new_shared(
        sync: Arc<SyncService>,
        chain: Arc<RwLock<ChainStore>>,
        peers: PeerRegistry,
    ) -> Self {
        Self {
            sync,
            chain,
            peers,
            api_stats: Arc::new(RwLock::new(ApiStats::new())),
        }
    }
}

/// API statistics and monitoring
#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    transactions_submitted: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Chain(ChainError),
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Chain(err) => {
                let status = match &err {
                    ChainError::AssetAlreadyExists(_) | ChainError::OwnershipMismatch { .. } => {
                        StatusCode::CONFLICT
                    }
                    ChainError::AssetNotFound(_) => StatusCode::NOT_FOUND,
                    ChainError::EmptyBatch
                    | ChainError::InvalidTransaction(_)
                    | ChainError::InvalidPeer(_) => StatusCode::BAD_REQUEST,
                    ChainError::NetworkError(_) => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Chain(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
struct PeerPayload {
    peer_url: String,
}

#[derive(Deserialize)]
struct CreateAssetRequest {
    asset_id: String,
    owner: String,
    #[serde(default)]
    meta: String,
}

#[derive(Deserialize)]
struct TransferAssetRequest {
    asset_id: String,
    from: String,
    to: String,
    #[serde(default)]
    meta: String,
}

#[derive(Serialize)]
struct MutationResponse {
    status: &'static str,
    block: BlockRef,
}

#[derive(Serialize)]
struct ReceiveResponse {
    status: &'static str,
    block: Option<BlockRef>,
}

#[derive(Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub transactions_submitted: u64,
    pub uptime_seconds: u64,
    pub chain_height: u64,
    pub chain_work: String,
    pub peer_count: usize,
    pub peer_failures: std::collections::HashMap<String, u32>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Request counting middleware
async fn stats_middleware(State(node): State<Arc<Node>>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    let mut stats = node.api_stats.write().await;
    stats.record_request(success);

    response
}

/// Request logging middleware: method, path, status, duration, sync phase.
async fn logging_middleware(State(node): State<Arc<Node>>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();
    let phase = node.sync.phase().await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        phase = ?phase,
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints (also used by tests)
pub fn build_api_router(node: Arc<Node>) -> Router {
    // Permissive CORS: peers and any UI call these endpoints cross-origin
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        // Peer endpoints
        .route("/peers", post(register_peer).get(get_peers))
        // Mutation endpoints
        .route("/asset", post(create_asset))
        .route("/transfer", post(transfer_asset))
        .route("/receive", post(receive_transaction))
        // Chain & state endpoints
        .route("/chain", get(get_chain))
        .route("/state", get(get_state))
        .route("/state/rejected", get(get_rejected))
        .route("/inventory", get(get_inventories))
        .route("/inventory/:owner", get(get_inventory))
        // System endpoints
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats))
        // logging before stats so every request is timed and counted
        .layer(middleware::from_fn_with_state(node.clone(), logging_middleware))
        .layer(middleware::from_fn_with_state(node.clone(), stats_middleware))
        .with_state(node)
        .layer(cors)
}

/// Run the API server until shutdown.
pub async fn run_api_server(node: Arc<Node>, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_api_router(node);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn health_check(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let phase = node.sync.phase().await;
    let body = Json(serde_json::json!({
        "status": if phase == SyncPhase::Steady { "healthy" } else { "starting" },
        "phase": format!("{:?}", phase),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }));

    if phase == SyncPhase::Steady {
        (StatusCode::OK, body).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
    }
}

async fn register_peer(
    State(node): State<Arc<Node>>,
    Json(payload): Json<PeerPayload>,
) -> Result<Json<Vec<String>>, ApiError> {
    node.peers.add(&payload.peer_url)?;
    Ok(Json(node.peers.all()))
}

async fn get_peers(State(node): State<Arc<Node>>) -> Json<Vec<String>> {
    Json(node.peers.all())
}

async fn create_asset(
    State(node): State<Arc<Node>>,
    Json(req): Json<CreateAssetRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let tx = Transaction::create(req.asset_id, req.owner, req.meta);
    let block = node.sync.submit(tx).await?;

    let mut stats = node.api_stats.write().await;
    stats.transactions_submitted += 1;

    Ok(Json(MutationResponse {
        status: "created",
        block,
    }))
}

async fn transfer_asset(
    State(node): State<Arc<Node>>,
    Json(req): Json<TransferAssetRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let tx = Transaction::transfer(req.asset_id, req.from, req.to, req.meta);
    let block = node.sync.submit(tx).await?;

    let mut stats = node.api_stats.write().await;
    stats.transactions_submitted += 1;

    Ok(Json(MutationResponse {
        status: "transferred",
        block,
    }))
}

async fn receive_transaction(
    State(node): State<Arc<Node>>,
    Json(tx): Json<Transaction>,
) -> Result<Json<ReceiveResponse>, ApiError> {
    match node.sync.receive(tx).await? {
        ReceiveOutcome::Applied(block) => Ok(Json(ReceiveResponse {
            status: "accepted",
            block: Some(block),
        })),
        ReceiveOutcome::Ignored => Ok(Json(ReceiveResponse {
            status: "ignored",
            block: None,
        })),
    }
}

/// The full block sequence; also the wire format peers adopt during sync.
async fn get_chain(State(node): State<Arc<Node>>) -> Json<Vec<Block>> {
    let store = node.chain.read().await;
    Json(store.ledger().blocks().to_vec())
}

async fn get_state(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let store = node.chain.read().await;
    Json(store.world().owners.clone())
}

async fn get_rejected(State(node): State<Arc<Node>>) -> Json<Vec<RejectedEntry>> {
    let store = node.chain.read().await;
    Json(store.rejected().to_vec())
}

async fn get_inventories(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let store = node.chain.read().await;
    Json(store.world().inventories.clone())
}

async fn get_inventory(
    State(node): State<Arc<Node>>,
    Path(owner): Path<String>,
) -> impl IntoResponse {
    let store = node.chain.read().await;
    Json(store.world().inventory_of(&owner))
}

async fn get_api_stats(State(node): State<Arc<Node>>) -> Json<ApiStatsResponse> {
    let (chain_height, chain_work) = {
        let store = node.chain.read().await;
        (store.ledger().height(), store.ledger().work().to_string())
    };

    let peer_failures = node.sync.failure_counts().await;
    let stats = node.api_stats.read().await;
    Json(ApiStatsResponse {
        total_requests: stats.total_requests,
        successful_requests: stats.successful_requests,
        failed_requests: stats.failed_requests,
        transactions_submitted: stats.transactions_submitted,
        uptime_seconds: stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0),
        chain_height,
        chain_work,
        peer_count: node.peers.len(),
        peer_failures,
    })
}
