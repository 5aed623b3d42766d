// Portfolio Sync - API Server
// REST surface over the sync service: trigger a run, read back entities.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use portfolio_sync::{
    setup_database, CategorySet, HttpGateway, ReconciledEntity, SyncOutcome, SyncService,
    Validator,
};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    service: Arc<SyncService<HttpGateway>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/sync - Run one full sync cycle
/// The blocking HTTP gateway and the SQLite transaction run off the async
/// executor via spawn_blocking.
async fn trigger_sync(State(state): State<AppState>) -> impl IntoResponse {
    let result = tokio::task::spawn_blocking(move || {
        let mut conn = state.db.lock().unwrap();
        state.service.run_sync(&mut conn)
    })
    .await
    .unwrap_or_else(|e| Err(anyhow::anyhow!("Sync task panicked: {}", e)));

    match result {
        Ok(outcome) => (StatusCode::OK, Json(ApiResponse::ok(outcome))).into_response(),
        Err(e) => {
            eprintln!("Sync run failed: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<SyncOutcome>::err(format!("{:#}", e))),
            )
                .into_response()
        }
    }
}

/// GET /api/entities - Read back the persisted dataset
async fn list_entities(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.lock().unwrap();

    match state.service.list_entities(&conn) {
        Ok(entities) => (StatusCode::OK, Json(ApiResponse::ok(entities))).into_response(),
        Err(e) => {
            eprintln!("Error listing entities: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<Vec<ReconciledEntity>>::err(format!("{:#}", e))),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portfolio_sync=info".into()),
        )
        .init();

    println!("🌐 Portfolio Sync - API Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let db_path =
        std::env::var("DB_PATH").unwrap_or_else(|_| "portfolio.db".to_string());
    let source_url = std::env::var("SOURCE_API_URL")
        .unwrap_or_else(|_| "http://localhost:8080".to_string());

    let conn = Connection::open(&db_path).expect("Failed to open database");
    setup_database(&conn).expect("Failed to initialize database");
    println!("✓ Database opened: {}", db_path);

    let gateway = HttpGateway::new(&source_url).expect("Failed to build source gateway");
    let validator = match std::env::var("SYNC_CATEGORIES") {
        Ok(csv) => Validator::with_categories(CategorySet::from_csv(&csv)),
        Err(_) => Validator::new(),
    };

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        service: Arc::new(SyncService::with_validator(gateway, validator)),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/sync", post(trigger_sync))
        .route("/entities", get(list_entities))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    println!("\n🚀 Server running on http://localhost:3000");
    println!("   POST http://localhost:3000/api/sync");
    println!("   GET  http://localhost:3000/api/entities");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
