mod app_state;
mod config;
mod db;
mod models;
mod routes;
mod services;

use axum::http::HeaderValue;
use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::analyzer::{Analyzer, MAX_IMAGE_BYTES};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment; missing required settings abort
    // here, before any traffic is served.
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing satya-scan server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("scans_saved_total", "Total scan records persisted");
    metrics::describe_counter!("scans_deleted_total", "Total scan records deleted");
    metrics::describe_counter!("ml_analyses_total", "Total image analyses requested");
    metrics::describe_counter!("ml_analyses_failed_total", "Total image analyses that failed");
    metrics::describe_histogram!("ml_analysis_seconds", "Time to run one image analysis");

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Select the analysis adapter (local subprocess or hosted vision API)
    let analyzer = Analyzer::from_config(&config);
    let ml_status = analyzer.status();
    tracing::info!(
        mode = ?config.analyzer_mode,
        ready = ml_status.ready,
        "Analysis adapter initialized"
    );

    let state = AppState::new(db_pool, analyzer);

    let cors = if config.frontend_origin == "*" {
        CorsLayer::permissive()
    } else {
        let origin = config
            .frontend_origin
            .parse::<HeaderValue>()
            .expect("FRONTEND_ORIGIN is not a valid header value");
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Build API routes
    let app = Router::new()
        .route("/", get(routes::index))
        .route("/api/health", get(routes::health::health_check))
        .route(
            "/api/scans",
            post(routes::scans::create_scan).get(routes::scans::list_scans),
        )
        .route("/api/scans/stats/summary", get(routes::scans::stats_summary))
        .route(
            "/api/scans/{id}",
            get(routes::scans::get_scan).delete(routes::scans::delete_scan),
        )
        .route("/api/ml/analyze", post(routes::ml::analyze))
        .route("/api/ml/ml-status", get(routes::ml::ml_status))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .fallback(routes::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_IMAGE_BYTES));

    tracing::info!("Starting satya-scan on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
