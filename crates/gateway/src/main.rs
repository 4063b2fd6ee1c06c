//! Recruit Radar API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication against the hosted auth provider's tokens
//! - Rate limiting
//! - Candidate recommendation streaming and person research
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    extract::{DefaultBodyLimit, FromRef, Request},
    middleware::Next,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use recruit_radar_common::{
    auth::AuthGate,
    config::{AppConfig, ObservabilityConfig},
    metrics,
    upstream::{self, ChatClient},
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::middleware::metrics::track_metrics;
use crate::middleware::rate_limit::{create_rate_limiter, rate_limit_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Search-backed LLM used for recommendations and research
    pub search: Arc<dyn ChatClient>,
    /// LLM used for risk analysis
    pub analysis: Arc<dyn ChatClient>,
    pub auth: Arc<AuthGate>,
}

impl FromRef<AppState> for Arc<AuthGate> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    pub fn new(config: AppConfig) -> recruit_radar_common::Result<Self> {
        let search = upstream::create_search_client(&config.search)?;
        let analysis = upstream::create_analysis_client(&config.analysis)?;
        let auth = Arc::new(AuthGate::from_config(&config.auth));

        Ok(Self {
            config: Arc::new(config),
            search,
            analysis,
            auth,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    // Initialize tracing
    init_tracing(&config.observability);

    info!(
        service = %config.observability.service_name,
        "Starting Recruit Radar API Gateway v{}",
        recruit_radar_common::VERSION
    );

    // Initialize metrics
    install_metrics_exporter(&config.observability)?;
    metrics::register_metrics();

    // Create app state
    let state = AppState::new(config).map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize upstream clients");
        e
    })?;
    let config = state.config.clone();

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (signal_tx, signal_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signal_tx.send(());
        })
        .into_future();

    // Open streams may outlive the signal; stop waiting after the grace period
    let shutdown_timeout = config.shutdown_timeout();
    tokio::select! {
        result = server => result?,
        _ = async {
            if signal_rx.await.is_ok() {
                tokio::time::sleep(shutdown_timeout).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            warn!(
                timeout_secs = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out, dropping open connections"
            );
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Install the Prometheus recorder and its scrape listener. Port 0 disables it.
fn install_metrics_exporter(
    config: &ObservabilityConfig,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    if config.metrics_port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .set_buckets_for_metric(
            Matcher::Suffix("request_duration_seconds".to_string()),
            metrics::LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("upstream_duration_seconds".to_string()),
            metrics::UPSTREAM_BUCKETS,
        )?
        .install()?;

    info!(port = config.metrics_port, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let mut api_routes = Router::new()
        // Candidate recommendation
        .route("/recommend", post(handlers::recommend::recommend))
        .route("/recommend/candidates", post(handlers::recommend::candidates))

        // Person research
        .route("/search", post(handlers::research::search))

        // Risk analysis
        .route("/risk-analysis", post(handlers::analysis::risk_analysis))
        .route("/analyze", post(handlers::analysis::analyze));

    let limits = &state.config.rate_limit;
    if limits.enabled {
        let per_second = limits.requests_per_second;
        let limiter = create_rate_limiter(per_second, limits.burst);
        api_routes = api_routes.route_layer(axum::middleware::from_fn(
            move |request: Request, next: Next| {
                rate_limit_middleware(request, next, limiter.clone(), per_second)
            },
        ));
    }

    // Compose the app
    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .route_layer(axum::middleware::from_fn(track_metrics))
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use axum::http::header;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use recruit_radar_common::auth::{AppMetadata, JwtClaims};
    use recruit_radar_common::upstream::MockChatClient;

    pub const SECRET: &str = "gateway_test_secret";

    /// State with scripted upstreams and token auth enabled.
    pub fn state(search: MockChatClient, analysis: MockChatClient) -> AppState {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = Some(SECRET.to_string());
        config.rate_limit.enabled = false;

        AppState {
            auth: Arc::new(AuthGate::from_config(&config.auth)),
            config: Arc::new(config),
            search: Arc::new(search),
            analysis: Arc::new(analysis),
        }
    }

    pub fn app(state: AppState) -> Router {
        create_router(state)
    }

    pub fn token() -> String {
        let claims = JwtClaims {
            sub: "user-1".to_string(),
            email: Some("hr@example.ac.jp".to_string()),
            role: Some("authenticated".to_string()),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
            aud: "authenticated".to_string(),
            app_metadata: AppMetadata::default(),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token()))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use recruit_radar_common::upstream::MockChatClient;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = app(state(MockChatClient::new(""), MockChatClient::new("")));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_excess_requests() {
        let mut state = state(MockChatClient::new("summary"), MockChatClient::new(""));
        let mut config = (*state.config).clone();
        config.rate_limit.enabled = true;
        config.rate_limit.requests_per_second = 1;
        config.rate_limit.burst = 1;
        state.config = Arc::new(config);
        let app = app(state);

        let body = serde_json::json!({ "name": "Taro Yamada" });
        let first = app.clone().oneshot(post_json("/api/search", body.clone())).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(post_json("/api/search", body)).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let mut state = state(MockChatClient::new(""), MockChatClient::new(""));
        let mut config = (*state.config).clone();
        config.server.max_body_bytes = 64;
        state.config = Arc::new(config);

        let body = serde_json::json!({ "jobDescription": "x".repeat(200) });
        let response = app(state).oneshot(post_json("/api/recommend", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["code"], "PAYLOAD_TOO_LARGE");
    }
}
