//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use recruit_radar_common::upstream::ChatClient;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub search: CheckResult,
    pub analysis: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn credential(client: &dyn ChatClient) -> Self {
        let configured = client.is_configured();
        Self {
            status: if configured { "up" } else { "down" }.to_string(),
            provider: client.provider().to_string(),
            error: (!configured).then(|| "API key is not configured".to_string()),
        }
    }
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: recruit_radar_common::VERSION.to_string(),
    })
}

/// Readiness probe - upstream calls need their credentials.
/// The upstreams themselves are not contacted.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let search = CheckResult::credential(state.search.as_ref());
    let analysis = CheckResult::credential(state.analysis.as_ref());

    let all_healthy = search.status == "up" && analysis.status == "up";

    Json(ReadyResponse {
        status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks { search, analysis },
    })
}
