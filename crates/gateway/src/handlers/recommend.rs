//! Candidate recommendation handlers

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use serde::Deserialize;
use std::time::Instant;
use validator::Validate;

use crate::handlers::ApiJson;
use crate::AppState;
use recruit_radar_common::{
    auth::AuthContext,
    errors::{AppError, Result},
    extract::{extract_candidates, ExtractionResult},
    metrics, prompts,
    stream::reassemble,
    upstream::ChatRequest,
};

/// Recommendation request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    #[validate(length(min = 1, max = 8000))]
    pub job_description: String,
}

impl RecommendRequest {
    fn validated(self) -> Result<String> {
        self.validate().map_err(|e| AppError::Validation {
            message: e.to_string(),
            field: Some("jobDescription".to_string()),
        })?;

        if self.job_description.trim().is_empty() {
            return Err(AppError::Validation {
                message: "jobDescription must not be blank".to_string(),
                field: Some("jobDescription".to_string()),
            });
        }
        Ok(self.job_description)
    }
}

fn chat_request(state: &AppState, job_description: &str) -> ChatRequest {
    let search = &state.config.search;
    ChatRequest::user(
        &search.recommend_model,
        prompts::recommend_prompt(job_description),
        search.recommend_max_tokens,
        search.temperature,
    )
    .with_search_context(&search.search_context_size)
}

/// Relay the upstream event stream to the caller unchanged.
///
/// Chunks are forwarded as they arrive. If the caller goes away the body is
/// dropped, which closes the upstream connection.
pub async fn recommend(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(request): ApiJson<RecommendRequest>,
) -> Result<Response> {
    let job_description = request.validated()?;

    let body = state
        .search
        .stream(&chat_request(&state, &job_description))
        .await?;

    tracing::info!(
        request_id = %auth.request_id,
        user_id = ?auth.user_id,
        job_chars = job_description.chars().count(),
        "Streaming recommendations"
    );

    let request_id = auth.request_id;
    let body = body.inspect_err(move |e| {
        tracing::warn!(request_id = %request_id, error = %e, "Upstream stream aborted");
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

/// Reassemble the upstream stream server-side and extract candidates.
pub async fn candidates(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(request): ApiJson<RecommendRequest>,
) -> Result<Json<ExtractionResult>> {
    let start = Instant::now();
    let job_description = request.validated()?;

    let body = state
        .search
        .stream(&chat_request(&state, &job_description))
        .await?;
    let reassembled = reassemble(body).await?;

    let stats = reassembled.stats;
    metrics::record_stream(stats.chunks, stats.bytes, stats.unparseable);

    let result = extract_candidates(&reassembled.text);

    tracing::info!(
        request_id = %auth.request_id,
        chunks = stats.chunks,
        saw_done = reassembled.saw_done,
        structured = result.is_structured(),
        candidates = result.candidates().map_or(0, |c| c.len()),
        latency_ms = start.elapsed().as_millis() as u64,
        "Recommendation completed"
    );

    Ok(Json(result))
}
