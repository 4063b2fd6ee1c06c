//! Risk analysis handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

use crate::handlers::research::research_person;
use crate::handlers::ApiJson;
use crate::AppState;
use recruit_radar_common::{
    auth::AuthContext,
    errors::{AppError, Result},
    prompts::{PersonQuery, RISK_ANALYST_SYSTEM_PROMPT},
    upstream::{ChatRequest, Citation},
};

/// Risk analysis request
#[derive(Debug, Deserialize, Validate)]
pub struct RiskAnalysisRequest {
    /// Research summary to assess
    #[validate(length(min = 1, max = 20000))]
    pub findings: String,
}

#[derive(Debug, Serialize)]
pub struct RiskAnalysisResponse {
    pub analysis: String,
}

/// Combined research and analysis request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(length(min = 1, max = 200))]
    pub university: String,

    #[validate(length(min = 1, max = 50))]
    pub birth_date: String,

    #[serde(default)]
    #[validate(length(max = 4000))]
    pub additional_info: Option<String>,
}

impl From<AnalyzeRequest> for PersonQuery {
    fn from(request: AnalyzeRequest) -> Self {
        PersonQuery {
            name: request.name,
            university: Some(request.university),
            dob: Some(request.birth_date),
            notes: request.additional_info,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub summary: String,
    pub citations: Vec<Citation>,
    pub analysis: String,
}

async fn assess(state: &AppState, findings: &str) -> Result<String> {
    let config = &state.config.analysis;
    let request = ChatRequest::user(&config.model, findings, config.max_tokens, config.temperature)
        .with_system(RISK_ANALYST_SYSTEM_PROMPT);

    Ok(state.analysis.complete(&request).await?.content)
}

/// Assess risk from a research summary
pub async fn risk_analysis(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(request): ApiJson<RiskAnalysisRequest>,
) -> Result<Json<RiskAnalysisResponse>> {
    let start = Instant::now();
    request.validate()?;

    if request.findings.trim().is_empty() {
        return Err(AppError::MissingField {
            field: "findings".to_string(),
        });
    }

    let analysis = assess(&state, &request.findings).await?;

    tracing::info!(
        request_id = %auth.request_id,
        latency_ms = start.elapsed().as_millis() as u64,
        "Risk analysis completed"
    );

    Ok(Json(RiskAnalysisResponse { analysis }))
}

/// Research a person, then assess risk from the resulting summary
pub async fn analyze(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(request): ApiJson<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>> {
    let start = Instant::now();
    request.validate()?;

    let person = PersonQuery::from(request);
    let timeout = state.config.request_timeout();

    let (completion, analysis) = tokio::time::timeout(timeout, async {
        let completion = research_person(&state, &person).await?;
        let analysis = assess(&state, &completion.content).await?;
        Ok::<_, AppError>((completion, analysis))
    })
    .await
    .map_err(|_| AppError::UpstreamTimeout {
        timeout_ms: timeout.as_millis() as u64,
    })??;

    tracing::info!(
        request_id = %auth.request_id,
        citations = completion.citations.len(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Analysis completed"
    );

    Ok(Json(AnalyzeResponse {
        summary: completion.content,
        citations: completion.citations,
        analysis,
    }))
}
