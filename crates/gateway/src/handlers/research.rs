//! Person research handlers

use axum::{extract::State, Json};
use serde::Serialize;
use std::time::Instant;
use validator::Validate;

use crate::handlers::ApiJson;
use crate::AppState;
use recruit_radar_common::{
    auth::AuthContext,
    errors::Result,
    prompts::{self, PersonQuery},
    upstream::{ChatRequest, Citation, Completion},
};

/// Research response
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub result: String,
    pub citations: Vec<Citation>,
}

/// Ask the search-backed model for a profile of one person.
pub(crate) async fn research_person(state: &AppState, person: &PersonQuery) -> Result<Completion> {
    let search = &state.config.search;
    let request = ChatRequest::user(
        &search.research_model,
        prompts::research_prompt(person),
        search.research_max_tokens,
        search.temperature,
    )
    .with_search_context(&search.search_context_size);

    state.search.complete(&request).await
}

/// Research a person
pub async fn search(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(person): ApiJson<PersonQuery>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();
    person.validate()?;

    let completion = research_person(&state, &person).await?;

    tracing::info!(
        request_id = %auth.request_id,
        user_id = ?auth.user_id,
        citations = completion.citations.len(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Research completed"
    );

    Ok(Json(SearchResponse {
        result: completion.content,
        citations: completion.citations,
    }))
}
