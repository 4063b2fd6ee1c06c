//! Upstream request dispatch
//!
//! Provides a unified interface for chat-completions providers:
//! - Perplexity (search-backed `sonar` models, streamed recommendations)
//! - OpenAI (risk analysis)
//! - Mock (scripted, for local development and tests)
//!
//! Clients are built once at startup and injected into handlers. Calls are
//! never retried here; upstream error statuses come back as
//! [`AppError::Upstream`] with the body untouched.

mod client;
mod mock;
mod types;

pub use client::{ChatCompletionsClient, ClientSettings};
pub use mock::{sse_body, MockChatClient};
pub use types::{ChatMessage, ChatRequest, Citation, Completion, Role};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;

use crate::config::{AnalysisConfig, SearchConfig};
use crate::errors::{AppError, Result};

/// A live response body. Dropping it closes the upstream connection.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Trait for chat-completions providers
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Non-streamed call: the single answer text and its citations
    async fn complete(&self, request: &ChatRequest) -> Result<Completion>;

    /// Streamed call: the raw event-stream body, unbuffered
    async fn stream(&self, request: &ChatRequest) -> Result<ByteStream>;

    /// Provider label for logs and metrics
    fn provider(&self) -> &str;

    /// Whether a credential is available
    fn is_configured(&self) -> bool {
        true
    }
}

const MOCK_CANDIDATES: &str = r#"[{"name":"Mock Candidate","currentPosition":"Research Engineer, Example Lab","profileSummary":"Placeholder profile returned by the mock provider","relevanceScore":50,"matchingReason":"Mock provider is enabled","skills":["Python"],"achievements":["None"],"referenceLinks":["https://example.com"]}]"#;

fn create_client(
    kind: &str,
    settings: ClientSettings,
    mock_content: &str,
) -> Result<Arc<dyn ChatClient>> {
    match kind {
        "perplexity" | "openai" | "openai-compatible" => {
            if settings.api_key.is_none() {
                tracing::warn!(
                    provider = %settings.provider,
                    "No API key configured; calls will fail with a configuration error"
                );
            }
            Ok(Arc::new(ChatCompletionsClient::new(settings)?))
        }
        "mock" => {
            tracing::warn!("Using mock chat client");
            Ok(Arc::new(MockChatClient::new(mock_content)))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown chat provider: {}", other),
        }),
    }
}

/// Create the search/LLM client based on configuration
pub fn create_search_client(config: &SearchConfig) -> Result<Arc<dyn ChatClient>> {
    create_client(&config.provider, ClientSettings::from(config), MOCK_CANDIDATES)
}

/// Create the risk analysis client based on configuration
pub fn create_analysis_client(config: &AnalysisConfig) -> Result<Arc<dyn ChatClient>> {
    create_client(
        &config.provider,
        ClientSettings::from(config),
        "- Mock analysis: no risk factors evaluated.",
    )
}
