//! HTTP client for OpenAI-compatible chat-completions endpoints

use async_trait::async_trait;
use futures::StreamExt;
use std::time::{Duration, Instant};

use super::types::{ChatRequest, Completion, WireRequest, WireResponse};
use super::{ByteStream, ChatClient};
use crate::config::{AnalysisConfig, SearchConfig};
use crate::errors::{AppError, Result};
use crate::metrics;

/// Connection settings for one upstream.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Provider label used in logs and metrics
    pub provider: String,
    pub api_key: Option<String>,
    pub base_url: String,
    /// Limit for non-streamed calls
    pub timeout: Duration,
    /// Maximum duration of a streamed call, body included
    pub stream_timeout: Duration,
}

impl From<&SearchConfig> for ClientSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            api_key: config.require_api_key().ok().map(String::from),
            base_url: config.base_url.clone(),
            timeout: config.timeout(),
            stream_timeout: config.stream_timeout(),
        }
    }
}

impl From<&AnalysisConfig> for ClientSettings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            api_key: config.require_api_key().ok().map(String::from),
            base_url: config.base_url.clone(),
            timeout: config.timeout(),
            stream_timeout: config.timeout(),
        }
    }
}

/// Chat-completions client. One instance per upstream, shared by all
/// requests; every call opens its own connection-level request.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    settings: ClientSettings,
    endpoint: String,
}

/// First few characters of a credential, for logs.
fn redact(key: &str) -> String {
    let prefix: String = key.chars().take(6).collect();
    format!("{}...", prefix)
}

impl ChatCompletionsClient {
    /// Create a new client
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let endpoint = format!("{}/chat/completions", settings.base_url.trim_end_matches('/'));

        Ok(Self { client, settings, endpoint })
    }

    fn api_key(&self) -> Result<&str> {
        self.settings.api_key.as_deref().ok_or_else(|| AppError::Configuration {
            message: format!("{} API key is not configured", self.settings.provider),
        })
    }

    /// Send one request and return the response once a success status
    /// arrived. Error statuses are turned into [`AppError::Upstream`] with
    /// the body read in full.
    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response> {
        let api_key = self.api_key()?;
        let timeout = if stream {
            self.settings.stream_timeout
        } else {
            self.settings.timeout
        };

        tracing::info!(
            provider = %self.settings.provider,
            model = %request.model,
            stream,
            max_tokens = request.max_tokens,
            key = %redact(api_key),
            "Dispatching upstream request"
        );

        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .timeout(timeout)
            .json(&WireRequest::new(request, stream))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    provider = %self.settings.provider,
                    error = %e,
                    "Upstream request failed"
                );
                AppError::from_transport(e, timeout)
            })?;

        let status = response.status();
        metrics::record_upstream(
            start.elapsed().as_secs_f64(),
            &self.settings.provider,
            &request.model,
            stream,
            status.as_u16(),
        );

        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => format!("Failed to read upstream error body: {}", e),
            };
            tracing::error!(
                provider = %self.settings.provider,
                status = status.as_u16(),
                body = %body,
                "Upstream returned an error"
            );
            return Err(AppError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(
            provider = %self.settings.provider,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Upstream responded"
        );
        Ok(response)
    }
}

#[async_trait]
impl ChatClient for ChatCompletionsClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion> {
        let response = self.send(request, false).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::from_transport(e, self.settings.timeout))?;

        let wire: WireResponse = serde_json::from_slice(&body).map_err(|e| {
            AppError::MalformedUpstream {
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        wire.into_completion().ok_or_else(|| AppError::MalformedUpstream {
            message: "response has no choices[0].message.content".to_string(),
        })
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        let response = self.send(request, true).await?;
        let timeout = self.settings.stream_timeout;

        Ok(response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| AppError::from_transport(e, timeout)))
            .boxed())
    }

    fn provider(&self) -> &str {
        &self.settings.provider
    }

    fn is_configured(&self) -> bool {
        self.settings.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::reassemble;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer, api_key: Option<&str>) -> ClientSettings {
        ClientSettings {
            provider: "perplexity".to_string(),
            api_key: api_key.map(String::from),
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            stream_timeout: Duration::from_secs(5),
        }
    }

    fn request() -> ChatRequest {
        ChatRequest::user("sonar", "LLM engineer fluent in PyTorch", 4096, 0.3)
    }

    #[tokio::test]
    async fn test_complete_extracts_answer_and_citations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer pplx-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "sonar",
                "stream": false,
                "max_tokens": 4096
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "Summary" } }],
                "citations": ["https://researchmap.jp/x"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(settings(&server, Some("pplx-test"))).unwrap();
        let completion = client.complete(&request()).await.unwrap();

        assert_eq!(completion.content, "Summary");
        assert_eq!(completion.citations.len(), 1);
        assert_eq!(completion.citations[0].url, "https://researchmap.jp/x");
    }

    #[tokio::test]
    async fn test_upstream_error_is_forwarded_verbatim() {
        let server = MockServer::start().await;
        let body = r#"{"error":{"message":"rate limited","type":"rate_limit"}}"#;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string(body))
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(settings(&server, Some("pplx-test"))).unwrap();
        let err = client.stream(&request()).await.err().unwrap();

        match err {
            AppError::Upstream { status, body: forwarded } => {
                assert_eq!(status, 429);
                assert_eq!(forwarded, body);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_calling_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(settings(&server, None)).unwrap();
        assert!(!client.is_configured());

        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_stream_body_is_reassembled() {
        let server = MockServer::start().await;
        let sse = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"ab\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"cd\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "stream": true })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(settings(&server, Some("pplx-test"))).unwrap();
        let body = client.stream(&request()).await.unwrap();
        let out = reassemble(body).await.unwrap();

        assert_eq!(out.text, "abcd");
        assert!(out.saw_done);
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let mut settings = settings(&server, Some("pplx-test"));
        settings.stream_timeout = Duration::from_millis(100);
        let client = ChatCompletionsClient::new(settings).unwrap();

        let err = client.stream(&request()).await.err().unwrap();
        assert!(matches!(err, AppError::UpstreamTimeout { timeout_ms: 100 }));
    }

    #[tokio::test]
    async fn test_body_stalled_after_first_line_times_out() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Headers and one data line, then nothing
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;

            let first = "data: {\"choices\":[{\"delta\":{\"content\":\"ab\"}}]}\n";
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n{:x}\r\n{}\r\n",
                first.len(),
                first
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let client = ChatCompletionsClient::new(ClientSettings {
            provider: "perplexity".to_string(),
            api_key: Some("pplx-test".to_string()),
            base_url: format!("http://{}", addr),
            timeout: Duration::from_secs(5),
            stream_timeout: Duration::from_millis(100),
        })
        .unwrap();

        let body = client.stream(&request()).await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), reassemble(body))
            .await
            .expect("reassembly hung on a stalled body");

        let err = result.unwrap_err();
        assert!(
            matches!(err, AppError::UpstreamTimeout { .. } | AppError::Transport { .. }),
            "unexpected error: {:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_malformed_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(settings(&server, Some("pplx-test"))).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::MalformedUpstream { .. }));
    }

    #[test]
    fn test_redact_keeps_prefix_only() {
        assert_eq!(redact("pplx-1234567890"), "pplx-1...");
        assert_eq!(redact("ab"), "ab...");
    }
}
