//! Scripted in-process chat client for local development and tests

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Mutex;

use super::types::{ChatRequest, Citation, Completion};
use super::{ByteStream, ChatClient};
use crate::errors::{AppError, Result};

/// Characters of content per streamed delta event
const DELTA_CHARS: usize = 16;

/// Encode `content` the way a streaming chat-completions endpoint would:
/// one `data:` event per delta, then `[DONE]`.
pub fn sse_body(content: &str) -> Vec<u8> {
    let mut body = String::new();
    let chars: Vec<char> = content.chars().collect();
    for piece in chars.chunks(DELTA_CHARS) {
        let delta: String = piece.iter().collect();
        let event = serde_json::json!({
            "object": "chat.completion.chunk",
            "choices": [{ "index": 0, "delta": { "content": delta } }]
        });
        body.push_str(&format!("data: {}\n\n", event));
    }
    body.push_str("data: [DONE]\n\n");
    body.into_bytes()
}

/// Chat client that answers every call with the same scripted content.
///
/// Streams are cut into fixed-size byte chunks with no regard for UTF-8 or
/// line boundaries, so consumers see the same fragmentation a network
/// produces.
pub struct MockChatClient {
    content: String,
    citations: Vec<Citation>,
    chunk_size: usize,
    raw_stream: Option<Vec<Bytes>>,
    failure: Option<(u16, String)>,
    requests: Mutex<Vec<(ChatRequest, bool)>>,
}

impl MockChatClient {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            citations: Vec::new(),
            chunk_size: 7,
            raw_stream: None,
            failure: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with this upstream status and body.
    pub fn failing(status: u16, body: impl Into<String>) -> Self {
        let mut client = Self::new("");
        client.failure = Some((status, body.into()));
        client
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Stream these exact chunks instead of an encoding of the content.
    pub fn with_raw_stream(mut self, chunks: Vec<Bytes>) -> Self {
        self.raw_stream = Some(chunks);
        self
    }

    /// Requests received so far, with their stream flag.
    pub fn requests(&self) -> Vec<(ChatRequest, bool)> {
        self.requests
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: &ChatRequest, stream: bool) -> Result<()> {
        if let Ok(mut log) = self.requests.lock() {
            log.push((request.clone(), stream));
        }
        match &self.failure {
            Some((status, body)) => Err(AppError::Upstream {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion> {
        self.record(request, false)?;
        Ok(Completion {
            content: self.content.clone(),
            citations: self.citations.clone(),
        })
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        self.record(request, true)?;

        let chunks = match &self.raw_stream {
            Some(chunks) => chunks.clone(),
            None => sse_body(&self.content)
                .chunks(self.chunk_size)
                .map(Bytes::copy_from_slice)
                .collect(),
        };
        Ok(futures::stream::iter(chunks.into_iter().map(Ok)).boxed())
    }

    fn provider(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::reassemble;

    #[tokio::test]
    async fn test_mock_stream_roundtrips_multibyte_content() {
        // Chunk size 2 splits most multi-byte characters
        let client = MockChatClient::new("東京大学の研究者です").with_chunk_size(2);
        let request = ChatRequest::user("sonar", "q", 16, 0.3);

        let out = reassemble(client.stream(&request).await.unwrap()).await.unwrap();
        assert_eq!(out.text, "東京大学の研究者です");
        assert!(out.saw_done);
        assert_eq!(client.requests().len(), 1);
        assert!(client.requests()[0].1);
    }

    #[tokio::test]
    async fn test_failing_mock_returns_upstream_error() {
        let client = MockChatClient::failing(503, "overloaded");
        let request = ChatRequest::user("sonar", "q", 16, 0.3);

        let err = client.complete(&request).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream { status: 503, .. }));
    }

    #[test]
    fn test_sse_body_ends_with_done() {
        let body = String::from_utf8(sse_body("hello")).unwrap();
        assert!(body.starts_with("data: {"));
        assert!(body.ends_with("data: [DONE]\n\n"));
    }
}
