//! Chat-completions request and response types

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// One upstream call, independent of streaming mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Response size cap
    pub max_tokens: u32,
    pub temperature: f32,
    /// Web search context size, for search-backed models
    pub search_context_size: Option<String>,
}

impl ChatRequest {
    /// A single user message.
    pub fn user(model: impl Into<String>, prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::user(prompt)],
            max_tokens,
            temperature,
            search_context_size: None,
        }
    }

    /// Prepend a system message.
    pub fn with_system(mut self, content: impl Into<String>) -> Self {
        self.messages.insert(0, ChatMessage::system(content));
        self
    }

    pub fn with_search_context(mut self, size: impl Into<String>) -> Self {
        self.search_context_size = Some(size.into());
        self
    }
}

#[derive(Serialize)]
pub(crate) struct WireRequest<'a> {
    pub model: &'a str,
    pub stream: bool,
    pub max_tokens: u32,
    pub temperature: f32,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search_options: Option<WebSearchOptions<'a>>,
}

#[derive(Serialize)]
pub(crate) struct WebSearchOptions<'a> {
    pub search_context_size: &'a str,
}

impl<'a> WireRequest<'a> {
    pub fn new(request: &'a ChatRequest, stream: bool) -> Self {
        Self {
            model: &request.model,
            stream,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: &request.messages,
            web_search_options: request
                .search_context_size
                .as_deref()
                .map(|size| WebSearchOptions { search_context_size: size }),
        }
    }
}

/// A source the upstream cited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Answer of a non-streamed call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completion {
    pub content: String,
    pub citations: Vec<Citation>,
}

#[derive(Deserialize)]
pub(crate) struct WireResponse {
    #[serde(default)]
    pub choices: Vec<WireChoice>,
    #[serde(default)]
    pub citations: Vec<CitationEntry>,
    #[serde(default)]
    pub search_results: Vec<CitationEntry>,
}

#[derive(Deserialize)]
pub(crate) struct WireChoice {
    pub message: WireMessage,
    #[serde(default)]
    pub citations: Vec<CitationEntry>,
}

#[derive(Deserialize)]
pub(crate) struct WireMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Citations arrive either as bare URLs or as objects.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum CitationEntry {
    Url(String),
    Link {
        url: String,
        #[serde(default, alias = "text")]
        title: Option<String>,
    },
}

impl From<CitationEntry> for Citation {
    fn from(entry: CitationEntry) -> Self {
        match entry {
            CitationEntry::Url(url) => Citation { url, title: None },
            CitationEntry::Link { url, title } => Citation { url, title },
        }
    }
}

/// Merge every citation source, keeping first-seen order and dropping
/// duplicate or blank URLs.
pub(crate) fn normalize_citations<I>(entries: I) -> Vec<Citation>
where
    I: IntoIterator<Item = CitationEntry>,
{
    let mut citations: Vec<Citation> = Vec::new();
    for citation in entries.into_iter().map(Citation::from) {
        if citation.url.trim().is_empty() {
            continue;
        }
        match citations.iter_mut().find(|c| c.url == citation.url) {
            Some(existing) => {
                if existing.title.is_none() {
                    existing.title = citation.title;
                }
            }
            None => citations.push(citation),
        }
    }
    citations
}

impl WireResponse {
    /// The first choice's text plus normalized citations.
    pub fn into_completion(self) -> Option<Completion> {
        let mut choices = self.choices.into_iter();
        let first = choices.next()?;
        let content = first.message.content?;

        let citations = normalize_citations(
            self.citations
                .into_iter()
                .chain(self.search_results)
                .chain(first.citations),
        );

        Some(Completion { content, citations })
    }
}
