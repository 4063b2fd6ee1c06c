//! Configuration management for Recruit Radar services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{AppError, Result};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Search/LLM upstream used for recommendations and person research
    #[serde(default)]
    pub search: SearchConfig,

    /// LLM upstream used for risk analysis
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds (non-streaming endpoints)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Maximum accepted request body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Provider: perplexity, mock
    #[serde(default = "default_search_provider")]
    pub provider: String,

    /// Bearer credential for the upstream
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Model used for candidate recommendations (streamed)
    #[serde(default = "default_recommend_model")]
    pub recommend_model: String,

    /// Model used for person research (non-streamed)
    #[serde(default = "default_research_model")]
    pub research_model: String,

    #[serde(default = "default_recommend_max_tokens")]
    pub recommend_max_tokens: u32,

    #[serde(default = "default_research_max_tokens")]
    pub research_max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Timeout for non-streaming calls in seconds
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,

    /// Maximum duration of a streamed call in seconds
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_secs: u64,

    /// Web search context size hint: low, medium, high
    #[serde(default = "default_search_context_size")]
    pub search_context_size: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Provider: openai, mock
    #[serde(default = "default_analysis_provider")]
    pub provider: String,

    pub api_key: Option<String>,

    #[serde(default = "default_analysis_base_url")]
    pub base_url: String,

    #[serde(default = "default_analysis_model")]
    pub model: String,

    #[serde(default = "default_analysis_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_analysis_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Signing secret of the hosted auth provider's access tokens
    pub jwt_secret: Option<String>,

    /// Expected `aud` claim
    #[serde(default = "default_audience")]
    pub audience: String,

    /// Reject unauthenticated requests
    #[serde(default = "default_enabled")]
    pub required: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_body_bytes() -> usize { 64 * 1024 }
fn default_search_provider() -> String { "perplexity".to_string() }
fn default_search_base_url() -> String { "https://api.perplexity.ai".to_string() }
fn default_recommend_model() -> String { "sonar".to_string() }
fn default_research_model() -> String { "sonar-pro".to_string() }
fn default_recommend_max_tokens() -> u32 { 4096 }
fn default_research_max_tokens() -> u32 { 2048 }
fn default_temperature() -> f32 { 0.3 }
fn default_upstream_timeout() -> u64 { 30 }
fn default_stream_timeout() -> u64 { 30 }
fn default_search_context_size() -> String { "high".to_string() }
fn default_analysis_provider() -> String { "openai".to_string() }
fn default_analysis_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_analysis_model() -> String { "gpt-4".to_string() }
fn default_analysis_max_tokens() -> u32 { 1024 }
fn default_analysis_timeout() -> u64 { 60 }
fn default_audience() -> String { "authenticated".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "recruit-radar".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SEARCH__API_KEY=pplx-...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl SearchConfig {
    /// The configured credential, or a configuration error naming the
    /// variable that should carry it.
    pub fn require_api_key(&self) -> Result<&str> {
        require_key(self.api_key.as_deref(), "APP__SEARCH__API_KEY")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }
}

impl AnalysisConfig {
    pub fn require_api_key(&self) -> Result<&str> {
        require_key(self.api_key.as_deref(), "APP__ANALYSIS__API_KEY")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn require_key<'a>(key: Option<&'a str>, var: &str) -> Result<&'a str> {
    match key.map(str::trim) {
        Some(k) if !k.is_empty() => Ok(k),
        _ => Err(AppError::Configuration {
            message: format!("API key is not configured (set {})", var),
        }),
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key: None,
            base_url: default_search_base_url(),
            recommend_model: default_recommend_model(),
            research_model: default_research_model(),
            recommend_max_tokens: default_recommend_max_tokens(),
            research_max_tokens: default_research_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_upstream_timeout(),
            stream_timeout_secs: default_stream_timeout(),
            search_context_size: default_search_context_size(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider: default_analysis_provider(),
            api_key: None,
            base_url: default_analysis_base_url(),
            model: default_analysis_model(),
            max_tokens: default_analysis_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_analysis_timeout(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            audience: default_audience(),
            required: default_enabled(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            search: SearchConfig::default(),
            analysis: AnalysisConfig::default(),
            auth: AuthConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
