//! Recruit Radar Common Library
//!
//! Shared code for the Recruit Radar gateway including:
//! - Configuration management
//! - Error types and handling
//! - Authentication utilities
//! - Upstream chat-completions clients
//! - Event-stream reassembly and candidate extraction
//! - Prompt builders
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod errors;
pub mod extract;
pub mod metrics;
pub mod prompts;
pub mod stream;
pub mod upstream;

// Re-export commonly used types
pub use auth::{AuthContext, AuthGate};
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use extract::{extract_candidates, CandidateRecord, ExtractionResult};
pub use upstream::ChatClient;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
