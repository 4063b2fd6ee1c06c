//! Authentication and authorization utilities
//!
//! Accounts live with the hosted auth provider. This module only verifies
//! the provider's HS256 access tokens and exposes the caller as an
//! [`AuthContext`] extractor.

use crate::config::AuthConfig;
use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Role granted to administrators in `app_metadata.role`
pub const ADMIN_ROLE: &str = "admin";

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (`sub`), absent for anonymous callers
    pub user_id: Option<String>,

    pub email: Option<String>,

    /// University the user belongs to
    pub university_id: Option<String>,

    /// Application role from `app_metadata`
    pub role: Option<String>,

    /// Request ID for tracing
    pub request_id: String,
}

impl AuthContext {
    /// Context used when authentication is disabled.
    pub fn anonymous(request_id: impl Into<String>) -> Self {
        Self {
            user_id: None,
            email: None,
            university_id: None,
            role: None,
            request_id: request_id.into(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }

    /// Require the admin role, returning error if not present
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: "Administrator role required".to_string(),
            })
        }
    }
}

/// Provider-managed metadata, writable only by the service role
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub university_id: Option<String>,

    #[serde(default)]
    pub role: Option<String>,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    #[serde(default)]
    pub email: Option<String>,

    /// Provider role, e.g. `authenticated`
    #[serde(default)]
    pub role: Option<String>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    pub aud: String,

    #[serde(default)]
    pub app_metadata: AppMetadata,
}

/// Verifies access tokens issued by the auth provider
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validate and decode a JWT token
    pub fn verify(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthorized {
                    message: format!("Invalid access token: {}", e),
                },
            })
    }
}

/// Request authentication policy, shared through router state
pub struct AuthGate {
    verifier: Option<JwtVerifier>,
    required: bool,
}

impl AuthGate {
    pub fn from_config(config: &AuthConfig) -> Self {
        let verifier = config
            .jwt_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|secret| JwtVerifier::new(secret, &config.audience));

        if verifier.is_none() && !config.required {
            tracing::warn!("No JWT secret configured; requests run unauthenticated");
        }

        Self {
            verifier,
            required: config.required,
        }
    }

    /// Authenticate one request from its `Authorization` header value.
    pub fn authenticate(&self, header: Option<&str>, request_id: String) -> Result<AuthContext> {
        let verifier = match (&self.verifier, self.required) {
            (Some(verifier), _) => verifier,
            (None, false) => return Ok(AuthContext::anonymous(request_id)),
            (None, true) => {
                return Err(AppError::Configuration {
                    message: "Authentication is required but APP__AUTH__JWT_SECRET is not set"
                        .to_string(),
                })
            }
        };

        let header = header.ok_or_else(|| AppError::Unauthorized {
            message: "Missing Authorization header".to_string(),
        })?;
        let token = extract_bearer(header).ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must use the Bearer scheme".to_string(),
        })?;

        let claims = verifier.verify(token)?;

        Ok(AuthContext {
            user_id: Some(claims.sub),
            email: claims.email,
            university_id: claims.app_metadata.university_id,
            role: claims.app_metadata.role,
            request_id,
        })
    }
}

/// Extract the token from an Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<AuthGate>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        // Extract request ID
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok());

        let gate = Arc::<AuthGate>::from_ref(state);
        gate.authenticate(header, request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test_secret";

    fn token(secret: &str, aud: &str, expires_in: Duration, role: Option<&str>) -> String {
        let claims = JwtClaims {
            sub: "user-1".to_string(),
            email: Some("hr@example.ac.jp".to_string()),
            role: Some("authenticated".to_string()),
            exp: (Utc::now() + expires_in).timestamp(),
            aud: aud.to_string(),
            app_metadata: AppMetadata {
                university_id: Some("univ-42".to_string()),
                role: role.map(String::from),
            },
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn gate(secret: Option<&str>, required: bool) -> AuthGate {
        AuthGate::from_config(&AuthConfig {
            jwt_secret: secret.map(String::from),
            audience: "authenticated".to_string(),
            required,
        })
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_valid_token_yields_context() {
        let header = format!("Bearer {}", token(SECRET, "authenticated", Duration::hours(1), None));
        let ctx = gate(Some(SECRET), true)
            .authenticate(Some(&header), "req-1".into())
            .unwrap();

        assert_eq!(ctx.user_id.as_deref(), Some("user-1"));
        assert_eq!(ctx.email.as_deref(), Some("hr@example.ac.jp"));
        assert_eq!(ctx.university_id.as_deref(), Some("univ-42"));
        assert_eq!(ctx.request_id, "req-1");
        assert!(ctx.require_admin().is_err());
    }

    #[test]
    fn test_admin_role_from_app_metadata() {
        let header = format!(
            "Bearer {}",
            token(SECRET, "authenticated", Duration::hours(1), Some("admin"))
        );
        let ctx = gate(Some(SECRET), true)
            .authenticate(Some(&header), "req".into())
            .unwrap();
        assert!(ctx.require_admin().is_ok());
    }

    #[test]
    fn test_expired_token() {
        let header = format!("Bearer {}", token(SECRET, "authenticated", Duration::hours(-2), None));
        let err = gate(Some(SECRET), true)
            .authenticate(Some(&header), "req".into())
            .unwrap_err();
        assert!(matches!(err, AppError::ExpiredToken));
    }

    #[test]
    fn test_rejects_wrong_secret_audience_and_missing_header() {
        let gate = gate(Some(SECRET), true);

        let wrong_secret = format!("Bearer {}", token("other", "authenticated", Duration::hours(1), None));
        assert!(matches!(
            gate.authenticate(Some(&wrong_secret), "req".into()),
            Err(AppError::Unauthorized { .. })
        ));

        let wrong_aud = format!("Bearer {}", token(SECRET, "anon", Duration::hours(1), None));
        assert!(matches!(
            gate.authenticate(Some(&wrong_aud), "req".into()),
            Err(AppError::Unauthorized { .. })
        ));

        assert!(matches!(
            gate.authenticate(None, "req".into()),
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_unconfigured_gate() {
        let ctx = gate(None, false).authenticate(None, "req".into()).unwrap();
        assert!(ctx.user_id.is_none());

        let err = gate(Some("  "), true).authenticate(None, "req".into()).unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }
}
