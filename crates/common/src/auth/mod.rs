//! Authentication utilities
//!
//! Provides:
//! - JWT token generation and validation
//! - Optional viewer extraction for anonymous-friendly endpoints

use crate::errors::{AppError, Result};
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl JwtClaims {
    /// Parse the subject as a numeric user ID
    pub fn user_id(&self) -> Result<i64> {
        self.sub.parse().map_err(|_| AppError::InvalidToken)
    }
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token for a user
    pub fn generate_token(&self, user_id: i64) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }
}

/// Extract a bearer token from an Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    if auth_header.starts_with("Bearer ") {
        Some(&auth_header[7..])
    } else {
        None
    }
}

/// Viewer identity for anonymous-friendly endpoints
///
/// Resolves to `None` when no token manager is configured, when no
/// Authorization header is present, or when the header does not carry a
/// bearer token. A bearer token that is present but invalid rejects the
/// request instead of silently downgrading it to anonymous.
#[derive(Debug, Clone, Copy)]
pub struct OptionalViewer(pub Option<i64>);

impl<S> FromRequestParts<S> for OptionalViewer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let Some(manager) = parts.extensions.get::<Arc<JwtManager>>() else {
            return Ok(OptionalViewer(None));
        };

        let Some(auth_header) = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(OptionalViewer(None));
        };

        let Some(token) = extract_bearer(auth_header) else {
            return Ok(OptionalViewer(None));
        };

        let claims = manager.validate_token(token)?;
        Ok(OptionalViewer(Some(claims.user_id()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_for(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/v1/feed");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);

        let token = manager.generate_token(42).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.user_id().unwrap(), 42);
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = JwtManager::new("test_secret", 3600);

        let now = Utc::now();
        let claims = JwtClaims {
            sub: "42".to_string(),
            exp: (now - Duration::hours(2)).timestamp(),
            iat: (now - Duration::hours(3)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test_secret"),
        )
        .unwrap();

        assert!(matches!(
            manager.validate_token(&token),
            Err(AppError::ExpiredToken)
        ));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let manager = JwtManager::new("test_secret", 3600);
        assert!(matches!(
            manager.validate_token("not-a-jwt"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer("abc123"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[tokio::test]
    async fn test_viewer_without_header_is_anonymous() {
        let mut parts = parts_for(&[]);
        parts
            .extensions
            .insert(Arc::new(JwtManager::new("test_secret", 3600)));

        let viewer = OptionalViewer::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(viewer.0, None);
    }

    #[tokio::test]
    async fn test_viewer_without_manager_is_anonymous() {
        let mut parts = parts_for(&[("authorization", "Bearer whatever")]);

        let viewer = OptionalViewer::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(viewer.0, None);
    }

    #[tokio::test]
    async fn test_viewer_with_valid_token() {
        let manager = Arc::new(JwtManager::new("test_secret", 3600));
        let token = manager.generate_token(7).unwrap();

        let header = format!("Bearer {}", token);
        let mut parts = parts_for(&[("authorization", header.as_str())]);
        parts.extensions.insert(manager);

        let viewer = OptionalViewer::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(viewer.0, Some(7));
    }

    #[tokio::test]
    async fn test_viewer_with_invalid_token_rejected() {
        let mut parts = parts_for(&[("authorization", "Bearer bogus")]);
        parts
            .extensions
            .insert(Arc::new(JwtManager::new("test_secret", 3600)));

        assert!(OptionalViewer::from_request_parts(&mut parts, &())
            .await
            .is_err());
    }
}
