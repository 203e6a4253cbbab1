//! Authentication: bcrypt password hashing, HS256 bearer tokens and the
//! middleware that guards every protected route.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::{Request, State}, http::HeaderMap, middleware::Next, response::{IntoResponse, Response}};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::task;
use uuid::Uuid;

use crate::models::AppError;

/// Tokens are valid for one hour after issue. There is no refresh.
pub const TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id as string UUID).
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn hash_password(&self, password: String) -> Result<String, AppError>;
    async fn verify_password(&self, password: String, hash: String) -> Result<bool, AppError>;
    async fn generate_token(&self, user_id: Uuid) -> Result<String, AppError>;
    async fn validate_token(&self, token: &str) -> Result<Claims, AppError>;
    async fn user_id_from_token(&self, token: &str) -> Result<Uuid, AppError> {
        let claims = self.validate_token(token).await?;
        Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)
    }
}

/// Stateless JWT/bcrypt implementation. A token stays valid until it expires.
#[derive(Clone)]
pub struct JwtAuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtAuthService {
    pub fn new(secret: &str) -> Self {
        Self { encoding: EncodingKey::from_secret(secret.as_bytes()), decoding: DecodingKey::from_secret(secret.as_bytes()) }
    }

    /// Signs a token as if issued at `issued_at` (unix seconds).
    pub fn token_issued_at(&self, user_id: Uuid, issued_at: i64) -> Result<String, AppError> {
        let claims = Claims { sub: user_id.to_string(), iat: issued_at, exp: issued_at + TOKEN_TTL_SECS };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
}

#[async_trait]
impl AuthService for JwtAuthService {
    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        // Bcrypt is CPU-bound; keep it off the async workers.
        let hashed = task::spawn_blocking(move || hash(password, DEFAULT_COST)).await.map_err(|e| AppError::Bcrypt(e.to_string()))??;
        Ok(hashed)
    }

    async fn verify_password(&self, password: String, hash_value: String) -> Result<bool, AppError> {
        let ok = task::spawn_blocking(move || verify(password, &hash_value)).await.map_err(|e| AppError::Bcrypt(e.to_string()))??;
        Ok(ok)
    }

    async fn generate_token(&self, user_id: Uuid) -> Result<String, AppError> {
        self.token_issued_at(user_id, Utc::now().timestamp())
    }

    async fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        })?;
        Ok(data.claims)
    }
}

/// Extract bearer token from Authorization header.
pub fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    headers.get(axum::http::header::AUTHORIZATION).and_then(|h| h.to_str().ok()).and_then(|v| v.strip_prefix("Bearer ")).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Identity of the caller, inserted into request extensions by [`require_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Middleware for protected routes: rejects the request before the handler
/// runs unless it carries a valid bearer token.
pub async fn require_auth(State(auth): State<Arc<dyn AuthService>>, mut request: Request, next: Next) -> Response {
    let Some(token) = bearer_from_headers(request.headers()) else {
        // A header in some other scheme is a bad token; an empty one counts as missing.
        let present = request
            .headers()
            .get(axum::http::header::AUTHORIZATION)
            .is_some_and(|h| h.to_str().map_or(true, |v| !v.strip_prefix("Bearer ").unwrap_or(v).trim().is_empty()));
        let err = if present { AppError::InvalidToken } else { AppError::MissingToken };
        return err.into_response();
    };
    match auth.user_id_from_token(&token).await {
        Ok(id) => {
            request.extensions_mut().insert(AuthUser { id });
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "rejected bearer token");
            e.into_response()
        }
    }
}
