/*!
 * # Authentication and Authorization Module
 *
 * Sessions are HS256 bearer tokens carrying the account id and its role.
 * Handlers take a [`SessionUser`] extractor and call the role guards on it
 * before touching a resource:
 *
 * - `require_customer`, `require_dealer`, `require_provider` check the role
 * - `ensure_owner` compares the session against a resource's owning key
 */

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::AppState;

pub mod password;

pub use password::{hash_password, verify_password};

/// Account role carried by a session
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserType {
    Customer,
    Dealer,
    Provider,
}

/// Claim structure for session tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,         // Account id
    pub user_type: UserType, // Which table the id points into
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, jwt_issuer: String, token_expiration: Duration) -> Self {
        Self {
            jwt_secret,
            jwt_issuer,
            token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.jwt_issuer.clone(),
            Duration::from_secs(cfg.jwt_expiration_secs),
        )
    }
}

/// Issued bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication token")]
    MissingToken,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

/// Mints and validates session tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issues a token for the account `id` of the given role
    pub fn issue_token(&self, id: i32, user_type: UserType) -> Result<TokenResponse, AuthError> {
        let now = Utc::now();
        let lifetime = ChronoDuration::from_std(self.config.token_expiration)
            .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: id.to_string(),
            user_type,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            iss: self.config.jwt_issuer.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: lifetime.num_seconds(),
        })
    }

    /// Validates a token and returns the session it represents
    pub fn validate_token(&self, token: &str) -> Result<SessionUser, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        let id = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;
        Ok(SessionUser {
            id,
            user_type: claims.user_type,
        })
    }
}

/// The authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: i32,
    pub user_type: UserType,
}

impl SessionUser {
    fn require(&self, user_type: UserType) -> Result<i32, ServiceError> {
        if self.user_type == user_type {
            Ok(self.id)
        } else {
            Err(ServiceError::Forbidden(format!(
                "Only {} accounts may perform this action",
                user_type
            )))
        }
    }

    /// Returns the customer id, or 403 for other roles
    pub fn require_customer(&self) -> Result<i32, ServiceError> {
        self.require(UserType::Customer)
    }

    /// Returns the dealer id, or 403 for other roles
    pub fn require_dealer(&self) -> Result<i32, ServiceError> {
        self.require(UserType::Dealer)
    }

    /// Returns the provider id, or 403 for other roles
    pub fn require_provider(&self) -> Result<i32, ServiceError> {
        self.require(UserType::Provider)
    }

    /// Succeeds only when the session is the `owner_type` account `owner_id`
    pub fn ensure_owner(&self, owner_type: UserType, owner_id: i32) -> Result<(), ServiceError> {
        if self.user_type == owner_type && self.id == owner_id {
            Ok(())
        } else {
            debug!(
                session_id = self.id,
                session_type = %self.user_type,
                owner_id,
                owner_type = %owner_type,
                "ownership check failed"
            );
            Err(ServiceError::Forbidden(
                "You do not have access to this resource".to_string(),
            ))
        }
    }

    pub fn is(&self, user_type: UserType, id: i32) -> bool {
        self.user_type == user_type && self.id == id
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::MissingToken)?;
        Ok(state.auth.validate_token(token)?)
    }
}
