//! Bearer-token authentication.
//!
//! Tokens are `base64url(claims_json) "." base64url(hmac_sha256(secret, claims_part))`,
//! carrying the username plus issue and expiry times.

use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL;
use base64::Engine as _;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::types::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("No authorization token provided")]
    MissingToken,

    #[error("Invalid authorization header format")]
    MalformedHeader,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    Expired,

    #[error("token signing failed: {0}")]
    Signing(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Verified caller, attached to protected requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub username: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    username: String,
    iat: i64,
    exp: i64,
}

pub trait Authenticator: Send + Sync {
    fn authenticate(&self, credentials: &Credentials) -> Result<IssuedToken, AuthError>;

    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Single admin account, HMAC-signed tokens.
pub struct TokenAuthenticator {
    username: String,
    password: String,
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenAuthenticator {
    pub fn new(username: impl Into<String>, password: impl Into<String>, secret: &[u8], ttl: Duration) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            secret: secret.to_vec(),
            ttl,
        }
    }

    pub fn from_config(cfg: &AuthConfig) -> Self {
        Self::new(
            cfg.admin_username.clone(),
            cfg.admin_password.clone(),
            cfg.secret_key.as_bytes(),
            Duration::days(cfg.token_ttl_days),
        )
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Equality check whose timing does not depend on where `candidate`
    /// first differs from `expected`, or on its length: both are MACed and
    /// the tags are compared with `verify_slice`.
    fn secret_eq(&self, candidate: &str, expected: &str) -> Result<bool, AuthError> {
        let mut mac = self.mac()?;
        mac.update(expected.as_bytes());
        let expected_tag = mac.finalize().into_bytes();

        let mut mac = self.mac()?;
        mac.update(candidate.as_bytes());
        Ok(mac.verify_slice(&expected_tag).is_ok())
    }

    /// Issue a token for `username` valid from `now` for the configured TTL.
    pub fn issue_at(&self, username: &str, now: DateTime<Utc>) -> Result<IssuedToken, AuthError> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            username: username.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let payload = serde_json::to_vec(&claims).map_err(|e| AuthError::Signing(e.to_string()))?;
        let claims_part = BASE64_URL.encode(payload);

        let mut mac = self.mac()?;
        mac.update(claims_part.as_bytes());
        let signature = BASE64_URL.encode(mac.finalize().into_bytes());

        Ok(IssuedToken {
            token: format!("{claims_part}.{signature}"),
            expires_at,
        })
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, AuthError> {
        let (claims_part, signature_part) = token.split_once('.').ok_or(AuthError::InvalidToken)?;
        let signature = BASE64_URL
            .decode(signature_part)
            .map_err(|_| AuthError::InvalidToken)?;

        let mut mac = self.mac()?;
        mac.update(claims_part.as_bytes());
        mac.verify_slice(&signature).map_err(|_| AuthError::InvalidToken)?;

        let payload = BASE64_URL
            .decode(claims_part)
            .map_err(|_| AuthError::InvalidToken)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidToken)?;

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(AuthError::InvalidToken)?;
        if expires_at <= now {
            return Err(AuthError::Expired);
        }

        Ok(Identity {
            username: claims.username,
        })
    }
}

impl Authenticator for TokenAuthenticator {
    fn authenticate(&self, credentials: &Credentials) -> Result<IssuedToken, AuthError> {
        // Both checks always run.
        let user_ok = self.secret_eq(&credentials.username, &self.username)?;
        let pass_ok = self.secret_eq(&credentials.password, &self.password)?;
        if !(user_ok & pass_ok) {
            return Err(AuthError::InvalidCredentials);
        }
        self.issue_at(&credentials.username, Utc::now())
    }

    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        self.verify_at(token, Utc::now())
    }
}
