//! Token pair and JWT claim inspection

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Access/refresh token pair returned by `auth/login/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

/// Body of `auth/refresh/`
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Response of `auth/refresh/`. The refresh token is only rotated when the
/// server is configured to do so.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

impl RefreshResponse {
    /// Combine with the refresh token that was sent
    pub fn into_pair(self, sent_refresh: &str) -> CredentialPair {
        CredentialPair {
            access: self.access,
            refresh: self.refresh.unwrap_or_else(|| sent_refresh.to_string()),
        }
    }
}

/// Claims of a SimpleJWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
}

impl TokenClaims {
    /// Read the claims without verifying the signature.
    ///
    /// The client never holds the signing key, so this is for display only;
    /// the server stays the judge of whether a token is usable.
    pub fn peek(token: &str) -> ClientResult<Self> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<Self>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| ClientError::Decode(format!("Invalid token: {}", e)))
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}
