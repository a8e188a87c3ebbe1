//! Bearer token verification and issuance.
//!
//! # Responsibilities
//! - Parse `Authorization: Bearer <token>` headers
//! - Verify HMAC-signed JWTs against a single shared secret
//! - Mint tokens with the layout the users service issues
//!
//! # Design Decisions
//! - Exactly one algorithm is accepted; a token signed with any other
//!   algorithm is rejected even if the secret matches
//! - No leeway: `exp` must be strictly in the future
//! - Header shape is checked before any cryptographic work

use std::collections::BTreeSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::HeaderValue;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Expected authorization scheme (compared case-insensitively).
pub const BEARER: &str = "Bearer";

/// Default lifetime of minted tokens.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Verified credential payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    pub exp: u64,
}

impl Claims {
    /// Claims valid from now for `ttl`.
    pub fn new<I, S>(user_id: impl Into<String>, roles: I, ttl: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = unix_now();
        Self {
            user_id: user_id.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            iat: Some(now),
            nbf: Some(now),
            exp: now + ttl.as_secs(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingHeader,

    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("token expired")]
    Expired,

    #[error("token rejected: {0}")]
    Invalid(jsonwebtoken::errors::Error),

    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// Whether the algorithm belongs to the shared-secret family.
pub fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Split a raw header value into its credential.
///
/// Requires exactly two space-separated tokens with the `Bearer` scheme.
pub fn extract_bearer(header: Option<&HeaderValue>) -> Result<&str, AuthError> {
    let raw = match header {
        Some(value) if !value.is_empty() => value.to_str().map_err(|_| AuthError::MalformedHeader)?,
        _ => return Err(AuthError::MissingHeader),
    };

    match raw.split_once(' ') {
        Some((scheme, credential))
            if scheme.eq_ignore_ascii_case(BEARER)
                && !credential.is_empty()
                && !credential.contains(' ') =>
        {
            Ok(credential)
        }
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Stateless verifier bound to one secret and one algorithm.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(secret: &[u8], algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify a raw `Authorization` header value.
    pub fn verify_header(&self, header: Option<&HeaderValue>) -> Result<Claims, AuthError> {
        let token = extract_bearer(header)?;
        self.verify(token)
    }

    /// Verify a compact JWT.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e),
            }
        })?;

        // The library accepts exp == now; the contract is strictly future.
        if data.claims.exp <= unix_now() {
            return Err(AuthError::Expired);
        }

        Ok(data.claims)
    }
}

/// Token issuer sharing the verifier's secret; used by tooling and tests.
pub struct TokenSigner {
    key: EncodingKey,
    header: Header,
}

impl TokenSigner {
    pub fn new(secret: &[u8], algorithm: Algorithm) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            header: Header::new(algorithm),
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&self.header, claims, &self.key).map_err(AuthError::Signing)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
