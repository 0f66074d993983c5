//! Bearer token payloads and decoding.
//!
//! ## Example
//!
//! ```ignore
//! use crvs_auth::{TokenDecoder, scopes};
//!
//! let decoder = TokenDecoder::unverified();
//! let payload = decoder.decode(&token)?;
//! if payload.has_scope(scopes::REGISTER) {
//!     // ...
//! }
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::TokenError;

/// Scope names carried in registration tokens.
pub mod scopes {
    pub const DECLARE: &str = "declare";
    pub const VALIDATE: &str = "validate";
    pub const REGISTER: &str = "register";
    pub const CERTIFY: &str = "certify";
    pub const SYSADMIN: &str = "sysadmin";
}

/// Leeway applied to `exp` when decoding without verification, matching
/// the default of the verifying path.
const EXP_LEEWAY_SECS: i64 = 60;

/// `aud` may be a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::One(aud) => aud == audience,
            Self::Many(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

/// Claims of an authenticated user's token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// The user id in the user-management service.
    pub sub: String,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl TokenPayload {
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.iter().any(|s| s == scope)
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

enum Mode {
    Unverified,
    Verified {
        key: DecodingKey,
        validation: Validation,
    },
}

/// Decodes bearer tokens into [`TokenPayload`]s.
pub struct TokenDecoder {
    mode: Mode,
}

impl std::fmt::Debug for TokenDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.mode {
            Mode::Unverified => "unverified",
            Mode::Verified { .. } => "verified",
        };
        f.debug_struct("TokenDecoder").field("mode", &mode).finish()
    }
}

impl TokenDecoder {
    /// A decoder that trusts the signature and only parses the payload.
    #[must_use]
    pub fn unverified() -> Self {
        Self {
            mode: Mode::Unverified,
        }
    }

    /// A decoder verifying RS256 signatures against a PEM encoded public key.
    ///
    /// # Errors
    /// Returns `TokenError::InvalidKey` if the PEM cannot be parsed.
    pub fn rs256(
        public_key_pem: &str,
        issuer: Option<&str>,
        audience: &[String],
    ) -> Result<Self, TokenError> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| TokenError::invalid_key(e.to_string()))?;
        Ok(Self::verified(key, Algorithm::RS256, issuer, audience))
    }

    /// A decoder verifying HS256 signatures with a shared secret.
    #[must_use]
    pub fn hs256(secret: &[u8], issuer: Option<&str>, audience: &[String]) -> Self {
        Self::verified(DecodingKey::from_secret(secret), Algorithm::HS256, issuer, audience)
    }

    fn verified(
        key: DecodingKey,
        algorithm: Algorithm,
        issuer: Option<&str>,
        audience: &[String],
    ) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        if audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(audience);
        }
        Self {
            mode: Mode::Verified { key, validation },
        }
    }

    #[must_use]
    pub fn verifies_signatures(&self) -> bool {
        matches!(self.mode, Mode::Verified { .. })
    }

    /// Decodes `token` into its payload.
    ///
    /// # Errors
    /// Returns an error if the token is malformed, expired, or fails
    /// signature or claim validation.
    pub fn decode(&self, token: &str) -> Result<TokenPayload, TokenError> {
        let payload = match &self.mode {
            Mode::Unverified => decode_unverified(token)?,
            Mode::Verified { key, validation } => {
                decode::<TokenPayload>(token, key, validation)?.claims
            }
        };

        if payload.sub.is_empty() {
            return Err(TokenError::invalid_claims("token has no subject"));
        }
        Ok(payload)
    }
}

fn decode_unverified(token: &str) -> Result<TokenPayload, TokenError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(claims), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::malformed("expected three dot-separated segments"));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(claims.trim_end_matches('='))
        .map_err(|e| TokenError::malformed(format!("claims are not base64url: {e}")))?;
    let payload: TokenPayload = serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::malformed(format!("claims are not valid JSON: {e}")))?;

    if let Some(exp) = payload.exp
        && exp.saturating_add(EXP_LEEWAY_SECS) < OffsetDateTime::now_utc().unix_timestamp()
    {
        tracing::debug!(sub = %payload.sub, exp, "rejecting expired token");
        return Err(TokenError::Expired);
    }

    Ok(payload)
}
