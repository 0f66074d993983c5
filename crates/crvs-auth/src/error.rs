//! Token error types.

/// Errors that can occur while decoding a bearer token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// No bearer token was supplied.
    #[error("Missing bearer token")]
    Missing,

    /// The token is not a well-formed JWT.
    #[error("Malformed token: {message}")]
    Malformed {
        /// Description of what could not be decoded.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// The configured verification key is unusable.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl TokenError {
    /// Creates a new `Malformed` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns `true` for errors caused by the configured key rather than the token.
    #[must_use]
    pub fn is_key_error(&self) -> bool {
        matches!(self, Self::InvalidKey { .. })
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => Self::invalid_claims(err.to_string()),
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => {
                Self::invalid_key(err.to_string())
            }
            _ => Self::malformed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(TokenError::Missing.to_string(), "Missing bearer token");
        assert_eq!(
            TokenError::malformed("not three segments").to_string(),
            "Malformed token: not three segments"
        );
        assert_eq!(
            TokenError::invalid_claims("no subject").to_string(),
            "Invalid claims: no subject"
        );
    }

    #[test]
    fn test_key_error_predicate() {
        assert!(TokenError::invalid_key("bad pem").is_key_error());
        assert!(!TokenError::Expired.is_key_error());
    }
}
