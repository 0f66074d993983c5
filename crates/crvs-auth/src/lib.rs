//! # crvs-auth
//!
//! Decodes the bearer tokens that accompany registration requests into a
//! [`TokenPayload`]. Signature verification is optional: when the service
//! sits behind a gateway that already verified the token, the payload is
//! decoded as-is; otherwise a verifying key is configured on the
//! [`TokenDecoder`].

mod error;
pub mod token;

pub use error::TokenError;
pub use token::{Audience, TokenDecoder, TokenPayload, bearer_token, scopes};
