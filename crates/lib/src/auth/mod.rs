//! Bot Framework authentication.
//!
//! Outbound: client-credentials tokens for calls to the channel service.
//! Inbound: validation of the JWT the channel attaches to each activity POST.

mod jwt;
mod token;

pub use jwt::{
    BotClaims, JwtValidator, BOT_FRAMEWORK_ISSUER, BOT_FRAMEWORK_OPENID_METADATA,
    EMULATOR_OPENID_METADATA,
};
pub use token::{TokenProvider, BOT_FRAMEWORK_SCOPE, BOT_FRAMEWORK_TOKEN_ENDPOINT};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("openid metadata unavailable: {0}")]
    Metadata(String),
    #[error("token request failed: {0}")]
    TokenRequest(String),
}
