//! Credential provider for the marketing platform APIs
//!
//! One [`TokenCache`] is built at startup and shared by every adapter and
//! handler through an `Arc`. All token state lives behind a single async
//! mutex so at most one refresh is in flight at a time.

mod token_cache;

pub use token_cache::{OAuthSettings, TokenCache};

use async_trait::async_trait;
use thiserror::Error;

/// Credential errors
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Nobody has completed the OAuth login yet (or the session was logged out)
    #[error("Not authorized: no refresh token available")]
    NoRefreshToken,

    #[error("Token endpoint request failed: {0}")]
    Network(String),

    #[error("Token endpoint returned status {0}")]
    Status(u16),

    #[error("Invalid token endpoint response: {0}")]
    Parse(String),
}

/// Source of bearer tokens for upstream calls
///
/// Implementations must be safe for concurrent callers.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current access token, refreshing it first when expired
    async fn token(&self) -> Result<String, CredentialError>;

    /// Forget all token state
    async fn invalidate(&self);
}
