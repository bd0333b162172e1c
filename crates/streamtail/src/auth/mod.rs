//! Account tokens attached to the playback credential request.
//!
//! A session runs with exactly one [`TokenSource`], picked from the
//! [`AuthConfig`] once at startup.

mod refresh;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::{AuthConfig, AuthMode};
use crate::error::AuthError;

pub use refresh::RefreshTokenSource;

/// An OAuth access token. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(***{} chars)", self.0.len())
    }
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Token to present, or `None` for anonymous access.
    async fn token(&self) -> Result<Option<Token>, AuthError>;

    fn mode(&self) -> AuthMode;
}

pub struct AnonymousTokenSource;

#[async_trait]
impl TokenSource for AnonymousTokenSource {
    async fn token(&self) -> Result<Option<Token>, AuthError> {
        Ok(None)
    }

    fn mode(&self) -> AuthMode {
        AuthMode::Anonymous
    }
}

/// A fixed, externally obtained token.
pub struct StaticTokenSource {
    token: Token,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Token::new(token),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<Option<Token>, AuthError> {
        Ok(Some(self.token.clone()))
    }

    fn mode(&self) -> AuthMode {
        AuthMode::StaticToken
    }
}

/// Pick the token source matching the configured credentials.
pub fn build_token_source(
    config: &AuthConfig,
    client: Client,
    token_url: &str,
) -> Arc<dyn TokenSource> {
    let mode = config.mode();
    debug!(?mode, "Selected token source");
    match (
        mode,
        &config.client_id,
        &config.client_secret,
        &config.refresh_token,
        &config.oauth_token,
    ) {
        (AuthMode::RefreshToken, Some(id), Some(secret), Some(refresh), _) => {
            Arc::new(RefreshTokenSource::new(
                client,
                token_url,
                id.trim(),
                secret.trim(),
                refresh.trim(),
            ))
        }
        (AuthMode::StaticToken, _, _, _, Some(token)) => {
            Arc::new(StaticTokenSource::new(token.trim()))
        }
        _ => Arc::new(AnonymousTokenSource),
    }
}
