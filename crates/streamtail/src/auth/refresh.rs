use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Token, TokenSource};
use crate::config::AuthMode;
use crate::error::AuthError;

/// Tokens are renewed this long before they actually expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct RefreshState {
    refresh_token: String,
    cached: Option<CachedToken>,
}

struct CachedToken {
    token: Token,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now + EXPIRY_MARGIN < at)
    }
}

fn parse_token_response(body: &[u8]) -> Result<TokenResponse, AuthError> {
    let response: TokenResponse =
        serde_json::from_slice(body).map_err(|e| AuthError::Decode {
            endpoint: "oauth2 token",
            reason: e.to_string(),
        })?;
    if response.access_token.is_empty() {
        return Err(AuthError::Decode {
            endpoint: "oauth2 token",
            reason: "empty access_token".to_string(),
        });
    }
    Ok(response)
}

impl RefreshState {
    /// Store a fresh token; a rotated refresh token replaces the old one.
    fn apply(&mut self, response: TokenResponse, now: Instant) -> Token {
        if let Some(rotated) = response.refresh_token.filter(|t| !t.is_empty()) {
            debug!("Refresh token rotated");
            self.refresh_token = rotated;
        }
        let token = Token::new(response.access_token);
        self.cached = Some(CachedToken {
            token: token.clone(),
            expires_at: response
                .expires_in
                .map(|secs| now + Duration::from_secs(secs)),
        });
        token
    }
}

/// Exchanges a long-lived refresh token for access tokens on demand.
pub struct RefreshTokenSource {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    state: Mutex<RefreshState>,
}

impl RefreshTokenSource {
    pub fn new(
        client: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            state: Mutex::new(RefreshState {
                refresh_token: refresh_token.into(),
                cached: None,
            }),
        }
    }

    async fn exchange(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status {
                endpoint: "oauth2 token",
                status,
            });
        }

        let body = response.bytes().await?;
        parse_token_response(&body)
    }
}

#[async_trait]
impl TokenSource for RefreshTokenSource {
    async fn token(&self) -> Result<Option<Token>, AuthError> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        if let Some(cached) = state.cached.as_ref().filter(|c| c.is_fresh(now)) {
            return Ok(Some(cached.token.clone()));
        }

        debug!(url = %self.token_url, "Refreshing OAuth access token");
        let response = self.exchange(&state.refresh_token).await?;
        let token = state.apply(response, Instant::now());
        info!("Obtained OAuth access token");
        Ok(Some(token))
    }

    fn mode(&self) -> AuthMode {
        AuthMode::RefreshToken
    }
}
