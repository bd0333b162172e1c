use std::sync::Arc;

use reqwest::StatusCode;

use crate::hls::{PlaylistError, ResolveError};

/// Failures while obtaining account tokens or playback credentials.
///
/// None of these are retried: a session that cannot get credentials ends.
#[derive(Debug, thiserror::Error, Clone)]
pub enum AuthError {
    #[error("Network error: {source}")]
    Transport {
        #[from]
        source: Arc<reqwest::Error>,
    },
    #[error("{endpoint} returned status code {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
    #[error("Malformed {endpoint} response: {reason}")]
    Decode {
        endpoint: &'static str,
        reason: String,
    },
    #[error("Token source error: {0}")]
    TokenSource(String),
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Transport {
            source: Arc::new(err),
        }
    }
}

// Top-level error for session setup and teardown
#[derive(Debug, thiserror::Error)]
pub enum StreamtailError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid channel: {0}")]
    InvalidChannel(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Variant resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
