use std::sync::Arc;

use reqwest::StatusCode;
use url::Url;

/// A playlist document could not be decoded.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid playlist: {0}")]
    Invalid(String),
    #[error("Expected a master playlist, got a media playlist")]
    NotMaster,
    #[error("Expected a media playlist, got a master playlist")]
    NotMedia,
}

#[derive(Debug, thiserror::Error, Clone)]
pub enum ResolveError {
    #[error("Variant '{wanted}' not found (available: {})", available.join(", "))]
    VariantNotFound {
        wanted: String,
        available: Vec<String>,
    },
    #[error("Network error: {source}")]
    Transport {
        #[from]
        source: Arc<reqwest::Error>,
    },
    #[error("Master playlist request returned status code {0}")]
    Status(StatusCode),
    #[error("Master playlist decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        ResolveError::Transport {
            source: Arc::new(err),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone)]
pub enum PlaylistError {
    #[error("Network error: {source}")]
    Transport {
        #[from]
        source: Arc<reqwest::Error>,
    },
    #[error("Media playlist request returned status code {0}")]
    Status(StatusCode),
    #[error("Media playlist request timed out")]
    Timeout,
    #[error("Media playlist decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl From<reqwest::Error> for PlaylistError {
    fn from(err: reqwest::Error) -> Self {
        PlaylistError::Transport {
            source: Arc::new(err),
        }
    }
}

/// Per-segment failure. The downloader logs it and moves on.
#[derive(Debug, thiserror::Error, Clone)]
pub enum SegmentFetchError {
    #[error("Network error for {url}: {source}")]
    Transport {
        url: Url,
        source: Arc<reqwest::Error>,
    },
    #[error("Segment {url} returned status code {status}")]
    Status { url: Url, status: StatusCode },
    #[error("Segment body error: {0}")]
    Body(String),
}
