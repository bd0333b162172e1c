use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Public client id used by the Twitch web player.
pub const DEFAULT_CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";

/// HTTP client options shared by every request the session makes.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Overall timeout for a whole request. Zero disables it, which is what a
    /// live segment download usually wants.
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Read timeout (maximum time between receiving data chunks)
    pub read_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(0),
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: HttpConfig::get_default_headers(),
        }
    }
}

impl HttpConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        default_headers
    }
}

/// Knobs for the poll loop and the download queue.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Attempts allowed for one variant resolution run.
    pub resolve_max_attempts: u32,
    /// Fixed pause between two variant resolution attempts.
    pub resolve_retry_delay: Duration,
    /// Attempts allowed for fetching the media playlist within one cycle.
    /// Every failed attempt triggers a fresh variant resolution.
    pub playlist_max_attempts: u32,
    /// Timeout for a single media playlist request.
    pub playlist_fetch_timeout: Duration,
    /// How many of the newest segments are queued on the first productive cycle.
    pub live_edge_segments: usize,
    /// Capacity of the seen-segment LRU.
    pub seen_capacity: u64,
    /// Capacity of the poller -> downloader queue.
    pub queue_capacity: usize,
    /// Capacity of the status event channel.
    pub status_capacity: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            resolve_max_attempts: 5,
            resolve_retry_delay: Duration::from_secs(1),
            playlist_max_attempts: 5,
            playlist_fetch_timeout: Duration::from_secs(15),
            live_edge_segments: 4,
            seen_capacity: 1024,
            queue_capacity: 1024,
            status_capacity: 32,
        }
    }
}

/// Remote endpoints used to turn a channel name into a playable playlist.
#[derive(Debug, Clone)]
pub struct TwitchEndpoints {
    /// GraphQL endpoint serving the playback access token.
    pub gql_url: String,
    /// Base of the usher service that serves master playlists.
    pub usher_base_url: String,
    /// OAuth2 token endpoint for refresh-token exchanges.
    pub oauth_token_url: String,
}

impl Default for TwitchEndpoints {
    fn default() -> Self {
        Self {
            gql_url: "https://gql.twitch.tv/gql".to_owned(),
            usher_base_url: "https://usher.ttvnw.net".to_owned(),
            oauth_token_url: "https://id.twitch.tv/oauth2/token".to_owned(),
        }
    }
}

/// Optional account credentials. Which fields are present decides the
/// [`AuthMode`] of the session.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub oauth_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Anonymous,
    StaticToken,
    RefreshToken,
}

impl AuthConfig {
    /// A complete refresh-token triple wins over a static token; anything
    /// less falls back to anonymous access.
    pub fn mode(&self) -> AuthMode {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        if present(&self.refresh_token) && present(&self.client_id) && present(&self.client_secret)
        {
            AuthMode::RefreshToken
        } else if present(&self.oauth_token) {
            AuthMode::StaticToken
        } else {
            AuthMode::Anonymous
        }
    }
}

// --- Top-Level Configuration ---
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub http: HttpConfig,
    pub poller: PollerConfig,
    pub endpoints: TwitchEndpoints,
    /// Value of the `Client-Id` header sent to the token endpoint.
    pub client_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            poller: PollerConfig::default(),
            endpoints: TwitchEndpoints::default(),
            client_id: DEFAULT_CLIENT_ID.to_owned(),
        }
    }
}

impl SessionConfig {
    pub fn builder() -> crate::builder::SessionConfigBuilder {
        crate::builder::SessionConfigBuilder::new()
    }
}
