//! # Builder for SessionConfig
//!
//! Fluent construction of a [`SessionConfig`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use streamtail_engine::SessionConfig;
//!
//! let config = SessionConfig::builder()
//!     .with_connect_timeout(Duration::from_secs(10))
//!     .with_user_agent("MyApp/1.0")
//!     .with_header("X-Api-Key", "my-secret-key")
//!     .with_live_edge_segments(2)
//!     .build();
//!
//! assert_eq!(config.poller.live_edge_segments, 2);
//! ```

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::{SessionConfig, TwitchEndpoints};

/// Builder for creating SessionConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
        }
    }

    /// Set the overall timeout for the entire HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.timeout = timeout;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.connect_timeout = timeout;
        self
    }

    /// Set the read timeout (maximum time between receiving data chunks)
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.read_timeout = timeout;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.http.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.http.headers.insert(name, value);
        }
        self
    }

    /// Merge headers on top of the defaults; later values win.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.config.http.headers.insert(name.clone(), value.clone());
        }
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = client_id.into();
        self
    }

    pub fn with_endpoints(mut self, endpoints: TwitchEndpoints) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    pub fn with_live_edge_segments(mut self, count: usize) -> Self {
        self.config.poller.live_edge_segments = count;
        self
    }

    pub fn with_resolve_attempts(mut self, attempts: u32) -> Self {
        self.config.poller.resolve_max_attempts = attempts.max(1);
        self
    }

    pub fn with_playlist_attempts(mut self, attempts: u32) -> Self {
        self.config.poller.playlist_max_attempts = attempts.max(1);
        self
    }

    pub fn with_resolve_retry_delay(mut self, delay: Duration) -> Self {
        self.config.poller.resolve_retry_delay = delay;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.poller.queue_capacity = capacity.max(1);
        self
    }

    /// Build the final SessionConfig
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

impl Default for SessionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
