//! # Streamtail
//!
//! A live HLS tail for Twitch-style feeds. Given a channel and a quality
//! label, a [`Session`] obtains playback credentials, resolves the variant,
//! polls its media playlist and streams every new segment, in order, into
//! an output sink.
//!
//! ## Features
//!
//! - Anonymous, static-token or refresh-token authentication
//! - Two-tier retry: variant resolution nested inside playlist fetching
//! - Live-edge start and LRU deduplication of segments
//! - Bounded producer/consumer queue with backpressure
//! - Per-segment throughput reporting via [`StatusStream`]

pub mod auth;
pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod hls;
pub mod session;
pub mod twitch;

#[cfg(test)]
pub(crate) mod test_utils;

pub use auth::{TokenSource, build_token_source};
pub use builder::SessionConfigBuilder;
pub use client::create_client;
pub use config::{AuthConfig, AuthMode, HttpConfig, PollerConfig, SessionConfig, TwitchEndpoints};
pub use error::{AuthError, StreamtailError};
pub use hls::{BoxSink, SessionEnd, StatusEvent, StatusStream};
pub use session::{Session, StopHandle};
pub use twitch::ChannelIdentity;
