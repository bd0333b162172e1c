//! Twitch-specific plumbing: the playback access token and the usher
//! master playlist.

pub mod access_token;
pub mod usher;

use crate::error::StreamtailError;

pub use access_token::{AccessTokenClient, PlaybackCredential, parse_access_token};
pub use usher::UsherResolver;

/// What to watch: a channel login and the variant label to follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelIdentity {
    channel: String,
    variant: String,
}

impl ChannelIdentity {
    /// Channel names are case-insensitive and stored lowercased.
    pub fn new(
        channel: impl AsRef<str>,
        variant: impl Into<String>,
    ) -> Result<Self, StreamtailError> {
        let channel = channel.as_ref().trim().to_lowercase();
        if channel.is_empty() {
            return Err(StreamtailError::InvalidChannel(
                "channel name must not be empty".to_string(),
            ));
        }
        if !channel
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(StreamtailError::InvalidChannel(channel));
        }

        let variant = variant.into();
        if variant.trim().is_empty() {
            return Err(StreamtailError::InvalidChannel(
                "variant label must not be empty".to_string(),
            ));
        }

        Ok(Self { channel, variant })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }
}
