use async_trait::async_trait;
use rand::RngExt;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::error::StreamtailError;
use crate::hls::error::ResolveError;
use crate::hls::playlist::{VariantDescriptor, VariantSource, decode_master, select_variant};
use crate::twitch::{ChannelIdentity, PlaybackCredential};

/// Resolves the wanted variant from the channel's usher master playlist.
pub struct UsherResolver {
    client: Client,
    endpoint: Url,
    identity: ChannelIdentity,
    credential: PlaybackCredential,
}

impl UsherResolver {
    pub fn new(
        client: Client,
        usher_base_url: &str,
        identity: ChannelIdentity,
        credential: PlaybackCredential,
    ) -> Result<Self, StreamtailError> {
        let endpoint = format!(
            "{}/api/channel/hls/{}.m3u8",
            usher_base_url.trim_end_matches('/'),
            identity.channel()
        );
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| StreamtailError::Config(format!("Invalid usher URL {endpoint}: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            identity,
            credential,
        })
    }

    /// Master playlist URL with a fresh cache-busting `p` parameter.
    pub fn master_url(&self) -> Url {
        let p = rand::rng().random_range(0..10_000_000u32).to_string();
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("player", "twitchweb")
            .append_pair("p", &p)
            .append_pair("allow_source", "true")
            .append_pair("allow_audio_only", "true")
            .append_pair("type", "any")
            .append_pair("token", &self.credential.token)
            .append_pair("sig", &self.credential.signature);
        url
    }
}

#[async_trait]
impl VariantSource for UsherResolver {
    async fn resolve(&self) -> Result<VariantDescriptor, ResolveError> {
        let url = self.master_url();
        debug!(channel = self.identity.channel(), "Requesting master playlist");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status(status));
        }
        let base = response.url().clone();
        let body = response.bytes().await?;

        let variants = decode_master(&body, &base)?;
        let labels: Vec<&str> = variants.iter().map(|v| v.label.as_str()).collect();
        info!(
            channel = self.identity.channel(),
            variants = %labels.join(" "),
            "Variants found"
        );

        select_variant(variants, self.identity.variant())
    }
}
