// HLS playlist decoding and media playlist fetching.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use m3u8_rs::{MasterPlaylist, MediaPlaylist, VariantStream, parse_playlist_res};
use reqwest::Client;
use tracing::{debug, trace};
use url::Url;

use crate::hls::error::{DecodeError, PlaylistError, ResolveError};

/// Target duration used when a playlist advertises none.
pub const FALLBACK_TARGET_DURATION: Duration = Duration::from_secs(2);

/// One selectable quality of a live feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDescriptor {
    pub label: String,
    pub url: Url,
}

/// The parts of a media playlist the poller acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPlaylistSnapshot {
    pub target_duration: Duration,
    pub media_sequence: u64,
    /// Segment URIs in playlist order, exactly as written in the document.
    pub segment_uris: Vec<String>,
    /// `#EXT-X-ENDLIST` was present.
    pub ended: bool,
}

/// Resolves the variant the session should follow.
#[async_trait]
pub trait VariantSource: Send + Sync {
    async fn resolve(&self) -> Result<VariantDescriptor, ResolveError>;
}

/// Fetches and decodes one media playlist.
#[async_trait]
pub trait PlaylistFetcher: Send + Sync {
    async fn fetch_media_playlist(&self, url: &Url)
    -> Result<MediaPlaylistSnapshot, PlaylistError>;
}

fn parse(bytes: &[u8]) -> Result<m3u8_rs::Playlist, DecodeError> {
    parse_playlist_res(bytes).map_err(|e| DecodeError::Invalid(e.to_string()))
}

fn variant_label(variant: &VariantStream) -> Option<String> {
    if let Some(video) = variant.video.as_deref().filter(|v| !v.is_empty()) {
        return Some(video.to_string());
    }
    variant.resolution.map(|r| format!("{}p", r.height))
}

/// Decode a master playlist into `(label, url)` pairs.
///
/// Labels come from the `VIDEO` group id, or `<height>p` when a variant has
/// none. I-frame variants and variants that cannot be labelled or resolved are
/// skipped.
pub fn decode_master(bytes: &[u8], base: &Url) -> Result<Vec<VariantDescriptor>, DecodeError> {
    let master: MasterPlaylist = match parse(bytes)? {
        m3u8_rs::Playlist::MasterPlaylist(pl) => pl,
        m3u8_rs::Playlist::MediaPlaylist(_) => return Err(DecodeError::NotMaster),
    };

    let mut variants = Vec::with_capacity(master.variants.len());
    for variant in master.variants.iter().filter(|v| !v.is_i_frame) {
        let Some(label) = variant_label(variant) else {
            trace!(uri = %variant.uri, "Skipping unlabelled variant");
            continue;
        };
        match base.join(&variant.uri) {
            Ok(url) => variants.push(VariantDescriptor { label, url }),
            Err(e) => debug!(uri = %variant.uri, error = %e, "Skipping unresolvable variant"),
        }
    }
    Ok(variants)
}

/// Decode a media playlist.
pub fn decode_media(bytes: &[u8]) -> Result<MediaPlaylistSnapshot, DecodeError> {
    let media: MediaPlaylist = match parse(bytes)? {
        m3u8_rs::Playlist::MediaPlaylist(pl) => pl,
        m3u8_rs::Playlist::MasterPlaylist(_) => return Err(DecodeError::NotMedia),
    };

    let target_duration = match media.target_duration {
        0 => FALLBACK_TARGET_DURATION,
        secs => Duration::from_secs(secs),
    };

    Ok(MediaPlaylistSnapshot {
        target_duration,
        media_sequence: media.media_sequence,
        segment_uris: media.segments.into_iter().map(|s| s.uri).collect(),
        ended: media.end_list,
    })
}

/// Turn a segment URI from a media playlist into an absolute URL.
///
/// Absolute URIs pass through; relative ones are joined against the variant
/// URL, replacing its last path component.
pub fn resolve_segment(variant_url: &Url, uri: &str) -> Result<Url, url::ParseError> {
    match Url::parse(uri) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => variant_url.join(uri),
        Err(e) => Err(e),
    }
}

/// Pick the variant whose label equals `wanted`.
pub fn select_variant(
    variants: Vec<VariantDescriptor>,
    wanted: &str,
) -> Result<VariantDescriptor, ResolveError> {
    let available: Vec<String> = variants.iter().map(|v| v.label.clone()).collect();
    variants
        .into_iter()
        .find(|v| v.label == wanted)
        .ok_or_else(|| ResolveError::VariantNotFound {
            wanted: wanted.to_string(),
            available,
        })
}

/// [`PlaylistFetcher`] over HTTP with a per-request timeout.
pub struct HttpPlaylistFetcher {
    http_client: Client,
    fetch_timeout: Duration,
}

impl HttpPlaylistFetcher {
    pub fn new(http_client: Client, fetch_timeout: Duration) -> Self {
        Self {
            http_client,
            fetch_timeout,
        }
    }
}

#[async_trait]
impl PlaylistFetcher for HttpPlaylistFetcher {
    async fn fetch_media_playlist(
        &self,
        url: &Url,
    ) -> Result<MediaPlaylistSnapshot, PlaylistError> {
        let mut request = self.http_client.get(url.clone());
        if !self.fetch_timeout.is_zero() {
            request = request.timeout(self.fetch_timeout);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PlaylistError::Timeout
            } else {
                PlaylistError::Transport {
                    source: Arc::new(e),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(PlaylistError::Status(response.status()));
        }

        let playlist_bytes = response.bytes().await?;
        trace!(url = %url, len = playlist_bytes.len(), "Fetched media playlist");

        Ok(decode_media(&playlist_bytes)?)
    }
}
