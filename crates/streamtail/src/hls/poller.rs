//! Live playlist poller.
//!
//! The poller is the producer side of a session. It resolves the wanted
//! variant, then refreshes its media playlist once per cycle, queues every
//! segment it has not seen before and paces itself on the playlist's target
//! duration.
//!
//! Failures are handled on two tiers. A failed playlist fetch counts against
//! an outer ceiling of attempts, and each failure re-runs variant resolution,
//! which has its own ceiling and delay. Running out of either ends the
//! session.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::PollerConfig;
use crate::hls::error::PlaylistError;
use crate::hls::events::SessionEnd;
use crate::hls::playlist::{
    MediaPlaylistSnapshot, PlaylistFetcher, VariantDescriptor, VariantSource, resolve_segment,
};
use crate::hls::queue::{PushError, WorkQueue};
use crate::hls::retry::{RetryAction, RetryError, RetryPolicy, with_retry};
use crate::hls::seen::SegmentCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    AcquiringVariant,
    Polling,
    ResolvingVariant,
    Stopped,
}

/// Sleep until the next refresh.
///
/// A cycle that found new segments waits a full target duration from its
/// start; an idle cycle polls again after half of it.
pub fn pacing_delay(target: Duration, elapsed: Duration, found_new: bool) -> Duration {
    let interval = if found_new { target } else { target / 2 };
    interval.saturating_sub(elapsed)
}

/// Trim the first productive batch down to the newest `edge` segments.
///
/// Every later batch passes through untouched.
pub fn live_edge_batch(mut new_segments: Vec<Url>, edge_found: &mut bool, edge: usize) -> Vec<Url> {
    if *edge_found || new_segments.is_empty() {
        return new_segments;
    }
    *edge_found = true;
    let skip = new_segments.len().saturating_sub(edge);
    new_segments.split_off(skip)
}

// Failure of one playlist fetch attempt.
enum FetchFault {
    Playlist(PlaylistError),
    Ended(SessionEnd),
}

impl fmt::Display for FetchFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFault::Playlist(e) => write!(f, "{e}"),
            FetchFault::Ended(end) => write!(f, "{end}"),
        }
    }
}

pub struct LivePoller {
    variant_source: Arc<dyn VariantSource>,
    playlist_fetcher: Arc<dyn PlaylistFetcher>,
    queue: WorkQueue,
    seen: SegmentCache,
    resolve_policy: RetryPolicy,
    playlist_policy: RetryPolicy,
    live_edge_segments: usize,
    edge_found: bool,
    token: CancellationToken,
    state: watch::Sender<PollerState>,
}

impl LivePoller {
    pub fn new(
        config: &PollerConfig,
        variant_source: Arc<dyn VariantSource>,
        playlist_fetcher: Arc<dyn PlaylistFetcher>,
        queue: WorkQueue,
        token: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(PollerState::AcquiringVariant);
        Self {
            variant_source,
            playlist_fetcher,
            queue,
            seen: SegmentCache::new(config.seen_capacity),
            resolve_policy: RetryPolicy::fixed(
                config.resolve_max_attempts,
                config.resolve_retry_delay,
            ),
            playlist_policy: RetryPolicy::immediate(config.playlist_max_attempts),
            live_edge_segments: config.live_edge_segments,
            edge_found: false,
            token,
            state,
        }
    }

    /// Publish state changes on an existing channel instead of a private one.
    pub fn with_state(mut self, state: watch::Sender<PollerState>) -> Self {
        state.send_replace(*self.state.borrow());
        self.state = state;
        self
    }

    #[cfg(test)]
    pub(crate) fn subscribe_state(&self) -> watch::Receiver<PollerState> {
        self.state.subscribe()
    }

    fn enter(&self, next: PollerState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = ?prev, to = ?next, "Poller state changed");
        }
    }

    /// Poll until the session ends, then close the work queue.
    pub async fn run(mut self) -> SessionEnd {
        let end = self.poll_loop().await;
        self.enter(PollerState::Stopped);
        self.queue.close();
        info!(reason = %end, "Poller finished");
        end
    }

    async fn poll_loop(&mut self) -> SessionEnd {
        let mut variant = match self.resolve_variant().await {
            Ok(variant) => variant,
            Err(end) => return end,
        };
        info!(variant = %variant.label, url = %variant.url, "Loading variant");
        self.enter(PollerState::Polling);

        loop {
            if self.token.is_cancelled() {
                return SessionEnd::Stopped;
            }

            let started = Instant::now();
            let snapshot = match self.fetch_playlist(&mut variant).await {
                Ok(snapshot) => snapshot,
                Err(end) => return end,
            };

            let new_segments = self.collect_new(&variant.url, &snapshot);
            let found_new = !new_segments.is_empty();
            let batch = live_edge_batch(new_segments, &mut self.edge_found, self.live_edge_segments);

            for url in batch {
                debug!(url = %url, "Queueing segment for download");
                match self.queue.push(url, &self.token).await {
                    Ok(()) => {}
                    Err(PushError::Cancelled) => return SessionEnd::Stopped,
                    Err(PushError::Closed) => {
                        warn!("Downloader is gone, stopping poller");
                        return SessionEnd::Stopped;
                    }
                }
            }

            if snapshot.ended {
                info!(variant = %variant.label, "Playlist ended");
                return SessionEnd::FeedEnded;
            }

            let delay = pacing_delay(snapshot.target_duration, started.elapsed(), found_new);
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return SessionEnd::Stopped,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Resolve the wanted variant under the resolution retry policy.
    async fn resolve_variant(&self) -> Result<VariantDescriptor, SessionEnd> {
        let source = &self.variant_source;
        let result = with_retry(&self.resolve_policy, &self.token, |attempt| async move {
            match source.resolve().await {
                Ok(variant) => RetryAction::Success(variant),
                Err(e) => {
                    debug!(attempt, error = %e, "Could not get variant");
                    RetryAction::Retry(e)
                }
            }
        })
        .await;

        match result {
            Ok(variant) => Ok(variant),
            Err(RetryError::Cancelled) => Err(SessionEnd::Stopped),
            Err(RetryError::Exhausted { attempts, last }) => {
                error!(attempts, error = %last, "Could not get variant URL. Aborting.");
                Err(SessionEnd::VariantUnavailable)
            }
            Err(RetryError::Fatal(e)) => {
                error!(error = %e, "Could not get variant URL. Aborting.");
                Err(SessionEnd::VariantUnavailable)
            }
        }
    }

    /// Fetch the media playlist for `variant`, re-resolving the variant after
    /// every failed attempt. `variant` is updated in place when it moves.
    async fn fetch_playlist(
        &self,
        variant: &mut VariantDescriptor,
    ) -> Result<MediaPlaylistSnapshot, SessionEnd> {
        let current = Mutex::new(variant.clone());
        let max_attempts = self.playlist_policy.max_attempts;

        let result = with_retry(&self.playlist_policy, &self.token, |attempt| {
            let current = &current;
            async move {
                let url = current.lock().url.clone();
                let err = match self.playlist_fetcher.fetch_media_playlist(&url).await {
                    Ok(snapshot) => return RetryAction::Success(snapshot),
                    Err(e) => e,
                };

                debug!(attempt, url = %url, error = %err, "Failed to fetch media playlist");
                if attempt + 1 >= max_attempts {
                    return RetryAction::Retry(FetchFault::Playlist(err));
                }

                debug!(attempt, "Attempting to get new variant location");
                self.enter(PollerState::ResolvingVariant);
                match self.resolve_variant().await {
                    Ok(next) => {
                        info!(attempt, url = %next.url, "New variant location found");
                        *current.lock() = next;
                        self.enter(PollerState::Polling);
                        RetryAction::Retry(FetchFault::Playlist(err))
                    }
                    Err(end) => RetryAction::Fail(FetchFault::Ended(end)),
                }
            }
        })
        .await;

        *variant = current.into_inner();
        match result {
            Ok(snapshot) => Ok(snapshot),
            Err(RetryError::Cancelled) => Err(SessionEnd::Stopped),
            Err(RetryError::Fatal(FetchFault::Ended(end))) => Err(end),
            Err(RetryError::Fatal(FetchFault::Playlist(e))) => {
                error!(error = %e, "Could not get playlist. Aborting.");
                Err(SessionEnd::PlaylistUnavailable)
            }
            Err(RetryError::Exhausted { attempts, last }) => {
                error!(attempts, error = %last, "Could not get playlist. Aborting.");
                Err(SessionEnd::PlaylistUnavailable)
            }
        }
    }

    /// Resolve the snapshot's segments and keep the unseen ones, in order.
    fn collect_new(&self, variant_url: &Url, snapshot: &MediaPlaylistSnapshot) -> Vec<Url> {
        let mut new_segments = Vec::new();
        for uri in &snapshot.segment_uris {
            let url = match resolve_segment(variant_url, uri) {
                Ok(url) => url,
                Err(e) => {
                    warn!(uri = %uri, error = %e, "Skipping unresolvable segment");
                    continue;
                }
            };
            if !self.seen.seen(&url) {
                self.seen.insert(url.clone());
                new_segments.push(url);
            }
        }
        debug!(
            media_sequence = snapshot.media_sequence,
            listed = snapshot.segment_uris.len(),
            new = new_segments.len(),
            "Playlist refreshed"
        );
        new_segments
    }
}
