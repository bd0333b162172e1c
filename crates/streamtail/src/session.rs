//! Session lifecycle.
//!
//! A [`Session`] wires credential acquisition, variant resolution, the live
//! poller and the downloader together, and owns the two tasks that run them.
//! It ends on an explicit stop, when the feed ends, or when one of the
//! fatal conditions in [`SessionEnd`] is hit.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use url::Url;

use crate::auth::TokenSource;
use crate::client::create_client;
use crate::config::{PollerConfig, SessionConfig};
use crate::error::StreamtailError;
use crate::hls::{
    BoxSink, Downloader, DownloaderExit, HttpPlaylistFetcher, HttpSegmentFetcher, LivePoller,
    PlaylistFetcher, PollerState, SegmentFetcher, SessionEnd, StatusStream, VariantSource,
    work_queue,
};
use crate::twitch::{AccessTokenClient, ChannelIdentity, UsherResolver};

/// Cloneable handle that can stop a session from elsewhere.
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub struct Session {
    token: CancellationToken,
    poller: Option<JoinHandle<SessionEnd>>,
    downloader: Option<JoinHandle<DownloaderExit>>,
    state: watch::Receiver<PollerState>,
    end: Option<SessionEnd>,
}

impl Session {
    /// Start tailing `identity` and writing its segments into `sink`.
    ///
    /// Credentials are acquired inside the poller task, so this returns as
    /// soon as the HTTP client is built. Must be called within a tokio runtime.
    pub fn spawn(
        config: SessionConfig,
        identity: ChannelIdentity,
        token_source: Arc<dyn TokenSource>,
        sink: BoxSink,
    ) -> Result<(Session, StatusStream), StreamtailError> {
        Url::parse(&config.endpoints.usher_base_url).map_err(|e| {
            StreamtailError::Config(format!(
                "Invalid usher URL {}: {e}",
                config.endpoints.usher_base_url
            ))
        })?;
        let client = create_client(&config.http)?;

        let access = AccessTokenClient::new(
            client.clone(),
            config.endpoints.gql_url.clone(),
            config.client_id.clone(),
            token_source,
        );
        let usher_base_url = config.endpoints.usher_base_url.clone();
        let resolver_client = client.clone();

        let variant_source = async move {
            let credential = access.acquire(&identity).await.map_err(|e| {
                error!(channel = identity.channel(), error = %e, "Token error");
                SessionEnd::CredentialFailed
            })?;
            let resolver = UsherResolver::new(resolver_client, &usher_base_url, identity, credential)
                .map_err(|e| {
                    error!(error = %e, "Could not build variant resolver");
                    SessionEnd::VariantUnavailable
                })?;
            Ok::<Arc<dyn VariantSource>, SessionEnd>(Arc::new(resolver))
        };

        let playlist_fetcher = Arc::new(HttpPlaylistFetcher::new(
            client.clone(),
            config.poller.playlist_fetch_timeout,
        ));
        let segment_fetcher = Arc::new(HttpSegmentFetcher::new(client));

        Ok(Self::launch(
            &config.poller,
            variant_source,
            playlist_fetcher,
            segment_fetcher,
            sink,
        ))
    }

    /// Start a session over caller-provided sources.
    pub fn with_sources(
        config: &PollerConfig,
        variant_source: Arc<dyn VariantSource>,
        playlist_fetcher: Arc<dyn PlaylistFetcher>,
        segment_fetcher: Arc<dyn SegmentFetcher>,
        sink: BoxSink,
    ) -> (Session, StatusStream) {
        Self::launch(
            config,
            async move { Ok(variant_source) },
            playlist_fetcher,
            segment_fetcher,
            sink,
        )
    }

    fn launch<F>(
        config: &PollerConfig,
        variant_source: F,
        playlist_fetcher: Arc<dyn PlaylistFetcher>,
        segment_fetcher: Arc<dyn SegmentFetcher>,
        sink: BoxSink,
    ) -> (Session, StatusStream)
    where
        F: Future<Output = Result<Arc<dyn VariantSource>, SessionEnd>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let (mut queue, queue_rx) = work_queue(config.queue_capacity);
        let (status_tx, status_rx) = mpsc::channel(config.status_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(PollerState::AcquiringVariant);

        let downloader = Downloader::new(segment_fetcher, sink, status_tx, token.clone());
        let downloader = tokio::spawn(downloader.run(queue_rx));

        let poller_config = config.clone();
        let poller_token = token.clone();
        let poller = tokio::spawn(async move {
            let acquired = tokio::select! {
                biased;
                _ = poller_token.cancelled() => Err(SessionEnd::Stopped),
                acquired = variant_source => acquired,
            };
            match acquired {
                Ok(source) => {
                    LivePoller::new(
                        &poller_config,
                        source,
                        playlist_fetcher,
                        queue,
                        poller_token,
                    )
                    .with_state(state_tx)
                    .run()
                    .await
                }
                Err(end) => {
                    state_tx.send_replace(PollerState::Stopped);
                    queue.close();
                    info!(reason = %end, "Session ended before polling started");
                    end
                }
            }
        });

        let session = Session {
            token,
            poller: Some(poller),
            downloader: Some(downloader),
            state: state_rx,
            end: None,
        };
        (session, StatusStream::new(status_rx))
    }

    /// Request the session to stop. Safe to call any number of times, also
    /// after the session has ended on its own.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            debug!("Stopping session");
        }
        self.token.cancel();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.token.clone(),
        }
    }

    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    /// Wait for both tasks to finish and report why the session ended.
    ///
    /// A failing sink takes precedence over whatever the poller saw, since
    /// the poller only observes the resulting stop.
    pub async fn wait(&mut self) -> Result<SessionEnd, StreamtailError> {
        if let Some(end) = self.end {
            return Ok(end);
        }

        let poller_end = match self.poller.take() {
            Some(handle) => handle.await?,
            None => SessionEnd::Stopped,
        };
        let downloader_exit = match self.downloader.take() {
            Some(handle) => handle.await?,
            None => DownloaderExit::Stopped,
        };

        let end = match downloader_exit {
            DownloaderExit::SinkFailed => SessionEnd::SinkFailed,
            _ => poller_end,
        };
        debug!(?poller_end, ?downloader_exit, %end, "Session finished");
        self.end = Some(end);
        Ok(end)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
