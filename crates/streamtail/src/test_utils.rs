use std::collections::{HashMap, VecDeque};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio::io::AsyncWrite;
use tokio::time::Instant;
use url::Url;

use crate::hls::{
    MediaPlaylistSnapshot, PlaylistError, PlaylistFetcher, ResolveError, SegmentBody,
    SegmentFetchError, SegmentFetcher, VariantDescriptor, VariantSource,
};

/// Macro to initialize tracing for tests
///
/// Usage:
/// - `init_test_tracing!()` - uses DEBUG level (default)
/// - `init_test_tracing!(INFO)` - uses specified level
#[macro_export]
macro_rules! init_test_tracing {
    () => {
        $crate::init_test_tracing!(DEBUG);
    };
    ($level:ident) => {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::$level)
            .with_test_writer()
            .try_init();
    };
}

/// Plain client for tests that never touch the network.
pub fn test_client() -> reqwest::Client {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    reqwest::Client::builder().build().unwrap()
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn variant(label: &str, s: &str) -> VariantDescriptor {
    VariantDescriptor {
        label: label.to_string(),
        url: url(s),
    }
}

pub fn snapshot(uris: &[&str]) -> MediaPlaylistSnapshot {
    snapshot_with_target(uris, Duration::from_millis(20))
}

pub fn snapshot_with_target(uris: &[&str], target_duration: Duration) -> MediaPlaylistSnapshot {
    MediaPlaylistSnapshot {
        target_duration,
        media_sequence: 0,
        segment_uris: uris.iter().map(|s| s.to_string()).collect(),
        ended: false,
    }
}

pub fn ended(uris: &[&str]) -> MediaPlaylistSnapshot {
    MediaPlaylistSnapshot {
        ended: true,
        ..snapshot(uris)
    }
}

/// In-memory sink that can be inspected while a session writes to it.
#[derive(Clone, Default)]
pub struct SharedSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl SharedSink {
    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().clone()
    }
}

impl AsyncWrite for SharedSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buf.lock().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Sink whose every write fails, like a closed pipe.
pub struct BrokenSink;

impl AsyncWrite for BrokenSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

enum FakeSegment {
    Body(Vec<&'static str>),
    Status(StatusCode),
    BrokenBody(&'static str),
    Slow {
        open_delay: Duration,
        body_delay: Duration,
        body: &'static str,
    },
}

/// Serves canned segment bodies; unknown URLs answer 404.
#[derive(Default)]
pub struct FakeSegmentFetcher {
    segments: Mutex<HashMap<Url, FakeSegment>>,
}

impl FakeSegmentFetcher {
    pub fn with_body(self, u: &str, chunks: &[&'static str]) -> Self {
        self.segments
            .lock()
            .insert(url(u), FakeSegment::Body(chunks.to_vec()));
        self
    }

    pub fn with_status(self, u: &str, status: StatusCode) -> Self {
        self.segments
            .lock()
            .insert(url(u), FakeSegment::Status(status));
        self
    }

    /// Answers after `open_delay`; the body then takes `body_delay` to arrive.
    pub fn with_slow_body(
        self,
        u: &str,
        open_delay: Duration,
        body_delay: Duration,
        body: &'static str,
    ) -> Self {
        self.segments.lock().insert(
            url(u),
            FakeSegment::Slow {
                open_delay,
                body_delay,
                body,
            },
        );
        self
    }

    /// Yields `first` and then a body error.
    pub fn with_broken_body(self, u: &str, first: &'static str) -> Self {
        self.segments
            .lock()
            .insert(url(u), FakeSegment::BrokenBody(first));
        self
    }
}

#[async_trait]
impl SegmentFetcher for FakeSegmentFetcher {
    async fn open_segment(&self, u: &Url) -> Result<SegmentBody, SegmentFetchError> {
        let slow = match self.segments.lock().get(u) {
            Some(FakeSegment::Slow {
                open_delay,
                body_delay,
                body,
            }) => Some((*open_delay, *body_delay, *body)),
            _ => None,
        };
        if let Some((open_delay, body_delay, body)) = slow {
            tokio::time::sleep(open_delay).await;
            let chunk = futures::stream::once(async move {
                tokio::time::sleep(body_delay).await;
                Ok(Bytes::from_static(body.as_bytes()))
            });
            return Ok(chunk.boxed());
        }

        let segments = self.segments.lock();
        match segments.get(u) {
            Some(FakeSegment::Body(chunks)) => {
                let items: Vec<Result<Bytes, SegmentFetchError>> = chunks
                    .iter()
                    .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                    .collect();
                Ok(futures::stream::iter(items).boxed())
            }
            Some(FakeSegment::BrokenBody(first)) => {
                let items = vec![
                    Ok(Bytes::from_static(first.as_bytes())),
                    Err(SegmentFetchError::Body("connection reset".to_string())),
                ];
                Ok(futures::stream::iter(items).boxed())
            }
            Some(FakeSegment::Slow { .. }) => unreachable!("handled above"),
            Some(FakeSegment::Status(status)) => Err(SegmentFetchError::Status {
                url: u.clone(),
                status: *status,
            }),
            None => Err(SegmentFetchError::Status {
                url: u.clone(),
                status: StatusCode::NOT_FOUND,
            }),
        }
    }
}

/// Replays scripted resolution results, then repeats the last one.
pub struct ScriptedVariantSource {
    script: Mutex<VecDeque<Result<VariantDescriptor, ResolveError>>>,
    last: Mutex<Option<Result<VariantDescriptor, ResolveError>>>,
    calls: AtomicUsize,
}

impl ScriptedVariantSource {
    pub fn new(script: Vec<Result<VariantDescriptor, ResolveError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(descriptor: VariantDescriptor) -> Self {
        Self::new(vec![Ok(descriptor)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn not_found(wanted: &str) -> ResolveError {
    ResolveError::VariantNotFound {
        wanted: wanted.to_string(),
        available: vec!["chunked".to_string()],
    }
}

#[async_trait]
impl VariantSource for ScriptedVariantSource {
    async fn resolve(&self) -> Result<VariantDescriptor, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some(result) => {
                *self.last.lock() = Some(result.clone());
                result
            }
            None => self
                .last
                .lock()
                .clone()
                .unwrap_or_else(|| Err(not_found("chunked"))),
        }
    }
}

/// Replays scripted media playlists, then repeats the last successful one.
pub struct ScriptedPlaylistFetcher {
    script: Mutex<VecDeque<Result<MediaPlaylistSnapshot, PlaylistError>>>,
    last_ok: Mutex<Option<MediaPlaylistSnapshot>>,
    requested: Mutex<Vec<Url>>,
    fetched_at: Mutex<Vec<Instant>>,
}

impl ScriptedPlaylistFetcher {
    pub fn new(script: Vec<Result<MediaPlaylistSnapshot, PlaylistError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last_ok: Mutex::new(None),
            requested: Mutex::new(Vec::new()),
            fetched_at: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<Url> {
        self.requested.lock().clone()
    }

    /// Clock reading at each fetch, in call order.
    pub fn fetched_at(&self) -> Vec<Instant> {
        self.fetched_at.lock().clone()
    }

    pub fn fetches(&self) -> usize {
        self.requested.lock().len()
    }
}

pub fn playlist_gone() -> PlaylistError {
    PlaylistError::Status(StatusCode::NOT_FOUND)
}

#[async_trait]
impl PlaylistFetcher for ScriptedPlaylistFetcher {
    async fn fetch_media_playlist(
        &self,
        u: &Url,
    ) -> Result<MediaPlaylistSnapshot, PlaylistError> {
        self.requested.lock().push(u.clone());
        self.fetched_at.lock().push(Instant::now());
        let next = self.script.lock().pop_front();
        match next {
            Some(Ok(snapshot)) => {
                *self.last_ok.lock() = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(e)) => Err(e),
            None => self.last_ok.lock().clone().ok_or_else(playlist_gone),
        }
    }
}
