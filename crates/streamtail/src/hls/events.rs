use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use url::Url;

/// Progress report emitted after every fully written segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    /// Bytes written to the sink since the session started.
    pub bytes_total: u64,
    /// Throughput of the segment that just completed.
    pub bytes_per_second: u64,
    pub last_file: Url,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// `stop()` was called or the handle was dropped.
    Stopped,
    /// The media playlist carried `#EXT-X-ENDLIST`.
    FeedEnded,
    /// Playback credentials could not be obtained.
    CredentialFailed,
    /// Variant resolution ran out of attempts.
    VariantUnavailable,
    /// The media playlist could not be fetched within the attempt ceiling.
    PlaylistUnavailable,
    /// Writing to the output sink failed.
    SinkFailed,
}

impl SessionEnd {
    /// Whether the session ended without a fault on our side.
    pub fn is_clean(self) -> bool {
        matches!(self, SessionEnd::Stopped | SessionEnd::FeedEnded)
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SessionEnd::Stopped => "stopped",
            SessionEnd::FeedEnded => "feed ended",
            SessionEnd::CredentialFailed => "could not obtain playback credentials",
            SessionEnd::VariantUnavailable => "could not get variant URL",
            SessionEnd::PlaylistUnavailable => "could not get playlist",
            SessionEnd::SinkFailed => "output sink failed",
        };
        f.write_str(reason)
    }
}

/// Stream of [`StatusEvent`]s. Ends when the downloader exits.
pub struct StatusStream {
    inner: ReceiverStream<StatusEvent>,
}

impl StatusStream {
    pub(crate) fn new(rx: mpsc::Receiver<StatusEvent>) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
        }
    }
}

impl Stream for StatusStream {
    type Item = StatusEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
