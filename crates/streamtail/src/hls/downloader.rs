// Segment downloader: the single consumer of the work queue.
//
// Segments are written to the sink strictly in queue order. A segment that
// cannot be fetched is skipped; a sink that cannot be written ends the session.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use url::Url;

use crate::hls::events::StatusEvent;
use crate::hls::fetcher::SegmentFetcher;

/// Destination of the media bytes.
pub type BoxSink = Box<dyn AsyncWrite + Send + Unpin>;

/// How the download worker finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloaderExit {
    /// The queue was closed and every queued segment was handled.
    Drained,
    /// The session was stopped.
    Stopped,
    /// The sink rejected a write or flush.
    SinkFailed,
}

/// Bytes per second for one segment, truncated to a whole number.
///
/// A zero elapsed time reports zero.
pub fn throughput(bytes: u64, elapsed: Duration) -> u64 {
    if elapsed.is_zero() {
        return 0;
    }
    (bytes as f64 / elapsed.as_secs_f64()) as u64
}

enum SegmentOutcome {
    Written(StatusEvent),
    Skipped,
}

pub struct Downloader {
    fetcher: Arc<dyn SegmentFetcher>,
    sink: BoxSink,
    status_tx: Option<mpsc::Sender<StatusEvent>>,
    token: CancellationToken,
    bytes_total: u64,
}

impl Downloader {
    pub fn new(
        fetcher: Arc<dyn SegmentFetcher>,
        sink: BoxSink,
        status_tx: mpsc::Sender<StatusEvent>,
        token: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            sink,
            status_tx: Some(status_tx),
            token,
            bytes_total: 0,
        }
    }

    /// Drain `queue` until it closes or the session stops.
    ///
    /// The status sender is dropped on return, which ends the status stream.
    pub async fn run(mut self, mut queue: mpsc::Receiver<Url>) -> DownloaderExit {
        let exit = loop {
            let url = tokio::select! {
                biased;
                _ = self.token.cancelled() => break DownloaderExit::Stopped,
                next = queue.recv() => match next {
                    Some(url) => url,
                    None => break DownloaderExit::Drained,
                },
            };

            match self.download(&url).await {
                Ok(SegmentOutcome::Written(event)) => self.report(event).await,
                Ok(SegmentOutcome::Skipped) => {}
                Err(e) => {
                    error!(url = %url, error = %e, "Failed to write to output. Stopping.");
                    self.token.cancel();
                    break DownloaderExit::SinkFailed;
                }
            }
        };

        if exit != DownloaderExit::SinkFailed {
            if let Err(e) = self.sink.flush().await {
                warn!(error = %e, "Failed to flush output on exit");
            }
        }
        debug!(?exit, bytes_total = self.bytes_total, "Downloader finished");
        exit
    }

    /// Stream one segment into the sink. Only sink errors are returned.
    async fn download(&mut self, url: &Url) -> std::io::Result<SegmentOutcome> {
        let mut body = match self.fetcher.open_segment(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, error = %e, "Skipping segment");
                return Ok(SegmentOutcome::Skipped);
            }
        };
        // transfer time only, request latency excluded
        let started = Instant::now();

        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    self.sink.write_all(&bytes).await?;
                    written += bytes.len() as u64;
                }
                Err(e) => {
                    warn!(url = %url, written, error = %e, "Segment body interrupted");
                    self.bytes_total += written;
                    self.sink.flush().await?;
                    return Ok(SegmentOutcome::Skipped);
                }
            }
        }
        self.sink.flush().await?;

        self.bytes_total += written;
        let elapsed = started.elapsed();
        let bytes_per_second = throughput(written, elapsed);
        debug!(
            url = %url,
            bytes = written,
            elapsed_ms = elapsed.as_millis() as u64,
            bytes_per_second,
            "Segment written"
        );

        Ok(SegmentOutcome::Written(StatusEvent {
            bytes_total: self.bytes_total,
            bytes_per_second,
            last_file: url.clone(),
        }))
    }

    async fn report(&mut self, event: StatusEvent) {
        let Some(tx) = self.status_tx.as_ref() else {
            return;
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {}
            sent = tx.send(event) => {
                if sent.is_err() {
                    debug!("Status observer gone; no further status events");
                    self.status_tx = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::queue::work_queue;
    use crate::test_utils::{BrokenSink, FakeSegmentFetcher, SharedSink, url};
    use reqwest::StatusCode;

    const A: &str = "https://edge.example.com/a.ts";
    const B: &str = "https://edge.example.com/b.ts";
    const C: &str = "https://edge.example.com/c.ts";

    async fn run_with(
        fetcher: FakeSegmentFetcher,
        sink: BoxSink,
        urls: &[&str],
    ) -> (DownloaderExit, Vec<StatusEvent>) {
        let token = CancellationToken::new();
        let (status_tx, mut status_rx) = mpsc::channel(16);
        let (queue, rx) = work_queue(16);
        for u in urls {
            queue.push(url(u), &token).await.unwrap();
        }
        drop(queue);

        let downloader = Downloader::new(Arc::new(fetcher), sink, status_tx, token);
        let exit = downloader.run(rx).await;

        let mut events = Vec::new();
        while let Some(event) = status_rx.recv().await {
            events.push(event);
        }
        (exit, events)
    }

    #[test]
    fn throughput_truncates_and_guards_zero() {
        assert_eq!(throughput(1000, Duration::ZERO), 0);
        assert_eq!(throughput(1000, Duration::from_millis(999)), 1001);
        assert_eq!(throughput(1000, Duration::from_millis(1500)), 666);
        assert_eq!(throughput(1000, Duration::from_secs(3)), 333);
        assert_eq!(throughput(1_000_000, Duration::from_millis(500)), 2_000_000);
        assert_eq!(throughput(1_000_000, Duration::from_millis(1999)), 500_250);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_covers_body_transfer_only() {
        crate::init_test_tracing!();
        let fetcher = FakeSegmentFetcher::default().with_slow_body(
            A,
            Duration::from_secs(2),
            Duration::from_millis(500),
            "0123456789",
        );
        let sink = SharedSink::default();
        let (exit, events) = run_with(fetcher, Box::new(sink.clone()), &[A]).await;

        assert_eq!(exit, DownloaderExit::Drained);
        assert_eq!(sink.contents(), b"0123456789");
        assert_eq!(events.len(), 1);
        // 10 bytes over the 500ms body, not the 2.5s including the request
        let rate = events[0].bytes_per_second;
        assert!((18..=20).contains(&rate), "rate {rate}");
    }

    #[tokio::test]
    async fn writes_segments_in_queue_order() {
        crate::init_test_tracing!();
        let sink = SharedSink::default();
        let fetcher = FakeSegmentFetcher::default()
            .with_body(A, &["aa", "a"])
            .with_body(B, &["bbbb"])
            .with_body(C, &["c"]);

        let (exit, events) = run_with(fetcher, Box::new(sink.clone()), &[A, B, C]).await;

        assert_eq!(exit, DownloaderExit::Drained);
        assert_eq!(sink.contents(), b"aaabbbbc");
        let totals: Vec<u64> = events.iter().map(|e| e.bytes_total).collect();
        assert_eq!(totals, vec![3, 7, 8]);
        assert_eq!(events[2].last_file, url(C));
        // Fake transfers complete well under a second.
        assert!(events.iter().all(|e| e.bytes_per_second == 0));
    }

    #[tokio::test]
    async fn non_success_status_is_skipped_without_halting() {
        let sink = SharedSink::default();
        let fetcher = FakeSegmentFetcher::default()
            .with_body(A, &["aa"])
            .with_status(B, StatusCode::FORBIDDEN)
            .with_body(C, &["cc"]);

        let (exit, events) = run_with(fetcher, Box::new(sink.clone()), &[A, B, C]).await;

        assert_eq!(exit, DownloaderExit::Drained);
        assert_eq!(sink.contents(), b"aacc");
        let files: Vec<Url> = events.iter().map(|e| e.last_file.clone()).collect();
        assert_eq!(files, vec![url(A), url(C)]);
        assert_eq!(events[1].bytes_total, 4);
    }

    #[tokio::test]
    async fn interrupted_body_counts_bytes_but_emits_no_event() {
        let sink = SharedSink::default();
        let fetcher = FakeSegmentFetcher::default()
            .with_broken_body(A, "par")
            .with_body(B, &["bb"]);

        let (exit, events) = run_with(fetcher, Box::new(sink.clone()), &[A, B]).await;

        assert_eq!(exit, DownloaderExit::Drained);
        assert_eq!(sink.contents(), b"parbb");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].last_file, url(B));
        assert_eq!(events[0].bytes_total, 5);
    }

    #[tokio::test]
    async fn sink_failure_cancels_session() {
        let token = CancellationToken::new();
        let (status_tx, mut status_rx) = mpsc::channel(4);
        let (queue, rx) = work_queue(4);
        queue.push(url(A), &token).await.unwrap();

        let fetcher = FakeSegmentFetcher::default().with_body(A, &["aa"]);
        let downloader =
            Downloader::new(Arc::new(fetcher), Box::new(BrokenSink), status_tx, token.clone());

        assert_eq!(downloader.run(rx).await, DownloaderExit::SinkFailed);
        assert!(token.is_cancelled());
        assert!(status_rx.recv().await.is_none());
        drop(queue);
    }

    #[tokio::test]
    async fn stops_when_cancelled_while_idle() {
        let token = CancellationToken::new();
        let (status_tx, mut status_rx) = mpsc::channel(4);
        let (_queue, rx) = work_queue(4);
        let downloader = Downloader::new(
            Arc::new(FakeSegmentFetcher::default()),
            Box::new(SharedSink::default()),
            status_tx,
            token.clone(),
        );

        let handle = tokio::spawn(downloader.run(rx));
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        assert_eq!(handle.await.unwrap(), DownloaderExit::Stopped);
        assert!(status_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn keeps_downloading_after_observer_leaves() {
        let token = CancellationToken::new();
        let (status_tx, status_rx) = mpsc::channel(1);
        drop(status_rx);
        let (queue, rx) = work_queue(4);
        queue.push(url(A), &token).await.unwrap();
        queue.push(url(B), &token).await.unwrap();
        drop(queue);

        let sink = SharedSink::default();
        let fetcher = FakeSegmentFetcher::default()
            .with_body(A, &["a"])
            .with_body(B, &["b"]);
        let downloader = Downloader::new(Arc::new(fetcher), Box::new(sink.clone()), status_tx, token);

        assert_eq!(downloader.run(rx).await, DownloaderExit::Drained);
        assert_eq!(sink.contents(), b"ab");
    }
}
