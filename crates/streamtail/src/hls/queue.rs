use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("work queue is closed")]
    Closed,
    #[error("push cancelled")]
    Cancelled,
}

/// Producer half of the bounded segment queue.
///
/// Closing is single-shot: the first `close()` (or the drop) releases the
/// sender, which lets the consumer drain what is left and finish.
pub struct WorkQueue {
    tx: Option<mpsc::Sender<Url>>,
}

/// Create a bounded FIFO queue between the poller and the downloader.
pub fn work_queue(capacity: usize) -> (WorkQueue, mpsc::Receiver<Url>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (WorkQueue { tx: Some(tx) }, rx)
}

impl WorkQueue {
    /// Enqueue one segment, waiting while the queue is full.
    ///
    /// The wait ends early if `token` is cancelled.
    pub async fn push(&self, url: Url, token: &CancellationToken) -> Result<(), PushError> {
        let tx = self.tx.as_ref().ok_or(PushError::Closed)?;
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(PushError::Cancelled),
            sent = tx.send(url) => sent.map_err(|_| PushError::Closed),
        }
    }

    /// Returns `true` only for the call that actually closed the queue.
    pub fn close(&mut self) -> bool {
        match self.tx.take() {
            Some(_) => {
                debug!("Work queue closed");
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.tx.as_ref().is_none_or(|tx| tx.is_closed())
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn seg(n: u32) -> Url {
        Url::parse(&format!("https://edge.example.com/seg{n}.ts")).unwrap()
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let token = CancellationToken::new();
        let (queue, mut rx) = work_queue(8);
        for n in 0..5 {
            queue.push(seg(n), &token).await.unwrap();
        }
        drop(queue);

        let mut received = Vec::new();
        while let Some(url) = rx.recv().await {
            received.push(url);
        }
        assert_eq!(received, (0..5).map(seg).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn close_is_single_shot() {
        let (mut queue, mut rx) = work_queue(2);
        assert!(queue.close());
        assert!(!queue.close());
        assert!(queue.is_closed());
        assert!(rx.recv().await.is_none());

        let token = CancellationToken::new();
        assert_eq!(queue.push(seg(1), &token).await, Err(PushError::Closed));
    }

    #[tokio::test]
    async fn full_queue_applies_backpressure_until_cancelled() {
        let token = CancellationToken::new();
        let (queue, _rx) = work_queue(1);
        queue.push(seg(0), &token).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), queue.push(seg(1), &token));
        assert!(blocked.await.is_err(), "push into a full queue must wait");

        token.cancel();
        assert_eq!(queue.push(seg(1), &token).await, Err(PushError::Cancelled));
    }

    #[tokio::test]
    async fn push_fails_once_consumer_is_gone() {
        let token = CancellationToken::new();
        let (queue, rx) = work_queue(4);
        drop(rx);
        assert!(queue.is_closed());
        assert_eq!(queue.push(seg(0), &token).await, Err(PushError::Closed));
    }
}
