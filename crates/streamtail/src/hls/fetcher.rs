// Segment fetcher: opens one media segment as a byte stream.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use tracing::trace;
use url::Url;

use crate::hls::error::SegmentFetchError;

/// Body of one segment, delivered chunk by chunk.
pub type SegmentBody = BoxStream<'static, Result<Bytes, SegmentFetchError>>;

#[async_trait]
pub trait SegmentFetcher: Send + Sync {
    /// Issue the request for `url`. Transport failures and non-2xx statuses
    /// are reported here; body errors surface from the returned stream.
    async fn open_segment(&self, url: &Url) -> Result<SegmentBody, SegmentFetchError>;
}

pub struct HttpSegmentFetcher {
    http_client: Client,
}

impl HttpSegmentFetcher {
    pub fn new(http_client: Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl SegmentFetcher for HttpSegmentFetcher {
    async fn open_segment(&self, url: &Url) -> Result<SegmentBody, SegmentFetchError> {
        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SegmentFetchError::Transport {
                url: url.clone(),
                source: Arc::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SegmentFetchError::Status {
                url: url.clone(),
                status,
            });
        }

        trace!(url = %url, content_length = ?response.content_length(), "Segment response");

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| SegmentFetchError::Body(e.to_string())))
            .boxed())
    }
}
