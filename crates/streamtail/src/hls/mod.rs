// Live HLS tail: playlist polling, segment queueing and ordered download

pub mod downloader;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod playlist;
pub mod poller;
pub mod queue;
pub mod retry;
pub mod seen;

// Re-exports for easier access
pub use downloader::{BoxSink, Downloader, DownloaderExit, throughput};
pub use error::{DecodeError, PlaylistError, ResolveError, SegmentFetchError};
pub use events::{SessionEnd, StatusEvent, StatusStream};
pub use fetcher::{HttpSegmentFetcher, SegmentBody, SegmentFetcher};
pub use playlist::{
    HttpPlaylistFetcher, MediaPlaylistSnapshot, PlaylistFetcher, VariantDescriptor, VariantSource,
    decode_master, decode_media, resolve_segment, select_variant,
};
pub use poller::{LivePoller, PollerState};
pub use queue::{PushError, WorkQueue, work_queue};
pub use retry::{RetryAction, RetryError, RetryPolicy, with_retry};
pub use seen::SegmentCache;
