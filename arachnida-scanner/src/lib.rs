pub mod crawler;
pub mod download;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod normalize;
pub mod result;
pub mod robots;
pub mod tree;

pub use crawler::{
    CrawlEvent, Crawler, OverwriteCallback, ProgressCallback, VisitedSet, crawl,
};
pub use download::{DestinationState, ImageDownloader, prepare_destination};
pub use error::ScanError;
pub use normalize::{NormalizedUrl, normalize};
pub use result::{CrawlReport, CrawlSummary, DownloadFailure, ImageRecord, PageResult};
pub use robots::{RobotsCache, RobotsPolicy};
pub use tree::{CrawlNode, CrawlTree, NodeId};
pub use tokio_util::sync::CancellationToken;
