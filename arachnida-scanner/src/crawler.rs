use crate::download::{DestinationState, ImageDownloader, prepare_destination};
use crate::error::{Result, ScanError};
use crate::extract::{Extracted, extract};
use crate::fetcher::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, Fetcher};
use crate::normalize::{NormalizedUrl, normalize, normalize_url};
use crate::result::{CrawlReport, CrawlSummary, DownloadFailure, ImageRecord, PageResult};
use crate::robots::RobotsCache;
use crate::tree::{CrawlTree, NodeId};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_MAX_DEPTH: usize = 5;
pub const DEFAULT_DESTINATION: &str = "./data/";

/// Something worth telling the user about while a crawl runs.
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    PageStarted { url: String, depth: usize },
    PageFailed { url: String, reason: String },
    ImageSaved { url: String, destination: PathBuf },
    ImageSkipped { url: String, reason: String },
}

pub type ProgressCallback = Arc<dyn Fn(CrawlEvent) + Send + Sync>;

/// Asked once, before any request, when the destination already holds files.
/// Returning `false` aborts the crawl.
pub type OverwriteCallback = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// URLs already dispatched for fetching. Check-and-insert is a single locked
/// operation, so a URL is fetched at most once per crawl.
#[derive(Debug, Default)]
pub struct VisitedSet {
    inner: Mutex<HashSet<NormalizedUrl>>,
}

impl VisitedSet {
    /// Returns `true` if `url` was not yet visited (and is now).
    pub async fn mark(&self, url: &NormalizedUrl) -> bool {
        self.inner.lock().await.insert(url.clone())
    }

    pub async fn contains(&self, url: &NormalizedUrl) -> bool {
        self.inner.lock().await.contains(url)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    async fn clear(&self) {
        self.inner.lock().await.clear();
    }
}

type PageOutcome = (NodeId, PageResult, Option<Extracted>);
type DownloadOutcome = (NormalizedUrl, Result<ImageRecord>);

pub struct Crawler {
    visited: Arc<VisitedSet>,
    recursive: bool,
    max_depth: usize,
    workers: usize,
    timeout: Duration,
    user_agent: String,
    destination: PathBuf,
    progress_callback: Option<ProgressCallback>,
    overwrite_callback: Option<OverwriteCallback>,
    cancel: CancellationToken,
}

impl Crawler {
    pub fn new() -> Self {
        Self {
            visited: Arc::new(VisitedSet::default()),
            recursive: false,
            max_depth: DEFAULT_MAX_DEPTH,
            workers: DEFAULT_WORKERS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            destination: PathBuf::from(DEFAULT_DESTINATION),
            progress_callback: None,
            overwrite_callback: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Follow links found on the seed page. Without this only the seed is fetched.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Upper bound on concurrent network operations (page fetches and image
    /// downloads combined).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_overwrite_callback(mut self, callback: OverwriteCallback) -> Self {
        self.overwrite_callback = Some(callback);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Depth actually used for a run: non-recursive crawls stay on the seed.
    pub fn effective_max_depth(&self) -> usize {
        if self.recursive { self.max_depth } else { 0 }
    }

    pub async fn crawl(&self, seed: &str) -> Result<CrawlReport> {
        let seed = normalize(seed, None)?;
        if !matches!(seed.as_url().scheme(), "http" | "https") {
            return Err(ScanError::InvalidUrl(format!("{}: only http(s) can be crawled", seed)));
        }

        let state = prepare_destination(&self.destination).await?;
        if state == DestinationState::ExistingNonEmpty
            && let Some(ref callback) = self.overwrite_callback
            && !callback(&self.destination)
        {
            return Err(ScanError::DestinationRejected(self.destination.clone()));
        }

        let max_depth = self.effective_max_depth();
        info!(
            "Starting crawl of {} (max depth {}, {} workers) into {}",
            seed,
            max_depth,
            self.workers,
            self.destination.display()
        );

        let fetcher = Fetcher::new(&self.user_agent, self.timeout, self.cancel.clone())?;
        let robots = Arc::new(RobotsCache::new(fetcher.clone()));
        let downloader = Arc::new(ImageDownloader::new(
            fetcher.clone(),
            robots,
            self.destination.clone(),
        ));
        let permits = Arc::new(Semaphore::new(self.workers));
        self.visited.clear().await;

        let mut tree = CrawlTree::new(seed.clone());
        let mut queue: VecDeque<NodeId> = VecDeque::from([tree.root()]);
        let mut queued: HashSet<NormalizedUrl> = HashSet::from([seed]);
        let mut seen_images: HashSet<NormalizedUrl> = HashSet::new();
        let mut pages: JoinSet<PageOutcome> = JoinSet::new();
        let mut downloads: JoinSet<DownloadOutcome> = JoinSet::new();
        let mut summary = CrawlSummary::default();

        loop {
            // Keep at most `workers` page tasks alive; the semaphore bounds the
            // actual network concurrency across pages and images.
            while pages.len() < self.workers {
                let Some(id) = queue.pop_front() else {
                    break;
                };
                let node = tree.node(id);
                let url = node.url.clone();
                let depth = node.depth;
                queued.remove(&url);

                // Two pages may have queued the same link before either was fetched.
                if !self.visited.mark(&url).await {
                    debug!("Skipping already visited {}", url);
                    tree.detach(id);
                    continue;
                }

                self.emit(CrawlEvent::PageStarted {
                    url: url.to_string(),
                    depth,
                });

                let fetcher = fetcher.clone();
                let permits = permits.clone();
                pages.spawn(async move {
                    let _permit = permits.acquire_owned().await.ok();
                    Self::fetch_and_extract(&fetcher, id, url, depth).await
                });
            }

            if pages.is_empty() {
                break;
            }

            let joined = tokio::select! {
                _ = self.cancel.cancelled() => {
                    warn!("Crawl cancelled, {} page(s) still queued", queue.len());
                    summary.cancelled = true;
                    break;
                }
                Some(done) = downloads.join_next(), if !downloads.is_empty() => {
                    self.record_download(&mut summary, done);
                    continue;
                }
                joined = pages.join_next() => joined,
            };

            let (id, page, extracted) = match joined {
                Some(Ok(outcome)) => outcome,
                Some(Err(e)) => {
                    warn!("Page task failed: {}", e);
                    continue;
                }
                None => break,
            };

            if let Some(ref reason) = page.error {
                self.emit(CrawlEvent::PageFailed {
                    url: page.url.clone(),
                    reason: reason.clone(),
                });
            }
            summary.pages.push(page);

            let Some(extracted) = extracted else {
                continue;
            };

            // Links first, so children are queued before this page's images go out.
            if tree.node(id).depth < max_depth {
                for link in extracted.links {
                    if queued.contains(&link) || self.visited.contains(&link).await {
                        continue;
                    }
                    let child = tree.add_child(id, link.clone());
                    queued.insert(link);
                    queue.push_back(child);
                }
            }

            for image in extracted.images {
                let image = normalize_url(image);
                if !seen_images.insert(image.clone()) {
                    continue;
                }
                summary.images_found += 1;

                let downloader = downloader.clone();
                let permits = permits.clone();
                downloads.spawn(async move {
                    let _permit = permits.acquire_owned().await.ok();
                    let outcome = downloader.download(image.as_url()).await;
                    (image, outcome)
                });
            }
        }

        // Cancelled fetches finish promptly on their own; nothing left to wait for.
        pages.shutdown().await;
        summary.cancelled |= self.cancel.is_cancelled();

        // The crawl is only done once every dispatched download has completed.
        while let Some(done) = downloads.join_next().await {
            self.record_download(&mut summary, done);
        }

        info!(
            "Crawl complete. Visited {} pages ({} failed)",
            summary.pages.len(),
            summary.pages_failed()
        );
        info!("Total image links found: {}", summary.images_found);
        info!("Total images downloaded: {}", summary.images_saved());

        Ok(CrawlReport { tree, summary })
    }

    async fn fetch_and_extract(
        fetcher: &Fetcher,
        id: NodeId,
        url: NormalizedUrl,
        depth: usize,
    ) -> PageOutcome {
        debug!("Fetching {} at depth {}", url, depth);
        let start = Instant::now();

        let fetched = async {
            let response = fetcher.fetch(url.as_url()).await?;
            // Relative links resolve against wherever redirects ended up.
            let base = response.url().clone();
            let body = fetcher.guard(&base, response.text()).await?;
            Ok::<_, ScanError>((base, body))
        }
        .await;

        match fetched {
            Ok((base, body)) => {
                let extracted = extract(&body, &base);
                let mut result = PageResult::new(url.to_string(), depth);
                result.response_time = start.elapsed();
                result.links_found = extracted.links.len();
                result.images_found = extracted.images.len();
                (id, result, Some(extracted))
            }
            Err(e) => {
                warn!("Crawl error for {}: {}", url, e);
                (id, PageResult::with_error(url.to_string(), depth, e.to_string()), None)
            }
        }
    }

    fn record_download(
        &self,
        summary: &mut CrawlSummary,
        done: std::result::Result<DownloadOutcome, tokio::task::JoinError>,
    ) {
        match done {
            Ok((url, Ok(record))) => {
                self.emit(CrawlEvent::ImageSaved {
                    url: url.to_string(),
                    destination: record.destination.clone(),
                });
                summary.saved.push(record);
            }
            Ok((url, Err(e))) => {
                warn!("Failed to download {}: {}", url, e);
                self.emit(CrawlEvent::ImageSkipped {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
                summary.failures.push(DownloadFailure::new(url.as_str(), &e));
            }
            Err(e) => warn!("Download task failed: {}", e),
        }
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(ref callback) = self.progress_callback {
            callback(event);
        }
    }

    pub async fn get_visited_count(&self) -> usize {
        self.visited.len().await
    }
}

impl Default for Crawler {
    fn default() -> Self {
        Self::new()
    }
}

/// Crawl `seed` and download its images into `destination`.
pub async fn crawl(
    seed: &str,
    recursive: bool,
    max_depth: usize,
    destination: impl Into<PathBuf>,
) -> Result<CrawlReport> {
    Crawler::new()
        .with_recursive(recursive)
        .with_max_depth(max_depth)
        .with_destination(destination)
        .crawl(seed)
        .await
}
