use arachnida_scanner::crawler::{DEFAULT_DESTINATION, DEFAULT_MAX_DEPTH, DEFAULT_WORKERS};
use arachnida_scanner::error::Result;
use arachnida_scanner::fetcher::DEFAULT_TIMEOUT_SECS;
use arachnida_scanner::{
    CancellationToken, CrawlEvent, CrawlReport, Crawler, OverwriteCallback, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub url: String,
    pub recursive: bool,
    pub max_depth: usize,
    pub destination: PathBuf,
    pub workers: usize,
    pub timeout_secs: u64,
    pub overwrite: OverwriteMode,
    pub show_progress_bars: bool,
    pub cancel: Option<CancellationToken>,
}

impl CrawlOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            recursive: false,
            max_depth: DEFAULT_MAX_DEPTH,
            destination: PathBuf::from(DEFAULT_DESTINATION),
            workers: DEFAULT_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            overwrite: OverwriteMode::Prompt,
            show_progress_bars: false,
            cancel: None,
        }
    }

    /// Depth that will actually be crawled.
    pub fn effective_max_depth(&self) -> usize {
        if self.recursive { self.max_depth } else { 0 }
    }
}

/// What to do when the destination directory already contains files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteMode {
    /// Write into it without asking
    Allow,
    /// Ask the user on the terminal
    Prompt,
    /// Never write into a non-empty directory
    Refuse,
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Read a yes/no answer from stdin. Anything but "y"/"yes" counts as no.
pub fn ask_yes_no(question: &str) -> bool {
    print!("{} [y/N]: ", question);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut response = String::new();
    if io::stdin().read_line(&mut response).is_err() {
        return false;
    }
    let response = response.trim().to_lowercase();
    response == "y" || response == "yes"
}

fn overwrite_callback(mode: OverwriteMode, progress_bar: Option<Arc<ProgressBar>>) -> OverwriteCallback {
    match mode {
        OverwriteMode::Allow => Arc::new(|_path: &Path| true),
        OverwriteMode::Refuse => Arc::new(|_path: &Path| false),
        OverwriteMode::Prompt => Arc::new(move |path: &Path| {
            let question = format!(
                "\n[!] {} already contains files. Write images into it?",
                path.display()
            );
            match progress_bar {
                Some(ref pb) => pb.suspend(|| ask_yes_no(&question)),
                None => ask_yes_no(&question),
            }
        }),
    }
}

/// Execute a crawl with the given options
/// Returns the crawl report
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlReport> {
    let max_depth = options.effective_max_depth();
    let CrawlOptions {
        url,
        recursive,
        destination,
        workers,
        timeout_secs,
        overwrite,
        show_progress_bars,
        cancel,
        ..
    } = options;

    // Set up single progress bar for overall crawl progress (only if enabled)
    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let pages = Arc::new(AtomicUsize::new(0));
    let images = Arc::new(AtomicUsize::new(0));

    let internal_progress_callback: ProgressCallback = {
        let pb = progress_bar.clone();
        let pages = pages.clone();
        let images = images.clone();
        let outer = progress_callback.clone();
        Arc::new(move |event: CrawlEvent| {
            match event {
                CrawlEvent::PageStarted { ref url, depth } => {
                    pages.fetch_add(1, Ordering::Relaxed);
                    debug!("[depth {}] {}", depth, url);
                }
                CrawlEvent::ImageSaved { .. } => {
                    images.fetch_add(1, Ordering::Relaxed);
                }
                CrawlEvent::PageFailed { ref url, ref reason }
                | CrawlEvent::ImageSkipped { ref url, ref reason } => {
                    if let Some(ref callback) = outer {
                        callback(format!("[!] {}: {}", url, reason));
                    }
                }
            }

            if let Some(ref pb) = pb {
                pb.set_message(format!(
                    "Crawling... {} pages visited, {} images saved",
                    pages.load(Ordering::Relaxed),
                    images.load(Ordering::Relaxed)
                ));
            }
        })
    };

    let mut crawler = Crawler::new()
        .with_recursive(recursive)
        .with_max_depth(max_depth)
        .with_workers(workers)
        .with_timeout(Duration::from_secs(timeout_secs))
        .with_destination(destination)
        .with_progress_callback(internal_progress_callback)
        .with_overwrite_callback(overwrite_callback(overwrite, progress_bar.clone()));

    if let Some(cancel) = cancel {
        crawler = crawler.with_cancellation(cancel);
    }

    if let Some(ref callback) = progress_callback {
        callback(format!("Crawling {}", url));
    }

    let outcome = crawler.crawl(&url).await;

    // Finish progress bar (only if enabled)
    if let Some(ref pb) = progress_bar {
        match outcome {
            Ok(ref report) => pb.finish_with_message(format!(
                "Crawl complete! {} pages visited, {}/{} images saved",
                report.summary.pages.len(),
                report.summary.images_saved(),
                report.summary.images_found
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }

    outcome
}
