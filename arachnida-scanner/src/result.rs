use crate::error::ScanError;
use crate::tree::CrawlTree;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Outcome of fetching a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    pub url: String,
    pub depth: usize,
    pub response_time: Duration,
    pub links_found: usize,
    pub images_found: usize,
    pub error: Option<String>,
}

impl PageResult {
    pub fn new(url: String, depth: usize) -> Self {
        Self {
            url,
            depth,
            response_time: Duration::from_secs(0),
            links_found: 0,
            images_found: 0,
            error: None,
        }
    }

    pub fn with_error(url: String, depth: usize, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(url, depth)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// An image written to the destination directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub source: String,
    pub destination: PathBuf,
}

/// An image that was discovered but not written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadFailure {
    pub url: String,
    pub kind: String,
    pub reason: String,
}

impl DownloadFailure {
    pub fn new(url: &str, error: &ScanError) -> Self {
        Self {
            url: url.to_string(),
            kind: error.kind().to_string(),
            reason: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub pages: Vec<PageResult>,
    /// Distinct image URLs handed to the downloader.
    pub images_found: usize,
    pub saved: Vec<ImageRecord>,
    pub failures: Vec<DownloadFailure>,
    pub cancelled: bool,
}

impl CrawlSummary {
    pub fn pages_fetched(&self) -> usize {
        self.pages.iter().filter(|p| p.is_ok()).count()
    }

    pub fn pages_failed(&self) -> usize {
        self.pages.len() - self.pages_fetched()
    }

    pub fn images_saved(&self) -> usize {
        self.saved.len()
    }

    pub fn failures_of(&self, kind: &str) -> impl Iterator<Item = &DownloadFailure> {
        self.failures.iter().filter(move |f| f.kind == kind)
    }
}

/// Everything a finished crawl produced.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub tree: CrawlTree,
    pub summary: CrawlSummary,
}
