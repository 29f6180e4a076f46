use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Too many redirects (more than {hops}) starting at {url}")]
    TooManyRedirects { url: String, hops: usize },

    #[error("Redirect loop detected: {0} was already visited in this chain")]
    RedirectLoop(String),

    #[error("Redirect from {0} has no Location header")]
    MissingLocation(String),

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Content-Type {content_type:?} is not an image for {url}")]
    NotAnImage {
        url: String,
        content_type: Option<String>,
    },

    #[error("robots.txt disallows fetching {0}")]
    RobotsDisallowed(String),

    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination {0} is not empty and overwriting was declined")]
    DestinationRejected(PathBuf),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// Short machine-friendly label, used in summaries and JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::InvalidUrl(_) => "invalid_url",
            ScanError::Timeout(_) => "timeout",
            ScanError::TooManyRedirects { .. } => "too_many_redirects",
            ScanError::RedirectLoop(_) => "redirect_loop",
            ScanError::MissingLocation(_) => "missing_location",
            ScanError::HttpStatus { .. } => "http_error",
            ScanError::NotAnImage { .. } => "not_an_image",
            ScanError::RobotsDisallowed(_) => "robots_disallowed",
            ScanError::DirectoryCreationFailed { .. } => "directory_creation_failed",
            ScanError::DestinationRejected(_) => "destination_rejected",
            ScanError::ParseError(_) => "parse_error",
            ScanError::Cancelled => "cancelled",
            ScanError::Request(_) => "request",
            ScanError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
