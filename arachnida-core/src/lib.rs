pub mod crawl;
pub mod report;

pub use crawl::{CrawlOptions, CrawlProgressCallback, OverwriteMode, execute_crawl};
pub use report::{ReportFormat, ScanInfo, render_report, save_report};
