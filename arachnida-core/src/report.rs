// Report generation from a finished crawl

use arachnida_scanner::CrawlReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// When and where a crawl ran. Timestamps are unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanInfo {
    pub seed_url: String,
    pub destination: String,
    pub max_depth: usize,
    pub start_time: i64,
    pub end_time: i64,
}

impl ScanInfo {
    fn status(&self, report: &CrawlReport) -> &'static str {
        if report.summary.cancelled {
            "Cancelled"
        } else {
            "Completed"
        }
    }
}

pub fn generate_text_report(report: &CrawlReport, info: &ScanInfo) -> String {
    let summary = &report.summary;
    let mut out = String::new();

    out.push_str(RULE);
    out.push_str("                         ARACHNIDA CRAWL REPORT\n");
    out.push_str(RULE);
    out.push('\n');

    out.push_str(&format!("Seed:         {}\n", info.seed_url));
    out.push_str(&format!("Status:       {}\n", info.status(report)));
    out.push_str(&format!("Started:      {}\n", format_timestamp(info.start_time)));
    out.push_str(&format!(
        "Duration:     {} seconds\n",
        (info.end_time - info.start_time).max(0)
    ));
    out.push_str(&format!("Max depth:    {}\n", info.max_depth));
    out.push_str(&format!("Destination:  {}\n", info.destination));
    out.push('\n');

    out.push_str(RULE);
    out.push_str("SUMMARY\n");
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!(
        "Pages visited:      {} ({} failed)\n",
        summary.pages.len(),
        summary.pages_failed()
    ));
    out.push_str(&format!("Image links found:  {}\n", summary.images_found));
    out.push_str(&format!("Images downloaded:  {}\n", summary.images_saved()));
    for (kind, count) in failure_counts(report) {
        out.push_str(&format!("  [{}] {}\n", kind, count));
    }
    out.push('\n');

    out.push_str(RULE);
    out.push_str("SITE TREE\n");
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&report.tree.render());
    out.push('\n');

    let failed_pages: Vec<_> = summary.pages.iter().filter(|p| !p.is_ok()).collect();
    if !failed_pages.is_empty() || !summary.failures.is_empty() {
        out.push_str(RULE);
        out.push_str("FAILURES\n");
        out.push_str(RULE);
        out.push('\n');
        for page in failed_pages {
            out.push_str(&format!(
                "page   {}  {}\n",
                page.url,
                page.error.as_deref().unwrap_or("unknown error")
            ));
        }
        for failure in &summary.failures {
            out.push_str(&format!("image  {}  {}\n", failure.url, failure.reason));
        }
        out.push('\n');
    }

    out.push_str(RULE);
    out.push_str("\nGenerated by Arachnida\n");
    out
}

pub fn generate_json_report(
    report: &CrawlReport,
    info: &ScanInfo,
) -> Result<String, serde_json::Error> {
    let summary = &report.summary;
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Arachnida",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "crawl": {
                "seed": info.seed_url,
                "status": info.status(report),
                "destination": info.destination,
                "max_depth": info.max_depth,
                "start_time": format_iso8601_timestamp(info.start_time),
                "end_time": format_iso8601_timestamp(info.end_time),
                "duration_seconds": (info.end_time - info.start_time).max(0)
            },
            "summary": {
                "pages_visited": summary.pages.len(),
                "pages_failed": summary.pages_failed(),
                "images_found": summary.images_found,
                "images_downloaded": summary.images_saved(),
                "failures_by_kind": failure_counts(report)
            },
            "tree": report.tree,
            "pages": summary.pages,
            "images": summary.saved,
            "failures": summary.failures
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn render_report(
    format: ReportFormat,
    report: &CrawlReport,
    info: &ScanInfo,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(report, info)),
        ReportFormat::Json => generate_json_report(report, info),
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn failure_counts(report: &CrawlReport) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for failure in &report.summary.failures {
        *counts.entry(failure.kind.as_str()).or_insert(0) += 1;
    }
    counts
}

fn format_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Local};
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn format_iso8601_timestamp(timestamp: i64) -> String {
    use chrono::{DateTime, Utc};
    let datetime = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_else(Utc::now);
    datetime.to_rfc3339()
}
