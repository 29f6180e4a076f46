use anyhow::{Context, Result, anyhow};
use arachnida_core::crawl::{CrawlOptions, CrawlProgressCallback, OverwriteMode, execute_crawl};
use arachnida_core::report::{ReportFormat, ScanInfo, render_report, save_report};
use arachnida_scanner::{CancellationToken, CrawlReport, ScanError};
use clap::ArgMatches;
use colored::Colorize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Everything the crawl handler needs, pulled out of the parsed command line.
#[derive(Debug, Clone)]
pub struct CrawlArgs {
    pub url: Url,
    pub recursive: bool,
    pub level: usize,
    pub destination: PathBuf,
    pub workers: usize,
    pub timeout_secs: u64,
    pub assume_yes: bool,
    pub report: Option<PathBuf>,
    pub format: ReportFormat,
    pub tree: bool,
    pub verbose: bool,
    pub quiet: bool,
}

impl CrawlArgs {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let raw_url = matches
            .get_one::<String>("URL")
            .ok_or_else(|| anyhow!("a URL is required"))?;
        let url = parse_seed(raw_url).ok_or_else(|| anyhow!("invalid URL '{}'", raw_url))?;

        let raw_format = matches
            .get_one::<String>("format")
            .map(String::as_str)
            .unwrap_or("text");
        let format = ReportFormat::from_str(raw_format)
            .ok_or_else(|| anyhow!("unknown report format '{}'", raw_format))?;

        let destination = matches
            .get_one::<String>("path")
            .map(|p| expand_destination(p))
            .unwrap_or_else(|| PathBuf::from(arachnida_scanner::crawler::DEFAULT_DESTINATION));

        Ok(Self {
            url,
            recursive: matches.get_flag("recursive"),
            level: matches.get_one::<usize>("level").copied().unwrap_or(5),
            destination,
            workers: matches.get_one::<u64>("workers").map_or(10, |w| *w as usize),
            timeout_secs: matches.get_one::<u64>("timeout").copied().unwrap_or(60),
            assume_yes: matches.get_flag("yes"),
            report: matches.get_one::<PathBuf>("report").cloned(),
            format,
            tree: matches.get_flag("tree"),
            verbose: matches.get_flag("verbose"),
            quiet: matches.get_flag("quiet"),
        })
    }

    fn options(&self, cancel: CancellationToken) -> CrawlOptions {
        let mut options = CrawlOptions::new(self.url.as_str());
        options.recursive = self.recursive;
        options.max_depth = self.level;
        options.destination = self.destination.clone();
        options.workers = self.workers;
        options.timeout_secs = self.timeout_secs;
        options.overwrite = if self.assume_yes {
            OverwriteMode::Allow
        } else {
            OverwriteMode::Prompt
        };
        options.show_progress_bars = !self.quiet;
        options.cancel = Some(cancel);
        options
    }
}

/// Parse a seed URL, assuming http:// when no scheme is given.
pub fn parse_seed(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.contains("://") {
        return Url::parse(raw).ok();
    }
    Url::parse(&format!("http://{}", raw)).ok()
}

/// Expand a leading `~` in the destination path.
pub fn expand_destination(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Log to stderr. `RUST_LOG` picks the filter unless `--verbose` forces debug.
pub fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(if quiet { "warn" } else { "info" }))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn print_banner() {
    println!(
        "{} {}",
        "arachnida".bright_magenta().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> String {
    print!("{} ", msg.bright_cyan().bold());
    if io::stdout().flush().is_err() {
        return String::new();
    }
    let mut response = String::new();
    if io::stdin().read_line(&mut response).is_err() {
        return String::new();
    }
    response.trim().to_lowercase()
}

fn print_settings(args: &CrawlArgs) {
    print_divider();
    println!("{}", "  CRAWL SETTINGS".bright_white().bold());
    print_divider();
    println!("{} URL:         {}", "→".blue(), args.url.as_str().bright_white());
    println!(
        "{} Recursive:   {}",
        "→".blue(),
        if args.recursive { "yes" } else { "no" }.bright_white()
    );
    if args.recursive {
        println!("{} Max depth:   {}", "→".blue(), args.level.to_string().bright_white());
    }
    println!(
        "{} Destination: {}",
        "→".blue(),
        args.destination.display().to_string().bright_white()
    );
    println!("{} Workers:     {}", "→".blue(), args.workers.to_string().cyan());
    println!("{} Timeout:     {}s", "→".blue(), args.timeout_secs.to_string().cyan());
    println!();
}

fn print_summary(report: &CrawlReport) {
    let summary = &report.summary;
    println!();
    print_divider();
    if summary.cancelled {
        println!("{}", "  CRAWL INTERRUPTED".yellow().bold());
    } else {
        println!("{}", "  CRAWL COMPLETE".green().bold());
    }
    print_divider();
    println!(
        "{} Pages visited:        {} ({} failed)",
        "✓".green().bold(),
        summary.pages.len().to_string().cyan(),
        summary.pages_failed().to_string().red()
    );
    println!(
        "{} Total image links found: {}",
        "✓".green().bold(),
        summary.images_found.to_string().cyan()
    );
    println!(
        "{} Total images downloaded: {}",
        "✓".green().bold(),
        summary.images_saved().to_string().cyan()
    );
    if !summary.failures.is_empty() {
        println!(
            "{} Images skipped:       {}",
            "⚠".yellow().bold(),
            summary.failures.len().to_string().yellow()
        );
    }
    println!();
}

/// Run a crawl end to end: confirm, crawl, summarise and optionally write a report.
pub async fn handle_crawl(args: CrawlArgs, cancel: CancellationToken) -> Result<()> {
    if !args.quiet {
        print_settings(&args);
    }

    if !args.assume_yes {
        let response = print_prompt("Start the crawl? [Y/n]:");
        if response == "n" || response == "no" {
            println!("{} Crawl cancelled.", "✗".red().bold());
            return Ok(());
        }
    }

    let progress_callback: Option<CrawlProgressCallback> = if args.quiet {
        None
    } else {
        Some(Arc::new(|msg: String| tracing::debug!("{}", msg)))
    };

    let start_time = chrono::Utc::now().timestamp();
    let report = match execute_crawl(args.options(cancel), progress_callback).await {
        Ok(report) => report,
        Err(ScanError::DestinationRejected(path)) => {
            println!(
                "{} Nothing written, {} left untouched.",
                "✗".red().bold(),
                path.display().to_string().bright_white()
            );
            return Ok(());
        }
        Err(e @ ScanError::InvalidUrl(_)) => return Err(e.into()),
        Err(e) => return Err(e).context(format!("Crawl of {} failed", args.url)),
    };
    let end_time = chrono::Utc::now().timestamp();

    print_summary(&report);

    if args.tree {
        print!("{}", report.tree.render());
        println!();
    }

    if let Some(ref path) = args.report {
        let info = ScanInfo {
            seed_url: args.url.to_string(),
            destination: args.destination.display().to_string(),
            max_depth: if args.recursive { args.level } else { 0 },
            start_time,
            end_time,
        };
        let content = render_report(args.format, &report, &info)
            .context("Failed to serialize the crawl report")?;
        save_report(&content, path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!(
            "{} Report saved to {}",
            "✓".green().bold(),
            path.display().to_string().bright_white()
        );
    }

    Ok(())
}
