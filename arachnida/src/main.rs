use arachnida::handlers::{CrawlArgs, handle_crawl, init_tracing, print_banner};
use arachnida::command_argument_builder;
use arachnida_scanner::CancellationToken;
use colored::Colorize;
use tracing::warn;

#[tokio::main]
async fn main() {
    let matches = command_argument_builder().get_matches();

    let args = match CrawlArgs::from_matches(&matches) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(2);
        }
    };

    init_tracing(args.verbose, args.quiet);

    // Show banner unless --quiet flag is set
    if !args.quiet {
        print_banner();
    }

    // Ctrl-C aborts in-flight requests. Images already written stay on disk.
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping the crawl");
            trigger.cancel();
        }
    });

    if let Err(e) = handle_crawl(args, cancel).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
