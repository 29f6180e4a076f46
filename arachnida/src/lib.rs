pub mod commands;
pub mod handlers;

pub use commands::{CLAP_STYLING, command_argument_builder};
pub use handlers::{CrawlArgs, expand_destination, handle_crawl, init_tracing, parse_seed};
