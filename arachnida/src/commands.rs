use clap::{arg, value_parser};
use std::path::PathBuf;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("spider")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("spider")
        .about("Download every image reachable from a web page")
        .styles(CLAP_STYLING)
        .arg(
            arg!(<URL>)
                .help("The page to start from (http:// is assumed when no scheme is given)"),
        )
        .arg(
            arg!(-r --"recursive")
                .help("Follow links found on the page and download their images too")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(-l --"level" <DEPTH>)
                .required(false)
                .help("Maximum link depth when crawling recursively")
                .value_parser(value_parser!(usize))
                .default_value("5"),
        )
        .arg(
            arg!(-p --"path" <PATH>)
                .required(false)
                .help("Directory the images are saved into")
                .default_value("./data/"),
        )
        .arg(
            arg!(-w --"workers" <NUM_WORKERS>)
                .required(false)
                .help("Maximum number of concurrent requests")
                .value_parser(value_parser!(u64).range(1..))
                .default_value("10"),
        )
        .arg(
            arg!(-t --"timeout" <SECONDS>)
                .required(false)
                .help("Per-request timeout in seconds")
                .value_parser(value_parser!(u64).range(1..))
                .default_value("60"),
        )
        .arg(
            arg!(-y --"yes")
                .help("Don't ask for confirmation, even when the destination already has files")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(-o --"report" <PATH>)
                .required(false)
                .help("Save a crawl report to this file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-f --"format" <FORMAT>)
                .required(false)
                .help("Report format")
                .value_parser(["text", "json"])
                .default_value("text"),
        )
        .arg(
            arg!(--"tree")
                .help("Print the crawl tree when done")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(-v --"verbose")
                .help("Debug logging (overrides RUST_LOG)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(-q --"quiet")
                .help("Suppress banner and progress output")
                .action(clap::ArgAction::SetTrue),
        )
}
