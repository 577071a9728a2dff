use crate::CLAP_STYLING;
use burrow_scanner::external::DEFAULT_EXTERNAL_BINARY;
use clap::{arg, command};

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("burrow")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("burrow")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and progress output")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("discover")
                .about(
                    "Discover paths on a web target and triage them into categorised \
                findings.",
                )
                .arg(
                    arg!(<TARGET>)
                        .help("Hostname, host:port or URL to discover against"),
                )
                .arg(
                    arg!(-s --"scan-data" <PATH>)
                        .required(false)
                        .help("JSON file of services from a prior scan, used to seed discovery"),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("Maximum concurrent probe requests (1-50, default: 10)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request timeout in seconds (default: 10)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"max-urls" <COUNT>)
                        .required(false)
                        .help("Maximum number of URLs to probe and report (default: 5000)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"max-duration" <SECONDS>)
                        .required(false)
                        .help("Wall-clock ceiling for the whole run (default: 1800)")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"external-binary" <PATH>)
                        .required(false)
                        .help(format!(
                            "External crawler binary name or path (default: {})",
                            DEFAULT_EXTERNAL_BINARY
                        ))
                        .conflicts_with("no-external"),
                )
                .arg(
                    arg!(--"no-external")
                        .required(false)
                        .help("Skip the external crawler even if it is installed")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-clustering")
                        .required(false)
                        .help("Disable similarity clustering during deduplication")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("JSON options file; command line flags override its values"),
                )
                .arg(
                    arg!(-j --"json" <PATH>)
                        .required(false)
                        .help("Write the full report as JSON to PATH ('-' for stdout)"),
                )
                .arg(
                    arg!(-v --"verbose")
                        .required(false)
                        .help("Enable debug logging")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
}
