use burrow::{command_argument_builder, handle_discover, init_logging, print_banner};
use colored::Colorize;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    match chosen_command.subcommand() {
        Some(("discover", primary_command)) => {
            init_logging(primary_command.get_flag("verbose"));
            if let Err(e) = handle_discover(primary_command, quiet).await {
                eprintln!("{} {:#}", "✗".red().bold(), e);
                std::process::exit(1);
            }
        }
        // No subcommand provided, just show the banner
        None => {}
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
