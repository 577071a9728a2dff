use anyhow::{Context, Result, bail};
use burrow_core::discovery::{
    DiscoveryOptions, DiscoveryProgressCallback, DiscoveryReport, generate_discovery_report,
    run_discovery,
};
use burrow_core::{ScanData, Severity};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, debug};

pub fn print_banner() {
    let banner = r#"
    ██████╗ ██╗   ██╗██████╗ ██████╗  ██████╗ ██╗    ██╗
    ██╔══██╗██║   ██║██╔══██╗██╔══██╗██╔═══██╗██║    ██║
    ██████╔╝██║   ██║██████╔╝██████╔╝██║   ██║██║ █╗ ██║
    ██╔══██╗██║   ██║██╔══██╗██╔══██╗██║   ██║██║███╗██║
    ██████╔╝╚██████╔╝██║  ██║██║  ██║╚██████╔╝╚███╔███╔╝
    ╚═════╝  ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝ ╚═════╝  ╚══╝╚══╝
"#;
    eprintln!("{}", banner.bright_cyan());
    eprintln!(
        "    {} {}\n",
        "web path discovery & triage".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

/// Installs the fmt subscriber on stderr. Safe to call more than once.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Expands `~` and environment variables in a user supplied path
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}

pub fn load_scan_data(raw_path: &str) -> Result<ScanData> {
    let path = expand_path(raw_path);
    let data = ScanData::from_file(&path)
        .with_context(|| format!("Failed to load scan data from {}", path.display()))?;
    if data.is_empty() {
        eprintln!(
            "{} Scan data in {} lists no services, seeding from the target",
            "⚠".yellow().bold(),
            path.display()
        );
    }
    Ok(data)
}

/// Options from `--config` (or defaults) with command line flags applied on
/// top.
pub fn build_options(args: &ArgMatches) -> Result<DiscoveryOptions> {
    let mut options = match args.get_one::<String>("config") {
        Some(raw_path) => {
            let path = expand_path(raw_path);
            DiscoveryOptions::from_file(&path)
                .with_context(|| format!("Failed to load options from {}", path.display()))?
        }
        None => DiscoveryOptions::default(),
    };

    if let Some(threads) = args.get_one::<usize>("threads") {
        options.budget.concurrency = *threads;
    }
    if let Some(timeout) = args.get_one::<u64>("timeout") {
        options.budget.timeout_secs = *timeout;
    }
    if let Some(max_urls) = args.get_one::<usize>("max-urls") {
        options.budget.max_urls = *max_urls;
    }
    if let Some(max_duration) = args.get_one::<u64>("max-duration") {
        options.budget.max_duration_secs = *max_duration;
    }
    if let Some(binary) = args.get_one::<String>("external-binary") {
        if binary.trim().is_empty() {
            bail!("--external-binary must not be empty");
        }
        options.external.binary = expand_path(binary).to_string_lossy().into_owned();
        options.external.enabled = true;
    }
    if args.get_flag("no-external") {
        options.external.enabled = false;
    }
    if args.get_flag("no-clustering") {
        options.dedup.enable_clustering = false;
    }

    Ok(options.validated())
}

pub fn write_json_report(report: &DiscoveryReport, raw_path: &str) -> Result<PathBuf> {
    let path = expand_path(raw_path);
    let json = report.to_json()?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub async fn handle_discover(args: &ArgMatches, quiet: bool) -> Result<()> {
    let target = args
        .get_one::<String>("TARGET")
        .context("TARGET is required")?;
    let json_to_stdout = args.get_one::<String>("json").is_some_and(|p| p == "-");

    let scan_data = args
        .get_one::<String>("scan-data")
        .map(|p| load_scan_data(p))
        .transpose()?;

    let mut options = build_options(args)?;
    options.show_progress = !quiet && !json_to_stdout;

    if !quiet && !json_to_stdout {
        println!("\n🔎 Discovering {}", target.bright_white().bold());
        println!("Workers: {}", options.budget.concurrency);
        println!(
            "Budget: {} URLs, {}s",
            options.budget.max_urls, options.budget.max_duration_secs
        );
        println!(
            "External crawler: {}\n",
            if options.external.enabled {
                options.external.binary.as_str()
            } else {
                "disabled"
            }
        );
    }

    let progress_callback: DiscoveryProgressCallback = Arc::new(|msg: String| {
        debug!("{}", msg);
    });

    let report = run_discovery(target, scan_data.as_ref(), options, Some(progress_callback))
        .await
        .with_context(|| format!("Discovery against {} failed", target))?;

    if json_to_stdout {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    println!("\n{} Discovery complete!\n", "✓".green().bold());
    print!("{}", generate_discovery_report(&report));

    if let Some(raw_path) = args.get_one::<String>("json") {
        let path = write_json_report(&report, raw_path)?;
        println!(
            "{} Report written to {}",
            "✓".green().bold(),
            path.display().to_string().bright_white()
        );
    }

    let critical = report.findings_by_severity(Severity::Critical).count();
    if critical > 0 {
        println!(
            "{} {} critical finding(s)",
            "!".red().bold(),
            critical.to_string().red().bold()
        );
    }

    Ok(())
}
