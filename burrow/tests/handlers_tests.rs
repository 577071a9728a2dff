use burrow::handlers::*;
use burrow::command_argument_builder;
use burrow_core::discovery::run_discovery;
use clap::ArgMatches;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn discover_args(extra: &[&str]) -> ArgMatches {
    let mut argv = vec!["burrow", "discover", "example.test"];
    argv.extend_from_slice(extra);
    let matches = command_argument_builder()
        .try_get_matches_from(argv)
        .unwrap();
    matches.subcommand_matches("discover").unwrap().clone()
}

// ============================================================================
// Command Line Tests
// ============================================================================

#[test]
fn test_discover_requires_target() {
    let result = command_argument_builder().try_get_matches_from(["burrow", "discover"]);
    assert!(result.is_err());
}

#[test]
fn test_external_flags_conflict() {
    let result = command_argument_builder().try_get_matches_from([
        "burrow",
        "discover",
        "example.test",
        "--no-external",
        "--external-binary",
        "katana",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_quiet_is_global() {
    let matches = command_argument_builder()
        .try_get_matches_from(["burrow", "discover", "example.test", "-q"])
        .unwrap();
    assert!(matches.get_flag("quiet"));
}

#[test]
fn test_build_options_defaults() {
    let options = build_options(&discover_args(&[])).unwrap();

    assert_eq!(options.budget.concurrency, 10);
    assert_eq!(options.budget.timeout_secs, 10);
    assert_eq!(options.budget.max_urls, 5000);
    assert!(options.external.enabled);
    assert!(options.dedup.enable_clustering);
}

#[test]
fn test_build_options_flags() {
    let options = build_options(&discover_args(&[
        "--threads",
        "25",
        "--timeout",
        "3",
        "--max-urls",
        "100",
        "--max-duration",
        "60",
        "--no-external",
        "--no-clustering",
    ]))
    .unwrap();

    assert_eq!(options.budget.concurrency, 25);
    assert_eq!(options.budget.timeout_secs, 3);
    assert_eq!(options.budget.max_urls, 100);
    assert_eq!(options.budget.max_duration_secs, 60);
    assert!(!options.external.enabled);
    assert!(!options.dedup.enable_clustering);
}

#[test]
fn test_build_options_clamps_flags() {
    let options = build_options(&discover_args(&["--threads", "500", "--timeout", "0"])).unwrap();
    assert_eq!(options.budget.concurrency, 50);
    assert_eq!(options.budget.timeout_secs, 1);
}

#[test]
fn test_flags_override_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = NamedTempFile::new()?;
    writeln!(
        config,
        r#"{{ "budget": {{ "concurrency": 4, "max_urls": 250 }}, "top_urls": 5 }}"#
    )?;
    let path = config.path().to_string_lossy().into_owned();

    let options = build_options(&discover_args(&["--config", &path, "--threads", "8"]))?;

    assert_eq!(options.budget.concurrency, 8);
    assert_eq!(options.budget.max_urls, 250);
    assert_eq!(options.top_urls, 5);
    Ok(())
}

#[test]
fn test_missing_config_file_is_an_error() {
    let result = build_options(&discover_args(&["--config", "/nonexistent/burrow/options.json"]));
    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("Failed to load options"));
}

#[test]
fn test_external_binary_flag() {
    let options = build_options(&discover_args(&["--external-binary", "/opt/tools/katana"])).unwrap();
    assert_eq!(options.external.binary, "/opt/tools/katana");
    assert!(options.external.enabled);
}

// ============================================================================
// File Handling Tests
// ============================================================================

#[test]
fn test_expand_path_tilde() {
    let expanded = expand_path("~/reports/out.json");
    assert!(!expanded.to_string_lossy().starts_with('~'));
    assert!(expanded.ends_with("reports/out.json"));
}

#[test]
fn test_load_scan_data() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"{{ "services": [ {{ "base_url": "http://example.test:8080", "paths": ["/admin/"] }} ] }}"#
    )?;

    let data = load_scan_data(&file.path().to_string_lossy())?;
    assert_eq!(data.services.len(), 1);
    assert_eq!(data.services[0].paths, vec!["/admin/".to_string()]);
    Ok(())
}

#[test]
fn test_load_scan_data_invalid_json() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "not json").unwrap();

    let result = load_scan_data(&file.path().to_string_lossy());
    assert!(result.is_err());
}

#[tokio::test]
async fn test_write_json_report() -> Result<(), Box<dyn std::error::Error>> {
    let options = build_options(&discover_args(&["--no-external", "--timeout", "1"]))?;
    let report = run_discovery("http://127.0.0.1:1/", None, options, None).await?;

    let dir = TempDir::new()?;
    let target = dir.path().join("nested").join("report.json");
    let written = write_json_report(&report, &target.to_string_lossy())?;

    assert_eq!(written, target);
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&written)?)?;
    assert_eq!(json["target"], "http://127.0.0.1:1/");
    assert_eq!(json["urls"].as_array().map(Vec::len), Some(0));
    Ok(())
}
