//! End-to-end runs of parsed command lines against temporary directories.

use clap::Parser;
use godyl::cli::{Cli, CliError, EXIT_CLI, EXIT_FAILED, exit_code_for};
use godyl::{Output, execute};
use godyl_core::processor::{ProcessReport, Status};
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Run `args` with config and cache isolated under `home`.
async fn run(home: &Path, args: &[&str]) -> Result<Output, CliError> {
    let config = home.join("config");
    let cache = home.join("cache");
    std::fs::create_dir_all(&config).unwrap();

    let mut argv = vec!["godyl"];
    argv.extend_from_slice(args);

    temp_env::async_with_vars(
        [
            ("GODYL_CONFIG_DIR", Some(config.display().to_string())),
            ("GODYL_CACHE_DIR", Some(cache.display().to_string())),
            ("GODYL_OUTPUT", None),
            ("GODYL_PARALLEL", None),
            ("GODYL_STRATEGY", None),
            ("GODYL_TAGS", None),
            ("GODYL_NO_CACHE", None),
        ],
        async {
            let cli = Cli::try_parse_from(&argv).unwrap();
            execute(&cli, CancellationToken::new()).await
        },
    )
    .await
}

fn report(output: Output) -> ProcessReport {
    match output {
        Output::Report(report) => report,
        Output::Text(text) => panic!("expected a report, got text: {text}"),
    }
}

fn text(output: Output) -> String {
    match output {
        Output::Text(text) => text,
        Output::Report(report) => panic!("expected text, got {report:?}"),
    }
}

#[tokio::test]
async fn test_version_needs_no_config() {
    let home = TempDir::new().unwrap();
    let out = text(run(home.path(), &["version"]).await.unwrap());
    assert!(out.starts_with("godyl "));
}

#[tokio::test]
async fn test_missing_manifest_is_a_user_error() {
    let home = TempDir::new().unwrap();
    let missing = home.path().join("nope.yml");
    let err = run(home.path(), &["install", missing.to_str().unwrap()])
        .await
        .unwrap_err();
    assert_eq!(exit_code_for(&err), EXIT_CLI);
}

#[tokio::test]
async fn test_unknown_manifest_key_is_a_user_error() {
    let home = TempDir::new().unwrap();
    let manifest = home.path().join("tools.yml");
    std::fs::write(&manifest, "- name: jq\n  sauce: github\n").unwrap();

    let err = run(home.path(), &["install", manifest.to_str().unwrap()])
        .await
        .unwrap_err();
    assert_eq!(exit_code_for(&err), EXIT_CLI);
}

#[tokio::test]
async fn test_dump_defaults_and_config() {
    let home = TempDir::new().unwrap();

    let out = text(run(home.path(), &["dump", "defaults"]).await.unwrap());
    assert!(out.contains("default:"));

    let out = text(
        run(home.path(), &["--parallel", "3", "--github-token", "t0k", "dump", "config"])
            .await
            .unwrap(),
    );
    assert!(out.contains("parallel: 3"));
    assert!(!out.contains("t0k"));
}

#[tokio::test]
async fn test_cache_path_follows_type() {
    let home = TempDir::new().unwrap();
    let out = text(
        run(home.path(), &["--cache-type", "sqlite", "cache", "path"])
            .await
            .unwrap(),
    );
    assert!(out.trim_end().ends_with("godyl.db"));
}

#[tokio::test]
async fn test_bad_download_spec() {
    let home = TempDir::new().unwrap();
    let err = run(home.path(), &["download", "not-a-repo"]).await.unwrap_err();
    assert_eq!(exit_code_for(&err), EXIT_CLI);
}

#[cfg(unix)]
#[tokio::test]
async fn test_install_then_skip_then_status() {
    let home = TempDir::new().unwrap();
    let bin = home.path().join("bin");
    let manifest = home.path().join("tools.yml");
    std::fs::write(
        &manifest,
        r#"
- name: hello
  source:
    type: command
    commands:
      commands:
        - mkdir -p "{{ Output }}"
        - printf '#!/bin/sh\necho hello 1.2.3\n' > "{{ Output }}/hello"
        - chmod +x "{{ Output }}/hello"
"#,
    )
    .unwrap();
    let manifest = manifest.to_str().unwrap();
    let output = bin.to_str().unwrap();

    let first = report(
        run(home.path(), &["install", manifest, "--output", output])
            .await
            .unwrap(),
    );
    assert_eq!(first.results[0].status, Status::Ok, "{}", first.results[0].message);
    assert!(bin.join("hello").is_file());

    let second = report(
        run(home.path(), &["install", manifest, "--output", output])
            .await
            .unwrap(),
    );
    assert_eq!(second.results[0].status, Status::Skipped);

    let status = text(
        run(home.path(), &["status", manifest, "--output", output])
            .await
            .unwrap(),
    );
    assert!(status.contains("hello"));
    assert!(status.contains("1.2.3"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_tool_maps_to_exit_one() {
    let home = TempDir::new().unwrap();
    let manifest = home.path().join("tools.yml");
    std::fs::write(
        &manifest,
        "- name: broken\n  source:\n    type: command\n    commands:\n      commands: [\"exit 3\"]\n",
    )
    .unwrap();

    let bin = home.path().join("bin");
    let result = report(
        run(
            home.path(),
            &["install", manifest.to_str().unwrap(), "-o", bin.to_str().unwrap()],
        )
        .await
        .unwrap(),
    );
    assert_eq!(result.failed(), 1);

    let err = CliError::from(result.into_result().unwrap_err());
    assert_eq!(exit_code_for(&err), EXIT_FAILED);
}
