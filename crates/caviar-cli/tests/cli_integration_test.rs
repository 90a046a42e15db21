//! Integration tests for the bundle → inspect → ls workflow.

use caviar_cli::commands::bundle::{self, BundleArgs};
use caviar_cli::commands::{common, inspect, ls};
use caviar_cli::{ExitCode, OutputFormat};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn workspace() -> (TempDir, BundleArgs) {
    let dir = TempDir::new().unwrap();
    let assets = dir.path().join("assets");
    fs::create_dir_all(assets.join("css")).unwrap();
    fs::write(assets.join("index.html"), "<h1>hi</h1>").unwrap();
    fs::write(assets.join("css/site.css"), "h1 { color: red }").unwrap();
    let exe = dir.path().join("server");
    fs::write(&exe, b"#!/bin/sh\necho host\n").unwrap();

    let args = BundleArgs {
        executable: exe,
        assets: vec![assets],
        cherrypick: false,
        detached: false,
        prefix: None,
        debug: false,
        comment: Some("integration".to_string()),
    };
    (dir, args)
}

fn paths(exe: &Path) -> Vec<String> {
    let (_, container) = common::load_container(exe).unwrap();
    ls::list(&container.manifest.root)
        .into_iter()
        .map(|e| e.path)
        .collect()
}

#[test]
fn test_appended_workflow() {
    let (_dir, args) = workspace();
    assert_eq!(bundle::run(&args, OutputFormat::Json).unwrap(), ExitCode::SUCCESS);
    assert_eq!(
        inspect::run(&args.executable, OutputFormat::Text).unwrap(),
        ExitCode::SUCCESS
    );
    assert_eq!(paths(&args.executable), vec!["css", "css/site.css", "index.html"]);
    assert_eq!(ls::run(&args.executable, OutputFormat::Pretty).unwrap(), ExitCode::SUCCESS);
}

#[test]
fn test_detached_workflow_found_from_executable() {
    let (_dir, mut args) = workspace();
    args.detached = true;
    args.cherrypick = true;
    bundle::run(&args, OutputFormat::Json).unwrap();

    let (source, container) = common::load_container(&args.executable).unwrap();
    assert_eq!(source, args.executable.with_extension("cvr"));
    assert_eq!(container.manifest.comment, "integration");

    let summary = inspect::InspectSummary::new(&source, &container);
    assert!(summary.verified);
    assert_eq!(summary.files, 2);
    assert_eq!(summary.directories, 3);
    assert_eq!(
        paths(&args.executable),
        vec!["assets", "assets/css", "assets/css/site.css", "assets/index.html"]
    );
}

#[test]
fn test_inspect_reports_tampered_bundle() {
    let (_dir, mut args) = workspace();
    args.detached = true;
    bundle::run(&args, OutputFormat::Json).unwrap();

    let sidecar: PathBuf = args.executable.with_extension("cvr");
    let (_, mut container) = common::load_container(&sidecar).unwrap();
    container.payload[0] ^= 0x20;
    fs::write(&sidecar, container.encode().unwrap()).unwrap();

    assert_eq!(
        inspect::run(&args.executable, OutputFormat::Json).unwrap(),
        ExitCode::ERROR
    );
}
