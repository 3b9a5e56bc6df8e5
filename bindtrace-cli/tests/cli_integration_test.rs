//! End-to-end tests for the `bindtrace` binary

use anyhow::Result;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_bindtrace(args: &[&str]) -> Result<Output> {
    Ok(Command::new(env!("CARGO_BIN_EXE_bindtrace"))
        .args(args)
        .env_remove("BINDTRACE_CATEGORIES")
        .env_remove("RUST_LOG")
        .output()?)
}

fn demo_file(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.pop();
    path.join("demos").join(name)
}

#[test]
fn test_simulate_json_output() -> Result<()> {
    let scenario = demo_file("plugin_bind.yaml");
    let output = run_bindtrace(&["simulate", "--scenario", scenario.to_str().unwrap()])?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout)?;
    let events: Vec<Value> = stdout
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;

    let names: Vec<&str> = events
        .iter()
        .map(|e| e["event"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(
        names,
        vec![
            "bind_start",
            "resolution_attempted",
            "resolution_attempted",
            "path_probed",
            "path_probed",
            "resolution_attempted",
            "bind_stop",
        ]
    );

    assert_eq!(events[1]["stage"], "find_in_load_context");
    assert_eq!(events[1]["result"], "assembly_not_found");
    assert_eq!(events[5]["result"], "success");
    assert_eq!(events[6]["success"], true);
    assert_eq!(events[0]["operation_id"], events[6]["operation_id"]);
    Ok(())
}

#[test]
fn test_simulate_table_output() -> Result<()> {
    let scenario = demo_file("plugin_bind.yaml");
    let output = run_bindtrace(&[
        "simulate",
        "--scenario",
        scenario.to_str().unwrap(),
        "--format",
        "table",
    ])?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Stage/Source"));
    assert!(stdout.contains("platform_assemblies"));
    assert!(stdout.contains("app_native_image_paths"));
    Ok(())
}

#[test]
fn test_simulate_rejects_revisited_stage() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let scenario = temp_dir.path().join("loop.yaml");
    fs::write(
        &scenario,
        r#"
request:
  identity: { name: Contoso.Widgets }
stages:
  - stage: platform_assemblies
  - stage: platform_assemblies
"#,
    )?;

    let output = run_bindtrace(&["simulate", "--scenario", scenario.to_str().unwrap()])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("out of order"));
    Ok(())
}

#[test]
fn test_check_config_lists_categories() -> Result<()> {
    let config = demo_file("bindtrace.yaml");
    let output = run_bindtrace(&["check-config", "--config", config.to_str().unwrap()])?;
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Configuration OK"));
    assert!(stdout.contains("assembly_loader, resolution_attempted, known_path_probed"));
    assert!(stdout.contains("Sink: json_lines"));
    Ok(())
}

#[test]
fn test_check_config_rejects_unknown_category() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = temp_dir.path().join("bad.yaml");
    fs::write(&config, "categories: [assembly_loader, jit]\n")?;

    let output = run_bindtrace(&["check-config", "--config", config.to_str().unwrap()])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid trace config"));
    Ok(())
}
