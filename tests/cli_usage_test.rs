use std::process::Command;

const SHD: &str = env!("CARGO_BIN_EXE_shd");

fn run(args: &[&str]) -> std::process::Output {
    Command::new(SHD)
        .args(args)
        .env_remove("SHD_CONFIG")
        .output()
        .unwrap()
}

#[test]
fn test_missing_action() {
    let output = run(&[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!output.stderr.is_empty());
}

#[test]
fn test_unknown_action() {
    let output = run(&["reload"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("reload"));
}

#[test]
fn test_too_many_arguments() {
    let output = run(&["start", "stop"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_help() {
    let output = run(&["--help"]);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("start"));
    assert!(stdout.contains("stop"));
    assert!(stdout.contains("restart"));
}

#[test]
fn test_missing_config_file() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.toml");

    let output = run(&["stop", "--config", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load configuration"));
}
