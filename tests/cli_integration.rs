// Integration tests for CLI commands
// These run the built binary against temporary config, scenario and state
// files.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::{NamedTempFile, TempDir};

fn agora() -> Command {
    Command::new(env!("CARGO_BIN_EXE_agora"))
}

const CONFIG: &str = r#"
[governor]
voting_delay = 1
voting_period = 10
proposal_threshold = "10000000000000000000000"
quorum = { fixed = "50000000000000000000000" }

[timelock]
min_delay = 2
grace_period = 10

[logging]
level = "warn"
"#;

const SETUP: &str = r#"
owner = "0x0000000000000000000000000000000000000001"

[[step]]
op = "transfer"
from = "0x0000000000000000000000000000000000000001"
to = "0x0000000000000000000000000000000000000002"
amount = "15000000000000000000000"

[[step]]
op = "transfer"
from = "0x0000000000000000000000000000000000000001"
to = "0x0000000000000000000000000000000000000003"
amount = "60000000000000000000000"

[[step]]
op = "deposit"
from = "0x0000000000000000000000000000000000000001"
amount = "5000000000000000000"

[[step]]
op = "advance"
by = 1

[[step]]
op = "propose"
label = "grant"
proposer = "0x0000000000000000000000000000000000000002"
description = "Pay voter one token"
calls = [{ target = "0x0000000000000000000000000000000000000003", value = "1000000000000000000" }]

[[step]]
op = "advance"
by = 1

[[step]]
op = "vote"
proposal = "grant"
voter = "0x0000000000000000000000000000000000000003"
support = 1

[[step]]
op = "advance"
by = 10

[[step]]
op = "queue"
proposal = "grant"
"#;

fn write_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn simulate(scenario: &Path, config: &Path, state: Option<&Path>) -> Output {
    let mut cmd = agora();
    cmd.arg("simulate")
        .arg("--scenario")
        .arg(scenario)
        .arg("--config")
        .arg(config);
    if let Some(state) = state {
        cmd.arg("--state").arg(state);
    }
    cmd.output().expect("Failed to execute command")
}

#[test]
fn test_cli_help() {
    let output = agora().arg("--help").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Operator CLI for the Agora governance engine"));
    assert!(stdout.contains("simulate"));
    assert!(stdout.contains("init-config"));
    assert!(stdout.contains("version"));
}

#[test]
fn test_cli_version() {
    let output = agora().arg("version").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("agora"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_simulate_requires_scenario() {
    let output = agora().arg("simulate").output().expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("scenario") || stderr.contains("required"));
}

#[test]
fn test_cli_simulate_prints_report() {
    let dir = TempDir::new().unwrap();
    let config = write_file(dir.path(), "config.toml", CONFIG);
    let scenario = write_file(dir.path(), "scenario.toml", SETUP);

    let output = simulate(&scenario, &config, None);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["now"], 12);
    assert_eq!(report["proposals"]["grant"]["state"], "Queued");
    assert_eq!(report["treasury_balance"], "5000000000000000000");
    assert_eq!(report["events"].as_array().unwrap().len(), 3);
}

#[test]
fn test_cli_simulate_resumes_from_state() {
    let dir = TempDir::new().unwrap();
    let config = write_file(dir.path(), "config.toml", CONFIG);
    let scenario = write_file(dir.path(), "setup.toml", SETUP);
    let state = dir.path().join("world.cbor");

    let first = simulate(&scenario, &config, Some(&state));
    assert!(first.status.success());
    assert!(state.exists());

    let report: serde_json::Value = serde_json::from_slice(&first.stdout).unwrap();
    let id = report["proposals"]["grant"]["id"].as_str().unwrap().to_string();

    let resume = write_file(
        dir.path(),
        "execute.toml",
        &format!(
            r#"
owner = "0x0000000000000000000000000000000000000001"

[[step]]
op = "advance"
by = 2

[[step]]
op = "execute"
proposal = "{id}"

[[step]]
op = "state"
proposal = "{id}"
expect = "Executed"
"#
        ),
    );
    let second = simulate(&resume, &config, Some(&state));
    assert!(
        second.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&second.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&second.stdout).unwrap();
    assert_eq!(report["now"], 14);
    assert_eq!(report["treasury_balance"], "4000000000000000000");
    let events = report["events"].as_array().unwrap();
    assert_eq!(events.last().unwrap()["type"], "ProposalExecuted");
}

#[test]
fn test_cli_resume_keeps_saved_governor_settings() {
    let dir = TempDir::new().unwrap();
    let config = write_file(dir.path(), "config.toml", CONFIG);
    let (until_close, _) = SETUP.rsplit_once("[[step]]").unwrap();
    let scenario = write_file(dir.path(), "setup.toml", until_close);
    let state = dir.path().join("world.cbor");

    let first = simulate(&scenario, &config, Some(&state));
    assert!(first.status.success());
    let report: serde_json::Value = serde_json::from_slice(&first.stdout).unwrap();
    assert_eq!(report["proposals"]["grant"]["state"], "Succeeded");
    let id = report["proposals"]["grant"]["id"].as_str().unwrap().to_string();

    // 80k quorum would defeat the 60k vote if it applied to the saved world.
    let stricter = write_file(
        dir.path(),
        "stricter.toml",
        &CONFIG.replace("50000000000000000000000", "80000000000000000000000"),
    );
    let resume = write_file(
        dir.path(),
        "queue.toml",
        &format!(
            r#"
owner = "0x0000000000000000000000000000000000000001"

[[step]]
op = "queue"
proposal = "{id}"
"#
        ),
    );
    let second = simulate(&resume, &stricter, Some(&state));
    assert!(
        second.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&second.stderr)
    );
    let stderr = String::from_utf8_lossy(&second.stderr);
    assert!(stderr.contains("keeping the saved settings"));

    let report: serde_json::Value = serde_json::from_slice(&second.stdout).unwrap();
    let events = report["events"].as_array().unwrap();
    assert_eq!(events.last().unwrap()["type"], "ProposalQueued");
}

#[test]
fn test_cli_simulate_failed_step_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    let config = write_file(dir.path(), "config.toml", CONFIG);
    let scenario = write_file(
        dir.path(),
        "bad.toml",
        r#"
owner = "0x0000000000000000000000000000000000000001"

[[step]]
op = "propose"
label = "x"
proposer = "0x0000000000000000000000000000000000000009"
description = "no power"
calls = [{ target = "0x0000000000000000000000000000000000000009" }]
"#,
    );

    let output = simulate(&scenario, &config, None);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("step 0 (propose)"));
}

#[test]
fn test_cli_simulate_with_missing_scenario() {
    let mut config = NamedTempFile::new().unwrap();
    write!(config, "{}", CONFIG).unwrap();

    let output = simulate(Path::new("/nonexistent/scenario.toml"), config.path(), None);
    assert!(!output.status.success());
}

#[test]
fn test_cli_init_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("agora").join("config.toml");

    let output = agora()
        .arg("init-config")
        .arg("--output")
        .arg(&path)
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());
    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("[governor]"));
    assert!(contents.contains("[timelock]"));

    // A second run refuses to overwrite.
    let again = agora()
        .arg("init-config")
        .arg("--output")
        .arg(&path)
        .output()
        .expect("Failed to execute command");
    assert!(!again.status.success());

    let forced = agora()
        .arg("init-config")
        .arg("--output")
        .arg(&path)
        .arg("--force")
        .output()
        .expect("Failed to execute command");
    assert!(forced.status.success());
}
