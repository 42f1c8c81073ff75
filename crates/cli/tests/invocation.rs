use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn bankscrape(dir: &Path, args: &[&str]) -> Output {
	Command::new(env!("CARGO_BIN_EXE_bankscrape"))
		.args(args)
		.current_dir(dir)
		.env_remove("LOGIN_NAME")
		.env_remove("LOGIN_PIN")
		.env_remove("BANK_BASE_URL")
		.env_remove("BANK_CHROME_PATH")
		.env_remove("RUST_LOG")
		.output()
		.expect("failed to run bankscrape")
}

fn stderr(output: &Output) -> String {
	String::from_utf8_lossy(&output.stderr).to_string()
}

fn workspace() -> TempDir {
	tempfile::tempdir().unwrap()
}

#[test]
fn help_and_version_exit_zero() {
	let dir = workspace();
	assert_eq!(bankscrape(dir.path(), &["--help"]).status.code(), Some(0));
	assert_eq!(bankscrape(dir.path(), &["--version"]).status.code(), Some(0));
	assert_eq!(bankscrape(dir.path(), &["scrape", "--help"]).status.code(), Some(0));
}

#[test]
fn missing_arguments_exit_one() {
	let dir = workspace();
	assert_eq!(bankscrape(dir.path(), &[]).status.code(), Some(1));
	assert_eq!(bankscrape(dir.path(), &["scrape"]).status.code(), Some(1));
	assert_eq!(bankscrape(dir.path(), &["scrape", "all", "--from", "01.01.2024"]).status.code(), Some(1));
}

#[test]
fn inverted_range_is_rejected_before_credentials() {
	let dir = workspace();
	let output = bankscrape(dir.path(), &["scrape", "all", "--from", "31.01.2024", "--to", "01.01.2024"]);
	assert_eq!(output.status.code(), Some(1));
	let stderr = stderr(&output);
	assert!(stderr.contains("starts after it ends"), "unexpected stderr: {stderr}");
	assert!(!stderr.contains("LOGIN_NAME"));
}

#[test]
fn missing_credentials_exit_one() {
	let dir = workspace();
	let output = bankscrape(dir.path(), &["scrape", "all", "--from", "01.01.2024", "--to", "31.01.2024"]);
	assert_eq!(output.status.code(), Some(1));
	assert!(stderr(&output).contains("LOGIN_NAME"));
}

#[test]
fn credentials_from_dotenv_are_used() {
	let dir = workspace();
	std::fs::write(dir.path().join(".env"), "LOGIN_NAME=max\nLOGIN_PIN=4711\n").unwrap();

	// --balance without a balance selector fails before any browser starts.
	let output = bankscrape(dir.path(), &["scrape", "all", "--from", "01.01.2024", "--to", "31.01.2024", "--balance"]);
	assert_eq!(output.status.code(), Some(1));
	let stderr = stderr(&output);
	assert!(stderr.contains("CONFIGURATION_INVALID"), "unexpected stderr: {stderr}");
	assert!(!stderr.contains("4711"));
}

#[test]
fn unreadable_portal_config_exit_one() {
	let dir = workspace();
	std::fs::write(dir.path().join("portal.json"), "{ not json").unwrap();
	let output = bankscrape(
		dir.path(),
		&["scrape", "all", "--from", "01.01.2024", "--to", "31.01.2024", "--portal-config", "portal.json"],
	);
	assert_eq!(output.status.code(), Some(1));
	assert!(stderr(&output).contains("portal.json"));
}
