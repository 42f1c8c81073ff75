//! Browser process lifecycle.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use bankscrape_protocol::CdpVersionInfo;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{DriverError, Result};
use crate::page::LaunchOptions;

const ENDPOINT_ATTEMPTS: u32 = 50;
const ENDPOINT_INTERVAL: Duration = Duration::from_millis(200);
const EXIT_GRACE: Duration = Duration::from_secs(3);
const VERSION_TIMEOUT: Duration = Duration::from_millis(400);

/// A launched browser with its throwaway profile directory.
///
/// The profile is removed when this value drops; the process is killed if it
/// is still running by then.
pub struct BrowserProcess {
	child: Child,
	_profile: TempDir,
	port: u16,
}

impl BrowserProcess {
	pub fn port(&self) -> u16 {
		self.port
	}

	/// Waits briefly for a voluntary exit, then kills the process.
	pub async fn terminate(&mut self) {
		let deadline = tokio::time::Instant::now() + EXIT_GRACE;
		while tokio::time::Instant::now() < deadline {
			match self.child.try_wait() {
				Ok(Some(status)) => {
					debug!(target = "bankscrape.driver", %status, "browser exited");
					return;
				}
				Ok(None) => tokio::time::sleep(Duration::from_millis(100)).await,
				Err(e) => {
					warn!(target = "bankscrape.driver", error = %e, "failed to poll browser process");
					break;
				}
			}
		}

		if let Err(e) = self.child.kill().await {
			warn!(target = "bankscrape.driver", error = %e, "failed to kill browser process");
		}
	}
}

/// Reads `/json/version` from a local debugging port.
struct VersionEndpoint {
	client: reqwest::Client,
	url: String,
}

impl VersionEndpoint {
	fn new(port: u16) -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(VERSION_TIMEOUT)
			.build()
			.map_err(|e| DriverError::Launch(format!("Failed to create HTTP client: {}", e)))?;
		Ok(Self {
			client,
			url: format!("http://127.0.0.1:{}/json/version", port),
		})
	}

	async fn version(&self) -> std::result::Result<CdpVersionInfo, String> {
		let response = self.client.get(&self.url).send().await.map_err(|e| e.to_string())?;
		let status = response.status();
		if !status.is_success() {
			return Err(format!("{} answered {}", self.url, status));
		}
		response.json().await.map_err(|e| format!("malformed {} body: {}", self.url, e))
	}
}

/// Spawns `executable` with remote debugging on `port` and waits for its endpoint.
pub async fn launch_chromium(executable: &Path, options: &LaunchOptions, port: u16) -> Result<(BrowserProcess, CdpVersionInfo)> {
	let profile = tempfile::Builder::new()
		.prefix("bankscrape-profile-")
		.tempdir()
		.map_err(|e| DriverError::Launch(format!("Failed to create profile directory: {}", e)))?;

	let mut args = vec![
		format!("--remote-debugging-port={}", port),
		format!("--user-data-dir={}", profile.path().display()),
		"--no-first-run".to_string(),
		"--no-default-browser-check".to_string(),
		"--no-sandbox".to_string(),
		"--disable-setuid-sandbox".to_string(),
		format!("--window-size={},{}", options.viewport.width, options.viewport.height),
	];
	if options.headless {
		args.push("--headless=new".to_string());
	}
	args.push("about:blank".to_string());

	let endpoint = VersionEndpoint::new(port)?;
	let mut cmd = Command::new(executable);
	cmd.args(&args).stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null()).kill_on_drop(true);

	#[cfg(unix)]
	cmd.process_group(0);

	let child = cmd
		.spawn()
		.map_err(|e| DriverError::Launch(format!("Failed to launch {}: {}", executable.display(), e)))?;

	let mut process = BrowserProcess {
		child,
		_profile: profile,
		port,
	};

	let mut last_error = "endpoint not reachable".to_string();
	for _ in 0..ENDPOINT_ATTEMPTS {
		tokio::time::sleep(ENDPOINT_INTERVAL).await;

		if let Ok(Some(status)) = process.child.try_wait() {
			return Err(DriverError::Launch(format!(
				"Browser exited before its debugging endpoint became available (status: {})",
				status
			)));
		}

		match endpoint.version().await {
			Ok(info) => {
				debug!(target = "bankscrape.driver", port, browser = ?info.browser, "debugging endpoint ready");
				return Ok((process, info));
			}
			Err(reason) => last_error = reason,
		}
	}

	process.terminate().await;
	Err(DriverError::Launch(format!(
		"Browser launched but debugging endpoint not available on port {}: {}",
		port, last_error
	)))
}

#[cfg(test)]
mod tests {
	use std::io::{Read, Write};
	use std::net::TcpListener;

	use super::*;

	fn serve_once(body: &'static str) -> u16 {
		let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
		let port = listener.local_addr().unwrap().port();
		std::thread::spawn(move || {
			let (mut stream, _) = listener.accept().unwrap();
			let mut request = [0u8; 1024];
			let _ = stream.read(&mut request);
			let response = format!(
				"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
				body.len(),
				body
			);
			stream.write_all(response.as_bytes()).unwrap();
		});
		port
	}

	#[tokio::test]
	async fn version_endpoint_reads_websocket_url() {
		let port = serve_once(r#"{"Browser": "Chrome/126.0", "webSocketDebuggerUrl": "ws://127.0.0.1/devtools/browser/abc"}"#);
		let info = VersionEndpoint::new(port).unwrap().version().await.unwrap();
		assert_eq!(info.web_socket_debugger_url, "ws://127.0.0.1/devtools/browser/abc");
		assert_eq!(info.browser.as_deref(), Some("Chrome/126.0"));
	}

	#[tokio::test]
	async fn closed_port_reports_reason() {
		let port = {
			let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
			listener.local_addr().unwrap().port()
		};
		assert!(VersionEndpoint::new(port).unwrap().version().await.is_err());
	}
}
