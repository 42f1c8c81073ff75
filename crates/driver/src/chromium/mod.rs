//! Chromium-family browser driven over the DevTools protocol.

mod connection;
mod finder;
mod launcher;
mod scripts;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use bankscrape_protocol::{AttachToTargetResult, CreateTargetResult, EvaluateResult, LifecycleEvent, NavigateResult, ScreenshotData};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, trace};

pub use connection::CdpConnection;
pub use finder::find_chrome_executable;
pub use launcher::{BrowserProcess, launch_chromium};

use crate::error::{DriverError, Result};
use crate::page::{ElementState, LaunchOptions, Launcher, PageDriver, SelectOption, WaitUntil};
use crate::process::{DEFAULT_DEBUG_PORT, pick_debug_port};

/// Launches a local Chromium-family browser per session.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
	executable: Option<PathBuf>,
}

impl ChromiumLauncher {
	pub fn new() -> Self {
		Self::default()
	}

	/// Uses `path` instead of searching the usual install locations.
	pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
		self.executable = Some(path.into());
		self
	}
}

#[async_trait]
impl Launcher for ChromiumLauncher {
	async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn PageDriver>> {
		let executable = find_chrome_executable(self.executable.as_deref()).ok_or_else(|| match &self.executable {
			Some(path) => DriverError::Launch(format!("Browser executable not found: {}", path.display())),
			None => DriverError::Launch("Could not find a Chrome/Chromium executable; set BANK_CHROME_PATH or pass --chrome".to_string()),
		})?;
		let port = pick_debug_port(DEFAULT_DEBUG_PORT).ok_or_else(|| DriverError::Launch("No free debugging port".to_string()))?;

		debug!(target = "bankscrape.driver", executable = %executable.display(), port, headless = options.headless, "launching browser");
		let (process, info) = launch_chromium(&executable, options, port).await?;
		let page = ChromiumPage::attach(process, &info.web_socket_debugger_url, options).await?;
		Ok(Box::new(page))
	}
}

/// One page target of a launched browser.
pub struct ChromiumPage {
	connection: CdpConnection,
	session_id: String,
	main_frame_id: String,
	options: LaunchOptions,
	process: Mutex<Option<BrowserProcess>>,
	closed: AtomicBool,
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
	Ok(serde_json::from_value(value)?)
}

impl ChromiumPage {
	/// Opens a fresh page target on the browser behind `ws_url` and prepares it for driving.
	pub async fn attach(process: BrowserProcess, ws_url: &str, options: &LaunchOptions) -> Result<Self> {
		let connection = CdpConnection::connect(ws_url, options.timeout).await?;

		let target: CreateTargetResult = decode(connection.send("Target.createTarget", json!({ "url": "about:blank" }), None).await?)?;
		let attached: AttachToTargetResult = decode(
			connection
				.send("Target.attachToTarget", json!({ "targetId": target.target_id, "flatten": true }), None)
				.await?,
		)?;
		let session = attached.session_id.as_str();

		connection.send("Page.enable", json!({}), Some(session)).await?;
		connection
			.send("Page.setLifecycleEventsEnabled", json!({ "enabled": true }), Some(session))
			.await?;
		connection
			.send(
				"Emulation.setDeviceMetricsOverride",
				json!({
					"width": options.viewport.width,
					"height": options.viewport.height,
					"deviceScaleFactor": 1,
					"mobile": false,
				}),
				Some(session),
			)
			.await?;

		let tree = connection.send("Page.getFrameTree", json!({}), Some(session)).await?;
		let main_frame_id = tree["frameTree"]["frame"]["id"]
			.as_str()
			.map(str::to_string)
			.ok_or_else(|| DriverError::Protocol {
				method: "Page.getFrameTree".to_string(),
				message: "response has no main frame".to_string(),
			})?;

		debug!(target = "bankscrape.driver", target_id = %target.target_id, "page attached");
		Ok(Self {
			connection,
			session_id: attached.session_id,
			main_frame_id,
			options: options.clone(),
			process: Mutex::new(Some(process)),
			closed: AtomicBool::new(false),
		})
	}

	async fn call(&self, method: &str, params: Value) -> Result<Value> {
		self.connection.send(method, params, Some(&self.session_id)).await
	}

	async fn evaluate(&self, expression: &str) -> Result<Value> {
		let result: EvaluateResult = decode(
			self.call(
				"Runtime.evaluate",
				json!({ "expression": expression, "returnByValue": true, "awaitPromise": true }),
			)
			.await?,
		)?;
		if let Some(details) = result.exception_details {
			return Err(DriverError::Evaluation(details.message().to_string()));
		}
		Ok(result.result.value.unwrap_or(Value::Null))
	}

	/// Waits for a main-frame lifecycle event named `name`, optionally from a specific loader.
	async fn await_lifecycle(
		&self,
		events: &mut broadcast::Receiver<bankscrape_protocol::Event>,
		loader_id: Option<&str>,
		name: &str,
		start: Instant,
	) -> Result<LifecycleEvent> {
		let timeout = self.options.timeout;
		loop {
			let remaining = timeout.saturating_sub(start.elapsed());
			let event = match tokio::time::timeout(remaining, events.recv()).await {
				Ok(Ok(event)) => event,
				Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
					trace!(target = "bankscrape.driver", skipped, "lifecycle waiter lagged");
					continue;
				}
				Ok(Err(broadcast::error::RecvError::Closed)) => return Err(DriverError::ChannelClosed),
				Err(_) => return Err(DriverError::timeout(timeout, format!("page lifecycle '{}'", name))),
			};

			if event.method != "Page.lifecycleEvent" || !event.is_from(&self.session_id) {
				continue;
			}
			let Ok(lifecycle) = serde_json::from_value::<LifecycleEvent>(event.params) else {
				continue;
			};
			if lifecycle.frame_id != self.main_frame_id || lifecycle.name != name {
				continue;
			}
			if loader_id.is_some_and(|loader| loader != lifecycle.loader_id) {
				continue;
			}
			return Ok(lifecycle);
		}
	}
}

#[async_trait]
impl PageDriver for ChromiumPage {
	async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<()> {
		let start = Instant::now();
		let mut events = self.connection.subscribe();

		let navigated: NavigateResult = decode(self.call("Page.navigate", json!({ "url": url })).await?)?;
		if let Some(reason) = navigated.error_text {
			return Err(DriverError::Navigation {
				url: url.to_string(),
				reason,
			});
		}
		let Some(loader_id) = navigated.loader_id else {
			return Ok(());
		};

		self.await_lifecycle(&mut events, Some(&loader_id), wait_until.lifecycle_name(), start)
			.await
			.map_err(|e| {
				if e.is_timeout() {
					DriverError::Navigation {
						url: url.to_string(),
						reason: e.to_string(),
					}
				} else {
					e
				}
			})?;
		debug!(target = "bankscrape.driver", %url, "navigated");
		Ok(())
	}

	async fn wait_for(&self, selector: &str, state: ElementState) -> Result<()> {
		let start = Instant::now();
		let script = scripts::is_visible(selector);
		let wanted = state == ElementState::Visible;

		loop {
			match self.evaluate(&script).await {
				Ok(value) if value.as_bool().unwrap_or(false) == wanted => return Ok(()),
				Ok(_) => {}
				Err(e) if e.is_transient() => trace!(target = "bankscrape.driver", error = %e, "visibility check failed"),
				Err(e) => return Err(e),
			}

			if start.elapsed() >= self.options.timeout {
				return Err(DriverError::timeout(self.options.timeout, format!("'{}' to be {}", selector, state)));
			}
			tokio::time::sleep(self.options.poll_interval).await;
		}
	}

	async fn click(&self, selector: &str) -> Result<()> {
		trace!(target = "bankscrape.driver", selector, "click");
		match self.evaluate(&scripts::click(selector)).await?.as_bool() {
			Some(true) => Ok(()),
			_ => Err(DriverError::ElementNotFound {
				selector: selector.to_string(),
			}),
		}
	}

	async fn click_and_wait_for_navigation(&self, selector: &str, wait_until: WaitUntil) -> Result<()> {
		let start = Instant::now();
		let mut events = self.connection.subscribe();

		self.click(selector).await?;
		let committed = self.await_lifecycle(&mut events, None, "init", start).await?;
		self.await_lifecycle(&mut events, Some(&committed.loader_id), wait_until.lifecycle_name(), start)
			.await?;
		Ok(())
	}

	async fn fill(&self, selector: &str, text: &str) -> Result<()> {
		trace!(target = "bankscrape.driver", selector, "fill");
		let focused = self.evaluate(&scripts::focus_and_clear(selector)).await?;
		if focused.as_bool() != Some(true) {
			return Err(DriverError::ElementNotFound {
				selector: selector.to_string(),
			});
		}
		self.call("Input.insertText", json!({ "text": text })).await?;
		self.evaluate(&scripts::commit_input(selector)).await?;
		Ok(())
	}

	async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
		trace!(target = "bankscrape.driver", selector, value, "select option");
		match self.evaluate(&scripts::select_option(selector, value)).await?.as_str() {
			Some("ok") => Ok(()),
			Some("no-option") => Err(DriverError::OptionNotFound {
				selector: selector.to_string(),
				value: value.to_string(),
			}),
			_ => Err(DriverError::ElementNotFound {
				selector: selector.to_string(),
			}),
		}
	}

	async fn select_options(&self, selector: &str) -> Result<Vec<SelectOption>> {
		match self.evaluate(&scripts::select_options(selector)).await? {
			Value::Null => Err(DriverError::ElementNotFound {
				selector: selector.to_string(),
			}),
			options => decode(options),
		}
	}

	async fn rows(&self, selector: &str) -> Result<Vec<Vec<String>>> {
		decode(self.evaluate(&scripts::rows(selector)).await?)
	}

	async fn text(&self, selector: &str) -> Result<Option<String>> {
		decode(self.evaluate(&scripts::text(selector)).await?)
	}

	async fn count(&self, selector: &str) -> Result<usize> {
		let count = self.evaluate(&scripts::count(selector)).await?;
		Ok(count.as_u64().unwrap_or(0) as usize)
	}

	async fn screenshot(&self, path: &Path) -> Result<()> {
		let method = "Page.captureScreenshot";
		let shot: ScreenshotData = decode(self.call(method, json!({ "format": "png" })).await?)?;
		let bytes = shot.decode().map_err(|e| DriverError::Protocol {
			method: method.to_string(),
			message: e.to_string(),
		})?;

		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			tokio::fs::create_dir_all(parent).await?;
		}
		tokio::fs::write(path, bytes).await?;
		debug!(target = "bankscrape.driver", path = %path.display(), "screenshot saved");
		Ok(())
	}

	async fn set_download_dir(&self, dir: &Path) -> Result<()> {
		let dir = std::path::absolute(dir)?;
		self.connection
			.send(
				"Browser.setDownloadBehavior",
				json!({ "behavior": "allow", "downloadPath": dir.to_string_lossy(), "eventsEnabled": true }),
				None,
			)
			.await?;
		Ok(())
	}

	async fn close(&self) -> Result<()> {
		if self.closed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}

		if let Err(e) = self.connection.send("Browser.close", json!({}), None).await {
			debug!(target = "bankscrape.driver", error = %e, "Browser.close failed");
		}
		let process = self.process.lock().take();
		if let Some(mut process) = process {
			process.terminate().await;
			debug!(target = "bankscrape.driver", port = process.port(), "browser closed");
		}
		Ok(())
	}
}
