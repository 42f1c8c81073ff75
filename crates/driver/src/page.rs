//! Driver-facing traits and option types.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Element condition awaited by [`PageDriver::wait_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
	Visible,
	Hidden,
}

impl std::fmt::Display for ElementState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ElementState::Visible => write!(f, "visible"),
			ElementState::Hidden => write!(f, "hidden"),
		}
	}
}

/// Document lifecycle milestone that completes a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
	DomContentLoaded,
	#[default]
	Load,
	/// No network connections for at least 500ms.
	NetworkIdle,
}

impl WaitUntil {
	/// Name of the matching `Page.lifecycleEvent`.
	pub fn lifecycle_name(self) -> &'static str {
		match self {
			WaitUntil::DomContentLoaded => "DOMContentLoaded",
			WaitUntil::Load => "load",
			WaitUntil::NetworkIdle => "networkIdle",
		}
	}
}

/// One entry of a `<select>` control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
	pub value: String,
	pub label: String,
}

impl SelectOption {
	pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
		Self {
			value: value.into(),
			label: label.into(),
		}
	}
}

/// Browser viewport in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
	pub width: u32,
	pub height: u32,
}

impl Default for Viewport {
	fn default() -> Self {
		Self { width: 1280, height: 1280 }
	}
}

/// Settings applied once when a driver session is opened.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
	/// Run without a visible window.
	pub headless: bool,
	pub viewport: Viewport,
	/// Upper bound for every individual driver operation.
	pub timeout: Duration,
	/// Interval between element condition checks.
	pub poll_interval: Duration,
}

impl Default for LaunchOptions {
	fn default() -> Self {
		Self {
			headless: true,
			viewport: Viewport::default(),
			timeout: Duration::from_secs(60),
			poll_interval: Duration::from_millis(100),
		}
	}
}

/// Primitives for rendering and manipulating one portal page.
///
/// Selectors are CSS selectors. Every waiting primitive is bounded by the
/// [`LaunchOptions::timeout`] the driver was opened with.
#[async_trait]
pub trait PageDriver: Send + Sync {
	/// Navigates to `url` and waits for `wait_until`.
	async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<()>;

	/// Polls until the first element matching `selector` reaches `state`.
	///
	/// A missing element counts as hidden.
	async fn wait_for(&self, selector: &str, state: ElementState) -> Result<()>;

	async fn click(&self, selector: &str) -> Result<()>;

	/// Clicks `selector` and waits for the resulting document to reach `wait_until`.
	async fn click_and_wait_for_navigation(&self, selector: &str, wait_until: WaitUntil) -> Result<()>;

	/// Replaces the value of an input control with `text`.
	///
	/// Implementations must not log `text`; it may be a secret.
	async fn fill(&self, selector: &str, text: &str) -> Result<()>;

	async fn select_option(&self, selector: &str, value: &str) -> Result<()>;

	/// Reads every option of a `<select>` control in document order.
	async fn select_options(&self, selector: &str) -> Result<Vec<SelectOption>>;

	/// Reads every element matching `selector` as the trimmed text of its child cells.
	async fn rows(&self, selector: &str) -> Result<Vec<Vec<String>>>;

	/// Trimmed text of the first match, `None` when nothing matches.
	async fn text(&self, selector: &str) -> Result<Option<String>>;

	async fn count(&self, selector: &str) -> Result<usize>;

	/// Writes a PNG of the current viewport to `path`, creating parent directories.
	async fn screenshot(&self, path: &Path) -> Result<()>;

	/// Routes subsequent downloads into `dir`.
	async fn set_download_dir(&self, dir: &Path) -> Result<()>;

	/// Releases the browser. Calling it more than once is a no-op.
	async fn close(&self) -> Result<()>;
}

/// Opens driver sessions.
#[async_trait]
pub trait Launcher: Send + Sync {
	async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn PageDriver>>;
}
