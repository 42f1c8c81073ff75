//! Scripted in-memory page for exercising the workflow without a browser.
//!
//! # Example
//!
//! ```ignore
//! let page = FakePage::new()
//!     .with_visible("#loginInput")
//!     .on_click("#login", ClickEffect::navigate().showing("#logout"));
//! let launcher = page.launcher();
//! // run the workflow against `launcher`, then inspect `page.actions()`
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{DriverError, Result};
use crate::page::{ElementState, LaunchOptions, Launcher, PageDriver, SelectOption, WaitUntil};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Something the workflow did to the page, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeAction {
	Goto(String),
	Click(String),
	Fill { selector: String, text: String },
	Select { selector: String, value: String },
	Screenshot(PathBuf),
	DownloadDir(PathBuf),
	Close,
}

/// What happens when an element is clicked.
#[derive(Debug, Clone, Default)]
pub struct ClickEffect {
	navigates: bool,
	show: Vec<String>,
	hide: Vec<String>,
	download: Option<(String, Vec<u8>)>,
}

impl ClickEffect {
	pub fn none() -> Self {
		Self::default()
	}

	/// The click loads a new document.
	pub fn navigate() -> Self {
		Self {
			navigates: true,
			..Self::default()
		}
	}

	pub fn showing(mut self, selector: impl Into<String>) -> Self {
		self.show.push(selector.into());
		self
	}

	pub fn hiding(mut self, selector: impl Into<String>) -> Self {
		self.hide.push(selector.into());
		self
	}

	/// Writes `bytes` as `file_name` into the configured download directory.
	pub fn downloading(mut self, file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
		self.download = Some((file_name.into(), bytes.into()));
		self
	}
}

struct ScopedRows {
	select: String,
	value: String,
	rows_selector: String,
	rows: Vec<Vec<String>>,
}

#[derive(Default)]
struct FakeState {
	visible: HashSet<String>,
	options: HashMap<String, Vec<SelectOption>>,
	selected: HashMap<String, String>,
	rows: HashMap<String, Vec<Vec<String>>>,
	scoped_rows: Vec<ScopedRows>,
	texts: HashMap<String, String>,
	counts: HashMap<String, VecDeque<usize>>,
	reloads: HashMap<String, usize>,
	clicks: HashMap<String, ClickEffect>,
	goto_failure: Option<String>,
	download_dir: Option<PathBuf>,
	actions: Vec<FakeAction>,
	close_count: usize,
	launch_count: usize,
}

/// Cloneable handle to one scripted page; clones share state.
#[derive(Clone, Default)]
pub struct FakePage {
	state: Arc<Mutex<FakeState>>,
}

impl FakePage {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_visible(self, selector: impl Into<String>) -> Self {
		self.state.lock().visible.insert(selector.into());
		self
	}

	pub fn with_options(self, selector: impl Into<String>, options: Vec<SelectOption>) -> Self {
		self.state.lock().options.insert(selector.into(), options);
		self
	}

	pub fn with_rows(self, selector: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
		self.state.lock().rows.insert(selector.into(), rows);
		self
	}

	/// Rows returned for `rows_selector` while `select` has `value` selected.
	pub fn with_rows_for(
		self,
		select: impl Into<String>,
		value: impl Into<String>,
		rows_selector: impl Into<String>,
		rows: Vec<Vec<String>>,
	) -> Self {
		self.state.lock().scoped_rows.push(ScopedRows {
			select: select.into(),
			value: value.into(),
			rows_selector: rows_selector.into(),
			rows,
		});
		self
	}

	pub fn with_text(self, selector: impl Into<String>, text: impl Into<String>) -> Self {
		self.state.lock().texts.insert(selector.into(), text.into());
		self
	}

	/// Successive `count` results for `selector`; the last one repeats.
	pub fn with_counts(self, selector: impl Into<String>, counts: impl IntoIterator<Item = usize>) -> Self {
		self.state.lock().counts.insert(selector.into(), counts.into_iter().collect());
		self
	}

	/// The next `times` calls to `count(selector)` fail as if the document were
	/// being replaced.
	pub fn reloading(self, selector: impl Into<String>, times: usize) -> Self {
		self.state.lock().reloads.insert(selector.into(), times);
		self
	}

	pub fn on_click(self, selector: impl Into<String>, effect: ClickEffect) -> Self {
		self.state.lock().clicks.insert(selector.into(), effect);
		self
	}

	/// Every `goto` fails with a navigation error carrying `reason`.
	pub fn failing_goto(self, reason: impl Into<String>) -> Self {
		self.state.lock().goto_failure = Some(reason.into());
		self
	}

	pub fn actions(&self) -> Vec<FakeAction> {
		self.state.lock().actions.clone()
	}

	pub fn close_count(&self) -> usize {
		self.state.lock().close_count
	}

	pub fn launch_count(&self) -> usize {
		self.state.lock().launch_count
	}

	pub fn is_visible(&self, selector: &str) -> bool {
		self.state.lock().visible.contains(selector)
	}

	pub fn launcher(&self) -> FakeLauncher {
		FakeLauncher {
			page: self.clone(),
			failure: None,
		}
	}

	fn record(&self, action: FakeAction) {
		self.state.lock().actions.push(action);
	}

	fn apply_click(&self, selector: &str) -> Result<ClickEffect> {
		let (effect, download_dir) = {
			let mut state = self.state.lock();
			state.actions.push(FakeAction::Click(selector.to_string()));
			let effect = match state.clicks.get(selector) {
				Some(effect) => effect.clone(),
				None if state.visible.contains(selector) => ClickEffect::none(),
				None => {
					return Err(DriverError::ElementNotFound {
						selector: selector.to_string(),
					});
				}
			};
			for shown in &effect.show {
				state.visible.insert(shown.clone());
			}
			for hidden in &effect.hide {
				state.visible.remove(hidden);
			}
			(effect, state.download_dir.clone())
		};

		if let Some((name, bytes)) = &effect.download {
			let dir = download_dir.ok_or_else(|| DriverError::Evaluation("download started without a download directory".to_string()))?;
			std::fs::write(dir.join(name), bytes)?;
		}
		Ok(effect)
	}
}

#[async_trait]
impl PageDriver for FakePage {
	async fn goto(&self, url: &str, _wait_until: WaitUntil) -> Result<()> {
		let mut state = self.state.lock();
		state.actions.push(FakeAction::Goto(url.to_string()));
		match &state.goto_failure {
			Some(reason) => Err(DriverError::Navigation {
				url: url.to_string(),
				reason: reason.clone(),
			}),
			None => Ok(()),
		}
	}

	async fn wait_for(&self, selector: &str, state: ElementState) -> Result<()> {
		let visible = self.is_visible(selector);
		if visible == (state == ElementState::Visible) {
			Ok(())
		} else {
			Err(DriverError::timeout(Duration::ZERO, format!("'{}' to be {}", selector, state)))
		}
	}

	async fn click(&self, selector: &str) -> Result<()> {
		self.apply_click(selector).map(|_| ())
	}

	async fn click_and_wait_for_navigation(&self, selector: &str, wait_until: WaitUntil) -> Result<()> {
		let effect = self.apply_click(selector)?;
		if effect.navigates {
			Ok(())
		} else {
			Err(DriverError::timeout(Duration::ZERO, format!("page lifecycle '{}'", wait_until.lifecycle_name())))
		}
	}

	async fn fill(&self, selector: &str, text: &str) -> Result<()> {
		let mut state = self.state.lock();
		if !state.visible.contains(selector) {
			return Err(DriverError::ElementNotFound {
				selector: selector.to_string(),
			});
		}
		state.actions.push(FakeAction::Fill {
			selector: selector.to_string(),
			text: text.to_string(),
		});
		Ok(())
	}

	async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
		let mut state = self.state.lock();
		let options = state.options.get(selector).ok_or_else(|| DriverError::ElementNotFound {
			selector: selector.to_string(),
		})?;
		if !options.iter().any(|option| option.value == value) {
			return Err(DriverError::OptionNotFound {
				selector: selector.to_string(),
				value: value.to_string(),
			});
		}
		state.selected.insert(selector.to_string(), value.to_string());
		state.actions.push(FakeAction::Select {
			selector: selector.to_string(),
			value: value.to_string(),
		});
		Ok(())
	}

	async fn select_options(&self, selector: &str) -> Result<Vec<SelectOption>> {
		self.state
			.lock()
			.options
			.get(selector)
			.cloned()
			.ok_or_else(|| DriverError::ElementNotFound {
				selector: selector.to_string(),
			})
	}

	async fn rows(&self, selector: &str) -> Result<Vec<Vec<String>>> {
		let state = self.state.lock();
		let scoped = state.scoped_rows.iter().find(|scoped| {
			scoped.rows_selector == selector && state.selected.get(&scoped.select) == Some(&scoped.value)
		});
		Ok(match scoped {
			Some(scoped) => scoped.rows.clone(),
			None => state.rows.get(selector).cloned().unwrap_or_default(),
		})
	}

	async fn text(&self, selector: &str) -> Result<Option<String>> {
		Ok(self.state.lock().texts.get(selector).map(|text| text.trim().to_string()))
	}

	async fn count(&self, selector: &str) -> Result<usize> {
		let mut state = self.state.lock();
		if let Some(remaining) = state.reloads.get_mut(selector).filter(|remaining| **remaining > 0) {
			*remaining -= 1;
			return Err(DriverError::Evaluation("Execution context was destroyed.".to_string()));
		}
		if let Some(counts) = state.counts.get_mut(selector) {
			let next = if counts.len() > 1 { counts.pop_front() } else { counts.front().copied() };
			if let Some(count) = next {
				return Ok(count);
			}
		}
		if let Some(rows) = state.rows.get(selector) {
			return Ok(rows.len());
		}
		let present = state.visible.contains(selector) || state.texts.contains_key(selector) || state.options.contains_key(selector);
		Ok(usize::from(present))
	}

	async fn screenshot(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(path, PNG_MAGIC)?;
		self.record(FakeAction::Screenshot(path.to_path_buf()));
		Ok(())
	}

	async fn set_download_dir(&self, dir: &Path) -> Result<()> {
		let mut state = self.state.lock();
		state.download_dir = Some(dir.to_path_buf());
		state.actions.push(FakeAction::DownloadDir(dir.to_path_buf()));
		Ok(())
	}

	async fn close(&self) -> Result<()> {
		let mut state = self.state.lock();
		state.close_count += 1;
		state.actions.push(FakeAction::Close);
		Ok(())
	}
}

/// Hands out a shared [`FakePage`], or fails like a browser that never started.
pub struct FakeLauncher {
	page: FakePage,
	failure: Option<String>,
}

impl FakeLauncher {
	pub fn failing(reason: impl Into<String>) -> Self {
		Self {
			page: FakePage::new(),
			failure: Some(reason.into()),
		}
	}
}

#[async_trait]
impl Launcher for FakeLauncher {
	async fn launch(&self, _options: &LaunchOptions) -> Result<Box<dyn PageDriver>> {
		if let Some(reason) = &self.failure {
			return Err(DriverError::Launch(reason.clone()));
		}
		self.page.state.lock().launch_count += 1;
		Ok(Box::new(self.page.clone()))
	}
}
