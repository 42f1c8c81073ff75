//! Best-effort screenshots at fixed points of a run.

use std::path::PathBuf;

use driver::PageDriver;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
	BeforeLogin,
	Error,
	AfterLogout,
}

impl Checkpoint {
	pub fn file_name(self) -> &'static str {
		match self {
			Checkpoint::BeforeLogin => "before_login.png",
			Checkpoint::Error => "error.png",
			Checkpoint::AfterLogout => "after_logout.png",
		}
	}
}

#[derive(Debug, Clone)]
pub struct Diagnostics {
	dir: PathBuf,
}

impl Diagnostics {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn path(&self, checkpoint: Checkpoint) -> PathBuf {
		self.dir.join(checkpoint.file_name())
	}

	/// Saves a screenshot for `checkpoint`. Failures are logged, never raised.
	pub async fn capture(&self, driver: &dyn PageDriver, checkpoint: Checkpoint) -> bool {
		let path = self.path(checkpoint);
		match driver.screenshot(&path).await {
			Ok(()) => {
				info!(target = "bankscrape.diagnostics", path = %path.display(), "screenshot saved");
				true
			}
			Err(e) => {
				warn!(target = "bankscrape.diagnostics", path = %path.display(), error = %e, "screenshot failed");
				false
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use driver::fake::{FakeAction, FakePage};

	use super::*;

	#[tokio::test]
	async fn capture_writes_into_directory() {
		let dir = tempfile::tempdir().unwrap();
		let diagnostics = Diagnostics::new(dir.path().join("shots"));
		let page = FakePage::new();

		assert!(diagnostics.capture(&page, Checkpoint::Error).await);
		let expected = dir.path().join("shots/error.png");
		assert!(expected.exists());
		assert_eq!(page.actions(), vec![FakeAction::Screenshot(expected)]);
	}
}
