//! Portal session lifecycle.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use driver::{DriverError, ElementState, Launcher, PageDriver, WaitUntil};
use tracing::{debug, info, trace};

use crate::config::{Credentials, PortalConfig};
use crate::error::{Result, ScrapeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Anonymous,
	Authenticating,
	Authenticated,
	Closed,
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SessionState::Anonymous => write!(f, "anonymous"),
			SessionState::Authenticating => write!(f, "authenticating"),
			SessionState::Authenticated => write!(f, "authenticated"),
			SessionState::Closed => write!(f, "closed"),
		}
	}
}

/// An open portal page and its authentication state.
///
/// The session exclusively owns its driver. [`Session::close`] consumes the
/// session, so the driver is released at most once.
pub struct Session {
	driver: Box<dyn PageDriver>,
	config: Arc<PortalConfig>,
	state: SessionState,
	login_attempted: bool,
}

impl Session {
	/// Launches a driver and loads the portal's start page.
	///
	/// The driver is closed again when the first navigation fails.
	pub async fn open(launcher: &dyn Launcher, config: Arc<PortalConfig>) -> Result<Self> {
		let driver = launcher
			.launch(&config.launch_options())
			.await
			.map_err(ScrapeError::SessionStart)?;

		info!(target = "bankscrape.session", url = %config.base_url, "opening portal");
		if let Err(e) = driver.goto(&config.base_url, WaitUntil::DomContentLoaded).await {
			if let Err(close_err) = driver.close().await {
				debug!(target = "bankscrape.session", error = %close_err, "close after failed start");
			}
			return Err(ScrapeError::SessionStart(e));
		}

		Ok(Self {
			driver,
			config,
			state: SessionState::Anonymous,
			login_attempted: false,
		})
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	pub fn config(&self) -> &PortalConfig {
		&self.config
	}

	pub fn driver(&self) -> &dyn PageDriver {
		self.driver.as_ref()
	}

	pub fn login_attempted(&self) -> bool {
		self.login_attempted
	}

	/// Fails unless login completed.
	pub fn ensure_authenticated(&self, operation: &'static str) -> Result<()> {
		if self.state == SessionState::Authenticated {
			Ok(())
		} else {
			Err(ScrapeError::InvalidState {
				operation,
				state: self.state.to_string(),
			})
		}
	}

	/// Fills the login form, submits it and confirms the authenticated page.
	pub async fn login(&mut self, credentials: &Credentials) -> Result<()> {
		if self.state != SessionState::Anonymous {
			return Err(ScrapeError::InvalidState {
				operation: "log in",
				state: self.state.to_string(),
			});
		}
		self.state = SessionState::Authenticating;
		self.login_attempted = true;
		info!(target = "bankscrape.session", login = %credentials.login_name, "logging in");

		match self.submit_login(credentials).await {
			Ok(()) => {
				self.state = SessionState::Authenticated;
				info!(target = "bankscrape.session", "logged in");
				Ok(())
			}
			Err(e) => {
				self.state = SessionState::Anonymous;
				Err(e)
			}
		}
	}

	async fn submit_login(&self, credentials: &Credentials) -> Result<()> {
		let selectors = &self.config.selectors;
		let step = |step: &'static str| move |source: DriverError| ScrapeError::Login { step, source };

		self.driver
			.wait_for(&selectors.login_name, ElementState::Visible)
			.await
			.map_err(step("waiting for the name field"))?;
		self.driver
			.wait_for(&selectors.login_secret, ElementState::Visible)
			.await
			.map_err(step("waiting for the secret field"))?;

		self.driver
			.fill(&selectors.login_name, &credentials.login_name)
			.await
			.map_err(step("entering the login name"))?;
		self.driver
			.fill(&selectors.login_secret, credentials.secret.expose())
			.await
			.map_err(step("entering the secret"))?;

		self.driver
			.click_and_wait_for_navigation(&selectors.login_button, WaitUntil::NetworkIdle)
			.await
			.map_err(step("submitting the login form"))?;
		self.driver
			.wait_for(&selectors.logout_button, ElementState::Visible)
			.await
			.map_err(step("confirming the authenticated page"))?;
		Ok(())
	}

	/// Opens the transactions page from the main menu.
	pub async fn open_transactions(&self) -> Result<()> {
		self.ensure_authenticated("open transactions")?;
		info!(target = "bankscrape.session", "opening transactions");

		let step = "transactions page";
		self.driver
			.click(&self.config.selectors.transactions_menu)
			.await
			.map_err(|source| ScrapeError::Navigation { step, source })?;
		self.wait_idle().await.map_err(|source| ScrapeError::Navigation { step, source })
	}

	/// Waits until the portal's busy overlay is gone.
	pub async fn wait_idle(&self) -> driver::Result<()> {
		self.driver
			.wait_for(&self.config.selectors.busy_indicator, ElementState::Hidden)
			.await
	}

	/// Waits until two consecutive samples of the `selector` match count agree.
	///
	/// Samples that fail while the portal swaps documents are skipped.
	pub async fn wait_stable(&self, selector: &str) -> driver::Result<()> {
		let timing = &self.config.timing;
		let start = Instant::now();
		let mut last = None;

		loop {
			match self.driver.count(selector).await {
				Ok(current) if last == Some(current) => {
					debug!(target = "bankscrape.session", selector, count = current, "results settled");
					return Ok(());
				}
				Ok(current) => last = Some(current),
				Err(e) if e.is_transient() => {
					trace!(target = "bankscrape.session", selector, error = %e, "count sample failed");
					last = None;
				}
				Err(e) => return Err(e),
			}
			if start.elapsed() >= timing.settle_timeout() {
				return Err(DriverError::Timeout {
					ms: timing.settle_timeout_ms,
					condition: format!("'{}' to settle", selector),
				});
			}
			tokio::time::sleep(timing.settle_interval()).await;
		}
	}

	/// Clicks the logout control once. Not retried.
	pub async fn logout(&mut self) -> Result<()> {
		if !self.login_attempted {
			return Ok(());
		}
		info!(target = "bankscrape.session", "logging out");

		let step = "logout";
		self.driver
			.click(&self.config.selectors.logout_button)
			.await
			.map_err(|source| ScrapeError::Navigation { step, source })?;
		self.wait_idle().await.map_err(|source| ScrapeError::Navigation { step, source })?;
		self.state = SessionState::Anonymous;
		Ok(())
	}

	/// Releases the driver.
	pub async fn close(mut self) -> driver::Result<()> {
		self.state = SessionState::Closed;
		debug!(target = "bankscrape.session", "closing driver");
		self.driver.close().await
	}
}
