//! Portal configuration and credentials.
//!
//! [`PortalConfig`] is loaded once per run and shared read-only by every
//! component. Every field has a default matching the portal this tool was
//! written for, so a JSON override file only needs the fields that differ.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use driver::{LaunchOptions, Viewport};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};
use crate::query::QueryFieldMapping;

/// CSS selectors for every portal control the workflow touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PortalSelectors {
	/// Overlay shown while the portal processes a request.
	pub busy_indicator: String,
	pub login_name: String,
	pub login_secret: String,
	pub login_button: String,
	pub logout_button: String,
	pub transactions_menu: String,
	pub account_select: String,
	pub search_button: String,
	pub result_rows: String,
	/// Link that starts the portal-native export download.
	pub export_link: String,
	/// Single text node holding the account balance; unset disables `--balance`.
	pub balance: Option<String>,
}

impl Default for PortalSelectors {
	fn default() -> Self {
		Self {
			busy_indicator: "body > div.ajax_loading".to_string(),
			login_name: "#loginInputSelector".to_string(),
			login_secret: "#pinInputSelector".to_string(),
			login_button: "#buttonlogin".to_string(),
			logout_button: "#logout".to_string(),
			transactions_menu: r"#menu_0\2e 0\2e 0-node".to_string(),
			account_select: "select[id$='_slAllAccounts']".to_string(),
			search_button: "#searchbutton".to_string(),
			result_rows: ".mainRow".to_string(),
			export_link: "a[href*='csvExport']".to_string(),
			balance: None,
		}
	}
}

impl PortalSelectors {
	fn named(&self) -> [(&'static str, &str); 10] {
		[
			("busyIndicator", &self.busy_indicator),
			("loginName", &self.login_name),
			("loginSecret", &self.login_secret),
			("loginButton", &self.login_button),
			("logoutButton", &self.logout_button),
			("transactionsMenu", &self.transactions_menu),
			("accountSelect", &self.account_select),
			("searchButton", &self.search_button),
			("resultRows", &self.result_rows),
			("exportLink", &self.export_link),
		]
	}
}

/// Waiting bounds, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Timing {
	/// Upper bound for each driver operation.
	pub operation_timeout_ms: u64,
	/// Interval between element condition checks.
	pub poll_interval_ms: u64,
	/// Spacing of the samples compared when waiting for results to settle.
	pub settle_interval_ms: u64,
	pub settle_timeout_ms: u64,
	pub download_timeout_ms: u64,
}

impl Default for Timing {
	fn default() -> Self {
		Self {
			operation_timeout_ms: 60_000,
			poll_interval_ms: 100,
			settle_interval_ms: 250,
			settle_timeout_ms: 10_000,
			download_timeout_ms: 60_000,
		}
	}
}

impl Timing {
	pub fn operation_timeout(&self) -> Duration {
		Duration::from_millis(self.operation_timeout_ms)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn settle_interval(&self) -> Duration {
		Duration::from_millis(self.settle_interval_ms)
	}

	pub fn settle_timeout(&self) -> Duration {
		Duration::from_millis(self.settle_timeout_ms)
	}

	pub fn download_timeout(&self) -> Duration {
		Duration::from_millis(self.download_timeout_ms)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BrowserSettings {
	pub headless: bool,
	pub viewport: Viewport,
}

impl Default for BrowserSettings {
	fn default() -> Self {
		Self {
			headless: true,
			viewport: Viewport::default(),
		}
	}
}

/// Immutable description of the portal and how to drive it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PortalConfig {
	pub base_url: String,
	pub selectors: PortalSelectors,
	/// Substring of an account label that marks a credit card.
	pub credit_card_marker: String,
	pub query_fields: QueryFieldMapping,
	pub browser: BrowserSettings,
	pub timing: Timing,
}

impl Default for PortalConfig {
	fn default() -> Self {
		Self {
			base_url: "https://www.dkb.de/banking".to_string(),
			selectors: PortalSelectors::default(),
			credit_card_marker: "Kreditkarte".to_string(),
			query_fields: QueryFieldMapping::default(),
			browser: BrowserSettings::default(),
			timing: Timing::default(),
		}
	}
}

impl PortalConfig {
	/// Reads a JSON override file and validates the result.
	pub fn from_file(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path)
			.map_err(|e| ScrapeError::Configuration(format!("cannot read {}: {}", path.display(), e)))?;
		let config: PortalConfig = serde_json::from_str(&text)
			.map_err(|e| ScrapeError::Configuration(format!("cannot parse {}: {}", path.display(), e)))?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
			return Err(ScrapeError::Configuration(format!("base URL '{}' is not an http(s) URL", self.base_url)));
		}
		for (name, selector) in self.selectors.named() {
			if selector.trim().is_empty() {
				return Err(ScrapeError::Configuration(format!("selector '{}' is empty", name)));
			}
		}
		if self.selectors.balance.as_deref().is_some_and(|s| s.trim().is_empty()) {
			return Err(ScrapeError::Configuration("selector 'balance' is empty".to_string()));
		}
		if self.credit_card_marker.is_empty() {
			return Err(ScrapeError::Configuration("credit card marker is empty".to_string()));
		}
		if self.timing.operation_timeout_ms == 0 || self.timing.poll_interval_ms == 0 || self.timing.settle_interval_ms == 0 {
			return Err(ScrapeError::Configuration("timeouts and intervals must be positive".to_string()));
		}
		self.query_fields.validate()
	}

	pub fn launch_options(&self) -> LaunchOptions {
		LaunchOptions {
			headless: self.browser.headless,
			viewport: self.browser.viewport,
			timeout: self.timing.operation_timeout(),
			poll_interval: self.timing.poll_interval(),
		}
	}
}

/// Text that must never reach logs or diagnostics.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Only the driver's `fill` should see this.
	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for Secret {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Secret(***)")
	}
}

/// Portal login.
#[derive(Debug, Clone)]
pub struct Credentials {
	pub login_name: String,
	pub secret: Secret,
}

impl Credentials {
	pub fn new(login_name: impl Into<String>, secret: impl Into<String>) -> Self {
		Self {
			login_name: login_name.into(),
			secret: Secret::new(secret),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	#[test]
	fn defaults_are_valid() {
		let config = PortalConfig::default();
		config.validate().unwrap();
		assert_eq!(config.selectors.result_rows, ".mainRow");
		assert_eq!(config.launch_options().viewport, Viewport { width: 1280, height: 1280 });
	}

	#[test]
	fn partial_file_keeps_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r##"{{"baseUrl": "http://127.0.0.1:8080/banking", "selectors": {{"balance": "#saldo"}}, "timing": {{"operationTimeoutMs": 5000}}}}"##
		)
		.unwrap();

		let config = PortalConfig::from_file(file.path()).unwrap();
		assert_eq!(config.base_url, "http://127.0.0.1:8080/banking");
		assert_eq!(config.selectors.balance.as_deref(), Some("#saldo"));
		assert_eq!(config.selectors.login_button, "#buttonlogin");
		assert_eq!(config.timing.operation_timeout(), Duration::from_secs(5));
		assert_eq!(config.timing.poll_interval_ms, 100);
	}

	#[test]
	fn invalid_file_is_configuration_error() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{"selectors": {{"loginName": "  "}}}}"#).unwrap();
		let err = PortalConfig::from_file(file.path()).unwrap_err();
		assert_eq!(err.code(), "CONFIGURATION_INVALID");
		assert!(err.to_string().contains("loginName"));
	}

	#[test]
	fn missing_file_is_configuration_error() {
		let err = PortalConfig::from_file(Path::new("/nonexistent/portal.json")).unwrap_err();
		assert!(err.to_string().contains("cannot read"));
	}

	#[test]
	fn secret_is_redacted_in_debug() {
		let credentials = Credentials::new("max.mustermann", "12345");
		let rendered = format!("{:?}", credentials);
		assert!(rendered.contains("max.mustermann"));
		assert!(!rendered.contains("12345"));
		assert_eq!(credentials.secret.expose(), "12345");
	}
}
