//! Environment and file configuration for a run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bankscrape::{Credentials, PortalConfig};
use tracing::debug;

pub const LOGIN_NAME: &str = "LOGIN_NAME";
pub const LOGIN_PIN: &str = "LOGIN_PIN";
pub const BANK_BASE_URL: &str = "BANK_BASE_URL";
pub const BANK_CHROME_PATH: &str = "BANK_CHROME_PATH";

/// Loads `.env` from the working directory or a parent, if present.
pub fn load_dotenv() {
	match dotenvy::dotenv() {
		Ok(path) => debug!(target = "bankscrape.config", path = %path.display(), "loaded .env"),
		Err(e) if e.not_found() => {}
		Err(e) => debug!(target = "bankscrape.config", error = %e, "ignoring unreadable .env"),
	}
}

/// Non-empty value of `key` in the process environment.
pub fn env_var(key: &str) -> Option<String> {
	std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Reads the portal login from `lookup` (normally [`env_var`]).
pub fn credentials_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
	let name = lookup(LOGIN_NAME);
	let secret = lookup(LOGIN_PIN);
	match (name, secret) {
		(Some(name), Some(secret)) => Ok(Credentials::new(name, secret)),
		(None, _) => bail!("{} is not set (environment or .env)", LOGIN_NAME),
		(_, None) => bail!("{} is not set (environment or .env)", LOGIN_PIN),
	}
}

/// Builds the portal configuration: defaults, then `file`, then `base_url`.
pub fn portal_config(file: Option<&Path>, base_url: Option<String>) -> Result<PortalConfig> {
	let mut config = match file {
		Some(path) => PortalConfig::from_file(path).with_context(|| format!("loading portal configuration {}", path.display()))?,
		None => PortalConfig::default(),
	};
	if let Some(url) = base_url {
		config.base_url = url;
	}
	config.validate().context("validating portal configuration")?;
	Ok(config)
}

/// Browser executable from the command line, else from `BANK_CHROME_PATH`.
pub fn chrome_path(explicit: Option<PathBuf>, lookup: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
	explicit.or_else(|| lookup(BANK_CHROME_PATH).map(PathBuf::from))
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;
	use std::io::Write;

	use super::*;

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
		move |key: &str| map.get(key).cloned()
	}

	#[test]
	fn credentials_need_name_and_pin() {
		let credentials = credentials_from(lookup(&[(LOGIN_NAME, "max"), (LOGIN_PIN, "4711")])).unwrap();
		assert_eq!(credentials.login_name, "max");
		assert_eq!(credentials.secret.expose(), "4711");

		let err = credentials_from(lookup(&[(LOGIN_NAME, "max")])).unwrap_err();
		assert!(err.to_string().contains(LOGIN_PIN));
		let err = credentials_from(lookup(&[])).unwrap_err();
		assert!(err.to_string().contains(LOGIN_NAME));
	}

	#[test]
	fn base_url_overrides_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{"baseUrl": "https://file.example/banking", "creditCardMarker": "Visa"}}"#).unwrap();

		let config = portal_config(Some(file.path()), Some("http://127.0.0.1:9000/banking".into())).unwrap();
		assert_eq!(config.base_url, "http://127.0.0.1:9000/banking");
		assert_eq!(config.credit_card_marker, "Visa");
	}

	#[test]
	fn invalid_base_url_is_rejected() {
		let err = portal_config(None, Some("ftp://bank".into())).unwrap_err();
		assert!(format!("{err:#}").contains("not an http(s) URL"));
	}

	#[test]
	fn chrome_path_prefers_flag() {
		let env = lookup(&[(BANK_CHROME_PATH, "/opt/chrome")]);
		assert_eq!(chrome_path(Some("/usr/bin/chromium".into()), &env), Some(PathBuf::from("/usr/bin/chromium")));
		assert_eq!(chrome_path(None, &env), Some(PathBuf::from("/opt/chrome")));
		assert_eq!(chrome_path(None, lookup(&[])), None);
	}
}
