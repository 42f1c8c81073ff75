use std::path::PathBuf;

use driver::DriverError;
use thiserror::Error;

/// Run-fatal failures of the extraction workflow.
#[derive(Debug, Error)]
pub enum ScrapeError {
	#[error("Failed to open portal session: {0}")]
	SessionStart(#[source] DriverError),

	#[error("Login failed while {step}: {source}")]
	Login {
		step: &'static str,
		#[source]
		source: DriverError,
	},

	#[error("Navigation to {step} failed: {source}")]
	Navigation {
		step: &'static str,
		#[source]
		source: DriverError,
	},

	#[error("Account discovery failed: {0}")]
	Discovery(#[source] DriverError),

	#[error("Configuration error: {0}")]
	Configuration(String),

	#[error("Query failed: {0}")]
	Query(String),

	#[error("Extraction failed for '{account}': {reason}")]
	Extraction { account: String, reason: String },

	#[error("Failed to write export {}: {source}", .path.display())]
	Export {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Cannot {operation} while the session is {state}")]
	InvalidState { operation: &'static str, state: String },
}

impl ScrapeError {
	/// Stable identifier logged alongside the message.
	pub fn code(&self) -> &'static str {
		match self {
			ScrapeError::SessionStart(_) => "SESSION_START_FAILED",
			ScrapeError::Login { .. } => "LOGIN_FAILED",
			ScrapeError::Navigation { .. } => "NAVIGATION_FAILED",
			ScrapeError::Discovery(_) => "DISCOVERY_FAILED",
			ScrapeError::Configuration(_) => "CONFIGURATION_INVALID",
			ScrapeError::Query(_) => "QUERY_FAILED",
			ScrapeError::Extraction { .. } => "EXTRACTION_FAILED",
			ScrapeError::Export { .. } => "EXPORT_FAILED",
			ScrapeError::InvalidState { .. } => "INVALID_SESSION_STATE",
		}
	}

	pub(crate) fn extraction(account: &str, reason: impl std::fmt::Display) -> Self {
		ScrapeError::Extraction {
			account: account.to_string(),
			reason: reason.to_string(),
		}
	}

	pub(crate) fn export(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		ScrapeError::Export {
			path: path.into(),
			source,
		}
	}
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn codes_are_stable() {
		let err = ScrapeError::Configuration("no mapping for credit".into());
		assert_eq!(err.code(), "CONFIGURATION_INVALID");
		assert_eq!(err.to_string(), "Configuration error: no mapping for credit");

		let err = ScrapeError::Login {
			step: "waiting for the name field",
			source: DriverError::ElementNotFound {
				selector: "#loginInputSelector".into(),
			},
		};
		assert_eq!(err.code(), "LOGIN_FAILED");
		assert!(err.to_string().contains("#loginInputSelector"));
	}

	#[test]
	fn export_error_names_path() {
		let err = ScrapeError::export("/out/Giro/01.01.2024_31.01.2024.json", std::io::Error::other("disk full"));
		assert_eq!(err.code(), "EXPORT_FAILED");
		assert_eq!(err.to_string(), "Failed to write export /out/Giro/01.01.2024_31.01.2024.json: disk full");
	}
}
