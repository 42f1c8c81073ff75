use thiserror::Error;

/// Failures raised by page driver primitives.
#[derive(Debug, Error)]
pub enum DriverError {
	#[error("Browser launch failed: {0}")]
	Launch(String),

	#[error("CDP connection failed: {0}")]
	Connection(String),

	#[error("Protocol error in {method}: {message}")]
	Protocol { method: String, message: String },

	#[error("Timed out after {ms}ms waiting for {condition}")]
	Timeout { ms: u64, condition: String },

	#[error("Element not found: {selector}")]
	ElementNotFound { selector: String },

	#[error("Option '{value}' not found in {selector}")]
	OptionNotFound { selector: String, value: String },

	#[error("Navigation to {url} failed: {reason}")]
	Navigation { url: String, reason: String },

	#[error("Script evaluation failed: {0}")]
	Evaluation(String),

	#[error("Connection closed before the browser answered")]
	ChannelClosed,

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl DriverError {
	pub fn is_timeout(&self) -> bool {
		matches!(self, DriverError::Timeout { .. })
	}

	/// Failures seen while the page swaps documents; the execution context
	/// a script ran in was torn down before it answered.
	pub fn is_transient(&self) -> bool {
		matches!(self, DriverError::Protocol { .. } | DriverError::Evaluation(_))
	}

	pub(crate) fn timeout(elapsed: std::time::Duration, condition: impl Into<String>) -> Self {
		DriverError::Timeout {
			ms: elapsed.as_millis() as u64,
			condition: condition.into(),
		}
	}
}

pub type Result<T> = std::result::Result<T, DriverError>;

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[test]
	fn timeout_reports_milliseconds_and_condition() {
		let err = DriverError::timeout(Duration::from_secs(2), "'#login' to be visible");
		assert!(err.is_timeout());
		assert_eq!(err.to_string(), "Timed out after 2000ms waiting for '#login' to be visible");
	}

	#[test]
	fn non_timeout_errors_are_not_timeouts() {
		let err = DriverError::ElementNotFound { selector: "#x".into() };
		assert!(!err.is_timeout());
		assert!(!err.is_transient());
	}

	#[test]
	fn destroyed_context_is_transient() {
		let err = DriverError::Evaluation("Execution context was destroyed.".into());
		assert!(err.is_transient());
		assert!(!err.is_timeout());
	}
}
