//! `Page` domain payloads.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Result of `Page.navigate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateResult {
	pub frame_id: String,
	/// Absent for same-document navigations.
	#[serde(default)]
	pub loader_id: Option<String>,
	#[serde(default)]
	pub error_text: Option<String>,
}

/// Parameters of the `Page.lifecycleEvent` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
	pub frame_id: String,
	pub loader_id: String,
	/// `init`, `DOMContentLoaded`, `load`, `networkAlmostIdle`, `networkIdle`, ...
	pub name: String,
}

/// Result of `Page.captureScreenshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotData {
	/// Base64-encoded image bytes
	pub data: String,
}

impl ScreenshotData {
	pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
		STANDARD.decode(self.data.as_bytes())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn screenshot_data_decodes_base64() {
		let data = ScreenshotData {
			data: STANDARD.encode(b"\x89PNG"),
		};
		assert_eq!(data.decode().unwrap(), b"\x89PNG");
	}

	#[test]
	fn navigate_result_tolerates_missing_loader() {
		let result: NavigateResult = serde_json::from_str(r#"{"frameId": "F1"}"#).unwrap();
		assert!(result.loader_id.is_none());
		assert!(result.error_text.is_none());
	}

	#[test]
	fn lifecycle_event_uses_camel_case() {
		let event: LifecycleEvent =
			serde_json::from_str(r#"{"frameId": "F1", "loaderId": "L1", "name": "networkIdle", "timestamp": 1.5}"#).unwrap();
		assert_eq!(event.loader_id, "L1");
		assert_eq!(event.name, "networkIdle");
	}
}
