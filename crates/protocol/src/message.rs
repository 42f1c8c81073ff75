//! Request, response and event envelopes.
//!
//! CDP frames are JSON objects. A frame carrying an `id` answers a request;
//! a frame without one is an event. When flat target sessions are used,
//! both carry the `sessionId` of the attached page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command sent to the browser.
///
/// ```json
/// { "id": 7, "method": "Page.navigate", "params": { "url": "https://example.com" }, "sessionId": "5F3A..." }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
	/// Unique request ID for correlating responses
	pub id: u64,
	/// Domain-qualified method name
	pub method: String,
	/// Method parameters as JSON object
	#[serde(default)]
	pub params: Value,
	/// Target session the command is routed to, `None` for browser-level commands
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Reply to a [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
	/// Request ID this response correlates to
	pub id: u64,
	/// Success result (mutually exclusive with error)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Error result (mutually exclusive with result)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ResponseError>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Protocol error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

impl std::fmt::Display for ResponseError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match &self.data {
			Some(data) => write!(f, "{} ({}): {}", self.message, self.code, data),
			None => write!(f, "{} ({})", self.message, self.code),
		}
	}
}

/// Unsolicited notification emitted by the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

impl Event {
	/// Returns `true` when this event was emitted by `session_id`.
	pub fn is_from(&self, session_id: &str) -> bool {
		self.session_id.as_deref() == Some(session_id)
	}
}

/// Discriminated union of inbound frames.
///
/// Uses serde's `untagged` to distinguish based on presence of `id` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	Response(Response),
	Event(Event),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_omits_missing_session() {
		let request = Request {
			id: 3,
			method: "Browser.close".to_string(),
			params: serde_json::json!({}),
			session_id: None,
		};
		let encoded = serde_json::to_value(&request).unwrap();
		assert_eq!(encoded["id"], 3);
		assert!(encoded.get("sessionId").is_none());
	}

	#[test]
	fn frames_with_id_are_responses() {
		let json = r#"{"id": 42, "result": {"frameId": "F1"}, "sessionId": "S1"}"#;
		match serde_json::from_str::<Message>(json).unwrap() {
			Message::Response(response) => {
				assert_eq!(response.id, 42);
				assert_eq!(response.session_id.as_deref(), Some("S1"));
				assert!(response.error.is_none());
			}
			other => panic!("expected response, got {other:?}"),
		}
	}

	#[test]
	fn frames_without_id_are_events() {
		let json = r#"{"method": "Page.lifecycleEvent", "params": {"name": "load"}, "sessionId": "S1"}"#;
		match serde_json::from_str::<Message>(json).unwrap() {
			Message::Event(event) => {
				assert_eq!(event.method, "Page.lifecycleEvent");
				assert!(event.is_from("S1"));
				assert!(!event.is_from("S2"));
			}
			other => panic!("expected event, got {other:?}"),
		}
	}

	#[test]
	fn error_display_includes_data() {
		let error = ResponseError {
			code: -32000,
			message: "Cannot navigate".to_string(),
			data: Some("invalid URL".to_string()),
		};
		assert_eq!(error.to_string(), "Cannot navigate (-32000): invalid URL");
	}
}
