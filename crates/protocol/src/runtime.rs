//! `Runtime` domain payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mirror object referencing the result of an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
	#[serde(rename = "type")]
	pub kind: String,
	/// Present when the evaluation was requested with `returnByValue`.
	#[serde(default)]
	pub value: Option<Value>,
	#[serde(default)]
	pub description: Option<String>,
}

/// Details of an exception thrown during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
	pub text: String,
	#[serde(default)]
	pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
	/// Best human-readable message: the thrown object's description, else the summary text.
	pub fn message(&self) -> &str {
		self.exception
			.as_ref()
			.and_then(|exception| exception.description.as_deref())
			.unwrap_or(&self.text)
	}
}

/// Result of `Runtime.evaluate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
	pub result: RemoteObject,
	#[serde(default)]
	pub exception_details: Option<ExceptionDetails>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn evaluate_result_carries_value() {
		let json = r#"{"result": {"type": "number", "value": 3, "description": "3"}}"#;
		let result: EvaluateResult = serde_json::from_str(json).unwrap();
		assert_eq!(result.result.kind, "number");
		assert_eq!(result.result.value, Some(serde_json::json!(3)));
		assert!(result.exception_details.is_none());
	}

	#[test]
	fn exception_message_prefers_description() {
		let json = r#"{
  "result": {"type": "object", "subtype": "error"},
  "exceptionDetails": {
    "exceptionId": 1,
    "text": "Uncaught",
    "lineNumber": 0,
    "columnNumber": 7,
    "exception": {"type": "object", "description": "TypeError: x is not a function"}
  }
}"#;
		let result: EvaluateResult = serde_json::from_str(json).unwrap();
		let details = result.exception_details.unwrap();
		assert_eq!(details.message(), "TypeError: x is not a function");
	}
}
