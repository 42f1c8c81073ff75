//! Browser discovery and `Target` domain payloads.

use serde::{Deserialize, Serialize};

/// `/json/version` response subset from Chrome DevTools Protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdpVersionInfo {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser", default)]
	pub browser: Option<String>,
}

/// Result of `Target.createTarget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetResult {
	pub target_id: String,
}

/// Result of `Target.attachToTarget` with `flatten: true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTargetResult {
	pub session_id: String,
}
