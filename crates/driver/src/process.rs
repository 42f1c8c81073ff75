//! Port selection helpers for launched browsers.

/// First port tried for remote debugging.
pub const DEFAULT_DEBUG_PORT: u16 = 9333;

const PORT_SCAN_WIDTH: u16 = 64;

/// Returns `true` when `port` can be bound on localhost.
pub fn port_available(port: u16) -> bool {
	std::net::TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// Picks a bindable debugging port at or after `preferred`.
///
/// Falls back to an OS-assigned ephemeral port when the scanned range is busy.
pub fn pick_debug_port(preferred: u16) -> Option<u16> {
	let end = preferred.saturating_add(PORT_SCAN_WIDTH);
	if let Some(port) = (preferred..end).find(|port| port_available(*port)) {
		return Some(port);
	}

	std::net::TcpListener::bind(("127.0.0.1", 0))
		.and_then(|listener| listener.local_addr())
		.map(|addr| addr.port())
		.ok()
}
