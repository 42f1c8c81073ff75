//! Browser executable discovery.

use std::path::{Path, PathBuf};

/// Resolves the browser binary to launch.
///
/// An `explicit` path wins when it exists; otherwise the platform's usual
/// Chromium-family install locations and `PATH` commands are tried in order.
pub fn find_chrome_executable(explicit: Option<&Path>) -> Option<PathBuf> {
	if let Some(path) = explicit {
		if path.exists() {
			return Some(path.to_path_buf());
		}
		return which::which(path).ok();
	}

	let candidates: Vec<String> = if cfg!(target_os = "macos") {
		vec![
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	} else if cfg!(target_os = "windows") {
		windows_browser_candidates()
	} else {
		vec![
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"brave-browser",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/google-chrome",
			"/usr/bin/chromium-browser",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
		.into_iter()
		.map(str::to_string)
		.collect()
	};

	candidates.into_iter().find_map(|candidate| resolve_candidate(&candidate))
}

fn resolve_candidate(candidate: &str) -> Option<PathBuf> {
	if candidate.starts_with('/') || candidate.contains('\\') || candidate.contains(':') {
		let path = PathBuf::from(candidate);
		return path.exists().then_some(path);
	}
	which::which(candidate).ok()
}

pub(crate) fn windows_browser_candidates() -> Vec<String> {
	let mut roots = Vec::new();
	for key in ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"] {
		if let Ok(value) = std::env::var(key) {
			roots.push(PathBuf::from(value));
		}
	}
	if roots.is_empty() {
		roots.push(PathBuf::from(r"C:\Program Files"));
		roots.push(PathBuf::from(r"C:\Program Files (x86)"));
	}

	let suffixes: &[&[&str]] = &[
		&["Google", "Chrome", "Application", "chrome.exe"],
		&["Microsoft", "Edge", "Application", "msedge.exe"],
		&["Chromium", "Application", "chrome.exe"],
	];

	let mut candidates: Vec<String> = roots
		.iter()
		.flat_map(|root| {
			suffixes
				.iter()
				.map(move |suffix| suffix.iter().fold(root.clone(), |path, part| path.join(part)))
		})
		.map(|path| path.to_string_lossy().to_string())
		.collect();

	candidates.extend(["chrome.exe", "msedge.exe", "chromium.exe"].map(str::to_string));
	candidates
}
