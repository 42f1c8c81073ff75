use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: our crates at the chosen level, everything else at `warn`.
pub fn default_directives(verbose: bool, trace: bool) -> String {
	let level = if trace {
		"trace"
	} else if verbose {
		"debug"
	} else {
		"info"
	};
	format!("warn,bankscrape={level},bankscrape_cli={level},driver={level}")
}

/// Installs the stderr subscriber. `RUST_LOG` takes precedence over the flags.
pub fn init_logging(verbose: bool, trace: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose, trace)));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(std::io::stderr().is_terminal())
		.init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flags_choose_level() {
		assert!(default_directives(false, false).contains("bankscrape=info"));
		assert!(default_directives(true, false).contains("driver=debug"));
		assert!(default_directives(true, true).contains("bankscrape=trace"));
		assert!(default_directives(false, false).starts_with("warn,"));
	}
}
