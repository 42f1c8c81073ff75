use anyhow::{Context, Result};
use bankscrape::{ExtractionMode, ScrapeRequest, TimeRange, Workflow};
use driver::ChromiumLauncher;
use tracing::info;

use crate::cli::{Commands, ScrapeArgs};
use crate::config;

/// Runs `command` and returns the process exit code.
pub async fn dispatch(command: Commands) -> Result<i32> {
	match command {
		Commands::Scrape(args) => scrape(args).await,
	}
}

async fn scrape(args: ScrapeArgs) -> Result<i32> {
	let range = TimeRange::parse(&args.from, &args.to).context("invalid --from/--to")?;

	config::load_dotenv();
	let mut portal = config::portal_config(args.portal_config.as_deref(), config::env_var(config::BANK_BASE_URL))?;
	if args.interactive {
		portal.browser.headless = false;
	}
	let credentials = config::credentials_from(config::env_var)?;

	let mut launcher = ChromiumLauncher::new();
	if let Some(path) = config::chrome_path(args.chrome, config::env_var) {
		launcher = launcher.with_executable(path);
	}

	let request = ScrapeRequest {
		accounts: args.accounts,
		range,
		mode: if args.download {
			ExtractionMode::Download
		} else {
			ExtractionMode::Rows
		},
		balance: args.balance,
		output_dir: args.output_folder,
		screenshot_dir: args.screenshot_dir,
	};
	info!(target = "bankscrape", accounts = ?request.accounts, %range, "starting run");

	let report = Workflow::new(portal, credentials, request).run(&launcher).await;
	for artifact in &report.artifacts {
		info!(target = "bankscrape", path = %artifact.display(), "artifact");
	}
	Ok(report.exit_code())
}
