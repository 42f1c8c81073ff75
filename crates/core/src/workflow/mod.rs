//! Run orchestration.
//!
//! A run is `open session -> phases -> logout -> close`. The phases in the
//! middle are typed [`Phase`] objects; the bracketing steps live in
//! [`Workflow::run`] so that logout and cleanup happen exactly once whatever
//! the phases do.

mod context;
mod phases;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use driver::Launcher;
use tracing::{error, info, warn};

pub use context::{ContextSlot, WorkflowContext};
pub use phases::{ExtractAccountsPhase, LoginPhase, Phase, ResolveAccountsPhase};

use crate::config::{Credentials, PortalConfig};
use crate::diagnostics::{Checkpoint, Diagnostics};
use crate::error::{Result, ScrapeError};
use crate::extract::ExtractionMode;
use crate::model::TimeRange;
use crate::session::Session;

/// What the caller asked for.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
	/// `["all"]` or name substrings.
	pub accounts: Vec<String>,
	pub range: TimeRange,
	pub mode: ExtractionMode,
	pub balance: bool,
	pub output_dir: PathBuf,
	pub screenshot_dir: PathBuf,
}

/// Outcome of [`Workflow::run`].
#[derive(Debug)]
pub struct RunReport {
	/// Artifacts written before the run ended, in order.
	pub artifacts: Vec<PathBuf>,
	pub error: Option<ScrapeError>,
	pub logged_out: bool,
}

impl RunReport {
	fn failed(error: ScrapeError) -> Self {
		Self {
			artifacts: Vec::new(),
			error: Some(error),
			logged_out: false,
		}
	}

	pub fn is_success(&self) -> bool {
		self.error.is_none()
	}

	pub fn exit_code(&self) -> i32 {
		if self.is_success() { 0 } else { 1 }
	}
}

/// Checks that every phase's inputs are provided by an earlier phase.
pub fn validate_plan(phases: &[Box<dyn Phase>]) -> Result<()> {
	let mut provided: HashSet<ContextSlot> = HashSet::new();
	for phase in phases {
		if let Some(missing) = phase.requires().iter().find(|slot| !provided.contains(*slot)) {
			return Err(ScrapeError::Configuration(format!(
				"phase '{}' requires {} which no earlier phase provides",
				phase.name(),
				missing
			)));
		}
		provided.extend(phase.provides().iter().copied());
	}
	Ok(())
}

pub struct Workflow {
	config: Arc<PortalConfig>,
	request: ScrapeRequest,
	phases: Vec<Box<dyn Phase>>,
}

impl Workflow {
	/// Builds the standard `login -> resolve-accounts -> extract-accounts` run.
	pub fn new(config: PortalConfig, credentials: Credentials, request: ScrapeRequest) -> Self {
		let phases: Vec<Box<dyn Phase>> = vec![
			Box::new(LoginPhase { credentials }),
			Box::new(ResolveAccountsPhase {
				requested: request.accounts.clone(),
			}),
			Box::new(ExtractAccountsPhase {
				range: request.range,
				mode: request.mode,
				balance: request.balance,
				output_dir: request.output_dir.clone(),
			}),
		];
		Self::with_phases(config, request, phases)
	}

	pub fn with_phases(config: PortalConfig, request: ScrapeRequest, phases: Vec<Box<dyn Phase>>) -> Self {
		Self {
			config: Arc::new(config),
			request,
			phases,
		}
	}

	fn preflight(&self) -> Result<()> {
		validate_plan(&self.phases)?;
		self.config.validate()?;
		if self.request.balance && self.config.selectors.balance.is_none() {
			return Err(ScrapeError::Configuration(
				"--balance needs a balance selector in the portal configuration".to_string(),
			));
		}
		Ok(())
	}

	/// Executes the run. Never panics on portal failures; inspect the report.
	pub async fn run(&self, launcher: &dyn Launcher) -> RunReport {
		if let Err(e) = self.preflight() {
			error!(target = "bankscrape.workflow", code = e.code(), error = %e, "run rejected");
			return RunReport::failed(e);
		}

		let mut session = match Session::open(launcher, Arc::clone(&self.config)).await {
			Ok(session) => session,
			Err(e) => {
				error!(target = "bankscrape.workflow", code = e.code(), error = %e, "session did not start");
				return RunReport::failed(e);
			}
		};

		let diagnostics = Diagnostics::new(&self.request.screenshot_dir);
		diagnostics.capture(session.driver(), Checkpoint::BeforeLogin).await;

		let mut context = WorkflowContext::default();
		let outcome = self.run_phases(&mut session, &mut context).await;
		if let Err(e) = &outcome {
			error!(target = "bankscrape.workflow", code = e.code(), error = %e, "run failed");
			diagnostics.capture(session.driver(), Checkpoint::Error).await;
		}

		let mut logged_out = false;
		if session.login_attempted() {
			match session.logout().await {
				Ok(()) => {
					logged_out = true;
					diagnostics.capture(session.driver(), Checkpoint::AfterLogout).await;
				}
				Err(e) => warn!(target = "bankscrape.workflow", code = e.code(), error = %e, "logout failed"),
			}
		}

		if let Err(e) = session.close().await {
			warn!(target = "bankscrape.workflow", error = %e, "closing the browser failed");
		}

		info!(
			target = "bankscrape.workflow",
			artifacts = context.artifacts.len(),
			success = outcome.is_ok(),
			"run finished"
		);
		RunReport {
			artifacts: context.artifacts,
			error: outcome.err(),
			logged_out,
		}
	}

	async fn run_phases(&self, session: &mut Session, context: &mut WorkflowContext) -> Result<()> {
		for phase in &self.phases {
			info!(target = "bankscrape.workflow", phase = phase.name(), "phase started");
			phase.run(session, context).await?;
		}
		Ok(())
	}
}
