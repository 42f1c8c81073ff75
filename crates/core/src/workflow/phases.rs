//! The phases a standard run executes between opening and closing the session.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use super::context::{ContextSlot, WorkflowContext};
use crate::accounts;
use crate::config::Credentials;
use crate::error::Result;
use crate::export;
use crate::extract::{self, ExtractionMode};
use crate::model::{Payload, TimeRange};
use crate::session::Session;

/// One step of the workflow with declared inputs and outputs.
#[async_trait]
pub trait Phase: Send + Sync {
	fn name(&self) -> &'static str;

	/// Slots that must be filled before this phase runs.
	fn requires(&self) -> &'static [ContextSlot];

	/// Slots this phase fills when it succeeds.
	fn provides(&self) -> &'static [ContextSlot];

	async fn run(&self, session: &mut Session, context: &mut WorkflowContext) -> Result<()>;
}

/// Logs in and opens the transactions page.
pub struct LoginPhase {
	pub credentials: Credentials,
}

#[async_trait]
impl Phase for LoginPhase {
	fn name(&self) -> &'static str {
		"login"
	}

	fn requires(&self) -> &'static [ContextSlot] {
		&[]
	}

	fn provides(&self) -> &'static [ContextSlot] {
		&[ContextSlot::Authenticated]
	}

	async fn run(&self, session: &mut Session, _context: &mut WorkflowContext) -> Result<()> {
		session.login(&self.credentials).await?;
		session.open_transactions().await
	}
}

/// Discovers the portal's accounts and keeps the requested ones.
pub struct ResolveAccountsPhase {
	pub requested: Vec<String>,
}

#[async_trait]
impl Phase for ResolveAccountsPhase {
	fn name(&self) -> &'static str {
		"resolve-accounts"
	}

	fn requires(&self) -> &'static [ContextSlot] {
		&[ContextSlot::Authenticated]
	}

	fn provides(&self) -> &'static [ContextSlot] {
		&[ContextSlot::Accounts]
	}

	async fn run(&self, session: &mut Session, context: &mut WorkflowContext) -> Result<()> {
		context.discovered = accounts::discover(session).await?;
		context.selected = accounts::select(&self.requested, &context.discovered);

		if context.selected.is_empty() {
			warn!(target = "bankscrape.workflow", requested = ?self.requested, "no account matches the requested selectors");
		} else {
			let names: Vec<&str> = context.selected.iter().map(|a| a.name.as_str()).collect();
			info!(target = "bankscrape.workflow", selected = ?names, "accounts selected");
		}
		Ok(())
	}
}

/// Extracts and exports every selected account in order.
pub struct ExtractAccountsPhase {
	pub range: TimeRange,
	pub mode: ExtractionMode,
	pub balance: bool,
	pub output_dir: PathBuf,
}

#[async_trait]
impl Phase for ExtractAccountsPhase {
	fn name(&self) -> &'static str {
		"extract-accounts"
	}

	fn requires(&self) -> &'static [ContextSlot] {
		&[ContextSlot::Authenticated, ContextSlot::Accounts]
	}

	fn provides(&self) -> &'static [ContextSlot] {
		&[ContextSlot::Artifacts]
	}

	async fn run(&self, session: &mut Session, context: &mut WorkflowContext) -> Result<()> {
		let selected = context.selected.clone();
		for account in &selected {
			let staging = match self.mode {
				ExtractionMode::Download => Some(self.staging_dir()?),
				ExtractionMode::Rows => None,
			};
			let staging_path = staging.as_ref().map(|dir| dir.path());
			let result = extract::extract_account(session, account, &self.range, self.mode, self.balance, staging_path).await?;

			let path = match &result.payload {
				Payload::Rows(_) => export::write(&self.output_dir, &result)?,
				Payload::Download(file) => {
					if let Some(balance) = &result.balance {
						info!(target = "bankscrape.workflow", account = %account.name, %balance, "balance");
					}
					export::write_download(&self.output_dir, account, &self.range, file)?
				}
			};
			context.artifacts.push(path);
		}
		Ok(())
	}
}

impl ExtractAccountsPhase {
	/// Download staging lives under the output directory so the final move is a rename.
	fn staging_dir(&self) -> Result<tempfile::TempDir> {
		let create = || -> std::io::Result<tempfile::TempDir> {
			std::fs::create_dir_all(&self.output_dir)?;
			tempfile::Builder::new().prefix(".staging-").tempdir_in(&self.output_dir)
		};
		create().map_err(|e| crate::error::ScrapeError::export(&self.output_dir, e))
	}
}
