//! Per-account extraction pipeline.
//!
//! ```text
//! Selecting -> QueryBuilt -> Searching -> ResultsReady -> Done
//!                                      \-> Downloading  -/
//! ```
//!
//! Any non-terminal state may move to `Failed`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use driver::DriverError;
use tracing::{debug, info};

use crate::error::{Result, ScrapeError};
use crate::model::{Account, ExtractionResult, Payload, TimeRange};
use crate::query::{Query, build_query};
use crate::session::Session;

/// File suffixes browsers use while a download is still being written.
const PARTIAL_SUFFIXES: [&str; 3] = [".crdownload", ".part", ".tmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
	/// Read the result table.
	#[default]
	Rows,
	/// Trigger the portal's own export and keep the file.
	Download,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
	Selecting,
	QueryBuilt,
	Searching,
	ResultsReady,
	Downloading,
	Done,
	Failed,
}

impl ExtractionState {
	pub fn is_terminal(self) -> bool {
		matches!(self, ExtractionState::Done | ExtractionState::Failed)
	}

	pub fn can_advance_to(self, next: ExtractionState) -> bool {
		use ExtractionState::*;
		match (self, next) {
			(Selecting, QueryBuilt) | (QueryBuilt, Searching) => true,
			(Searching, ResultsReady) | (Searching, Downloading) => true,
			(ResultsReady, Done) | (Downloading, Done) => true,
			(from, Failed) => !from.is_terminal(),
			_ => false,
		}
	}
}

impl fmt::Display for ExtractionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// Tracks one account's progress and rejects out-of-order steps.
#[derive(Debug)]
pub struct Extraction {
	account: Account,
	state: ExtractionState,
}

impl Extraction {
	pub fn new(account: Account) -> Self {
		Self {
			account,
			state: ExtractionState::Selecting,
		}
	}

	pub fn state(&self) -> ExtractionState {
		self.state
	}

	pub fn account(&self) -> &Account {
		&self.account
	}

	pub fn advance(&mut self, next: ExtractionState) -> Result<()> {
		if !self.state.can_advance_to(next) {
			return Err(ScrapeError::extraction(
				&self.account.name,
				format!("illegal transition {} -> {}", self.state, next),
			));
		}
		debug!(target = "bankscrape.extract", account = %self.account.name, from = %self.state, to = %next, "state");
		self.state = next;
		Ok(())
	}
}

/// Submits `account` in the account selector and waits for its results to settle.
pub async fn select_account(session: &Session, account: &Account) -> Result<()> {
	session.ensure_authenticated("select an account")?;
	let selectors = &session.config().selectors;
	info!(target = "bankscrape.extract", account = %account.name, "selecting account");

	let fail = |e: DriverError| ScrapeError::extraction(&account.name, e);
	session
		.driver()
		.select_option(&selectors.account_select, &account.id)
		.await
		.map_err(fail)?;
	session.wait_idle().await.map_err(fail)?;
	session.wait_stable(&selectors.result_rows).await.map_err(fail)
}

/// Types the query dates, submits the search and waits for results to settle.
pub async fn apply_query(session: &Session, query: &Query) -> Result<()> {
	session.ensure_authenticated("run a query")?;
	let selectors = &session.config().selectors;
	let driver = session.driver();
	info!(target = "bankscrape.extract", kind = %query.kind, from = %query.from, to = %query.to, "searching");

	let fail = |e: DriverError| ScrapeError::Query(e.to_string());
	driver.fill(&query.fields.from, &query.from).await.map_err(fail)?;
	driver.fill(&query.fields.to, &query.to).await.map_err(fail)?;
	driver.click(&selectors.search_button).await.map_err(fail)?;
	session.wait_idle().await.map_err(fail)?;
	session.wait_stable(&selectors.result_rows).await.map_err(fail)
}

/// Reads every result row as trimmed cell text.
pub async fn extract_rows(session: &Session, account: &Account) -> Result<Vec<Vec<String>>> {
	let rows = session
		.driver()
		.rows(&session.config().selectors.result_rows)
		.await
		.map_err(|e| ScrapeError::extraction(&account.name, e))?;
	info!(target = "bankscrape.extract", account = %account.name, rows = rows.len(), "rows extracted");
	Ok(rows)
}

/// Triggers the portal export into `staging` and waits for the finished file.
pub async fn extract_file(session: &Session, account: &Account, staging: &Path) -> Result<PathBuf> {
	let driver = session.driver();
	let timing = &session.config().timing;
	let fail = |e: DriverError| ScrapeError::extraction(&account.name, e);

	driver.set_download_dir(staging).await.map_err(fail)?;
	driver.click(&session.config().selectors.export_link).await.map_err(fail)?;

	let file = wait_for_download(staging, timing.download_timeout(), timing.poll_interval())
		.await
		.map_err(|reason| ScrapeError::extraction(&account.name, reason))?;
	info!(target = "bankscrape.extract", account = %account.name, file = %file.display(), "download complete");
	Ok(file)
}

/// Reads the configured balance text node.
pub async fn get_balance(session: &Session, account: &Account) -> Result<String> {
	let selector = session
		.config()
		.selectors
		.balance
		.as_deref()
		.ok_or_else(|| ScrapeError::Configuration("no balance selector configured".to_string()))?;

	let text = session
		.driver()
		.text(selector)
		.await
		.map_err(|e| ScrapeError::extraction(&account.name, e))?;
	text.filter(|t| !t.is_empty())
		.ok_or_else(|| ScrapeError::extraction(&account.name, format!("balance '{}' not found", selector)))
}

/// Runs the whole pipeline for one account.
pub async fn extract_account(
	session: &Session,
	account: &Account,
	range: &TimeRange,
	mode: ExtractionMode,
	with_balance: bool,
	staging: Option<&Path>,
) -> Result<ExtractionResult> {
	let mut extraction = Extraction::new(account.clone());
	match run_steps(&mut extraction, session, range, mode, with_balance, staging).await {
		Ok(result) => Ok(result),
		Err(e) => {
			extraction.advance(ExtractionState::Failed)?;
			Err(e)
		}
	}
}

async fn run_steps(
	extraction: &mut Extraction,
	session: &Session,
	range: &TimeRange,
	mode: ExtractionMode,
	with_balance: bool,
	staging: Option<&Path>,
) -> Result<ExtractionResult> {
	let account = extraction.account().clone();

	select_account(session, &account).await?;
	let query = build_query(&session.config().query_fields, account.kind, range)?;
	extraction.advance(ExtractionState::QueryBuilt)?;

	extraction.advance(ExtractionState::Searching)?;
	apply_query(session, &query).await?;

	let payload = match mode {
		ExtractionMode::Rows => {
			extraction.advance(ExtractionState::ResultsReady)?;
			Payload::Rows(extract_rows(session, &account).await?)
		}
		ExtractionMode::Download => {
			extraction.advance(ExtractionState::Downloading)?;
			let staging = staging.ok_or_else(|| ScrapeError::Configuration("download mode needs a staging directory".to_string()))?;
			Payload::Download(extract_file(session, &account, staging).await?)
		}
	};
	let balance = if with_balance { Some(get_balance(session, &account).await?) } else { None };
	extraction.advance(ExtractionState::Done)?;

	Ok(ExtractionResult {
		account,
		range: *range,
		payload,
		balance,
	})
}

fn is_partial(path: &Path) -> bool {
	let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
	PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

fn completed_file(dir: &Path) -> std::io::Result<Option<(PathBuf, u64)>> {
	let mut found = None;
	for entry in std::fs::read_dir(dir)? {
		let entry = entry?;
		let path = entry.path();
		let metadata = entry.metadata()?;
		if metadata.is_file() && !is_partial(&path) {
			found = Some((path, metadata.len()));
			break;
		}
	}
	Ok(found)
}

/// Polls `dir` until a non-partial file keeps the same size across two polls.
pub async fn wait_for_download(dir: &Path, timeout: Duration, interval: Duration) -> std::result::Result<PathBuf, String> {
	let start = Instant::now();
	let mut last: Option<(PathBuf, u64)> = None;

	loop {
		let current = completed_file(dir).map_err(|e| format!("cannot read download directory {}: {}", dir.display(), e))?;
		if let (Some(current), Some(previous)) = (&current, &last) {
			if current == previous {
				return Ok(current.0.clone());
			}
		}
		if start.elapsed() >= timeout {
			return Err(format!("no completed download after {}ms", timeout.as_millis()));
		}
		last = current;
		tokio::time::sleep(interval).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn legal_transitions() {
		use ExtractionState::*;
		assert!(Selecting.can_advance_to(QueryBuilt));
		assert!(Searching.can_advance_to(Downloading));
		assert!(Downloading.can_advance_to(Done));
		assert!(QueryBuilt.can_advance_to(Failed));
		assert!(!Selecting.can_advance_to(Searching));
		assert!(!ResultsReady.can_advance_to(Downloading));
		assert!(!Done.can_advance_to(Failed));
		assert!(!Failed.can_advance_to(Failed));
	}

	#[test]
	fn illegal_transition_is_extraction_error() {
		let mut extraction = Extraction::new(Account::new("0", "Giro", crate::model::AccountType::Debit));
		let err = extraction.advance(ExtractionState::Done).unwrap_err();
		assert_eq!(err.code(), "EXTRACTION_FAILED");
		assert!(err.to_string().contains("Selecting -> Done"));
		assert_eq!(extraction.state(), ExtractionState::Selecting);
	}

	#[test]
	fn partial_downloads_are_ignored() {
		assert!(is_partial(Path::new("/tmp/x/umsaetze.csv.crdownload")));
		assert!(is_partial(Path::new("umsaetze.csv.part")));
		assert!(!is_partial(Path::new("umsaetze.csv")));
	}

	#[tokio::test]
	async fn download_wait_returns_stable_file() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("export.csv.crdownload"), b"partial").unwrap();
		std::fs::write(dir.path().join("export.csv"), b"a;b\n1;2\n").unwrap();

		let file = wait_for_download(dir.path(), Duration::from_secs(2), Duration::from_millis(5)).await.unwrap();
		assert_eq!(file, dir.path().join("export.csv"));
	}

	#[tokio::test]
	async fn download_wait_times_out_on_partial_only() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("export.csv.crdownload"), b"partial").unwrap();

		let err = wait_for_download(dir.path(), Duration::from_millis(30), Duration::from_millis(5))
			.await
			.unwrap_err();
		assert!(err.contains("no completed download"));
	}

	async fn balance_session(page: &driver::fake::FakePage) -> Session {
		let mut config = crate::config::PortalConfig::default();
		config.selectors.balance = Some("#saldo".to_string());
		Session::open(&page.launcher(), std::sync::Arc::new(config)).await.unwrap()
	}

	#[tokio::test]
	async fn balance_is_trimmed_text() {
		let page = driver::fake::FakePage::new().with_text("#saldo", "  1.234,56 EUR ");
		let session = balance_session(&page).await;
		let account = Account::new("0", "Giro", crate::model::AccountType::Debit);

		assert_eq!(get_balance(&session, &account).await.unwrap(), "1.234,56 EUR");
	}

	#[tokio::test]
	async fn missing_balance_node_is_extraction_error() {
		let page = driver::fake::FakePage::new();
		let session = balance_session(&page).await;
		let account = Account::new("0", "Giro", crate::model::AccountType::Debit);

		let err = get_balance(&session, &account).await.unwrap_err();
		assert_eq!(err.code(), "EXTRACTION_FAILED");
		assert!(err.to_string().contains("balance '#saldo' not found"));
	}
}
