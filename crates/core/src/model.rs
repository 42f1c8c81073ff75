//! Accounts, time ranges and extraction results.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};

/// Text form of every date the portal accepts and the exporter writes.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Decides which pair of date fields a query uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
	Debit,
	Credit,
}

impl AccountType {
	pub const ALL: [AccountType; 2] = [AccountType::Debit, AccountType::Credit];
}

impl fmt::Display for AccountType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AccountType::Debit => write!(f, "debit"),
			AccountType::Credit => write!(f, "credit"),
		}
	}
}

/// One entry of the portal's account selector.
///
/// Two accounts are the same account when their identifiers match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
	/// Opaque value submitted to select the account.
	pub id: String,
	/// Label shown in the selector.
	pub name: String,
	#[serde(rename = "type")]
	pub kind: AccountType,
}

impl Account {
	pub fn new(id: impl Into<String>, name: impl Into<String>, kind: AccountType) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			kind,
		}
	}
}

impl PartialEq for Account {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for Account {}

impl Hash for Account {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

/// Inclusive date window with `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
	from: NaiveDate,
	to: NaiveDate,
}

impl TimeRange {
	pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
		if from > to {
			return Err(ScrapeError::Query(format!(
				"time range starts after it ends ({} > {})",
				from.format(DATE_FORMAT),
				to.format(DATE_FORMAT)
			)));
		}
		Ok(Self { from, to })
	}

	/// Parses two `DD.MM.YYYY` dates.
	pub fn parse(from: &str, to: &str) -> Result<Self> {
		Self::new(parse_date(from)?, parse_date(to)?)
	}

	pub fn from(&self) -> NaiveDate {
		self.from
	}

	pub fn to(&self) -> NaiveDate {
		self.to
	}

	pub fn from_text(&self) -> String {
		self.from.format(DATE_FORMAT).to_string()
	}

	pub fn to_text(&self) -> String {
		self.to.format(DATE_FORMAT).to_string()
	}
}

impl fmt::Display for TimeRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} - {}", self.from.format(DATE_FORMAT), self.to.format(DATE_FORMAT))
	}
}

fn parse_date(text: &str) -> Result<NaiveDate> {
	NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
		.map_err(|e| ScrapeError::Query(format!("invalid date '{}', expected DD.MM.YYYY: {}", text, e)))
}

/// What was pulled out of the portal for one account.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
	/// Result table rows as trimmed cell text, in page order.
	Rows(Vec<Vec<String>>),
	/// A completed portal export file in the staging directory.
	Download(PathBuf),
}

/// One account's extraction output for one time range.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
	pub account: Account,
	pub range: TimeRange,
	pub payload: Payload,
	pub balance: Option<String>,
}
