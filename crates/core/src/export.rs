//! Writes extraction results to disk.
//!
//! Layout: `<root>/<sanitized account name>/<from>_<to>.<ext>`. Paths depend
//! only on the sanitized name and the range, so re-running the same query
//! overwrites the previous artifact.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::{Result, ScrapeError};
use crate::model::{Account, AccountType, ExtractionResult, Payload, TimeRange};

const STRIPPED: &[char] = &['/', '\\', '&', ';', '$', '%', '@', '"', '<', '>', '(', ')', '+', ',', ' '];

const FALLBACK_DIR: &str = "account";

/// Removes characters that are unsafe or awkward in a directory name.
pub fn sanitize(name: &str) -> String {
	name.chars().filter(|c| !STRIPPED.contains(c)).collect()
}

/// Directory name for `account`: its sanitized name, else its sanitized id.
pub fn account_dir_name(account: &Account) -> String {
	[&account.name, &account.id]
		.into_iter()
		.map(|text| sanitize(text))
		.find(|sanitized| !sanitized.is_empty() && sanitized != "." && sanitized != "..")
		.unwrap_or_else(|| FALLBACK_DIR.to_string())
}

pub fn export_path(root: &Path, sanitized_name: &str, range: &TimeRange, extension: &str) -> PathBuf {
	root.join(sanitized_name)
		.join(format!("{}_{}.{}", range.from_text(), range.to_text(), extension))
}

#[derive(Serialize)]
struct AccountRecord<'a> {
	id: &'a str,
	name: &'a str,
	#[serde(rename = "type")]
	kind: AccountType,
}

#[derive(Serialize)]
struct RangeRecord {
	from: String,
	to: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument<'a> {
	account: AccountRecord<'a>,
	time_range: RangeRecord,
	#[serde(skip_serializing_if = "Option::is_none")]
	saldo: Option<&'a str>,
	transactions: &'a [Vec<String>],
}

/// Writes a row result as JSON, replacing any previous artifact atomically.
pub fn write(root: &Path, result: &ExtractionResult) -> Result<PathBuf> {
	let Payload::Rows(rows) = &result.payload else {
		return Err(ScrapeError::Configuration(
			"JSON export needs extracted rows; downloads go through write_download".to_string(),
		));
	};

	let path = export_path(root, &account_dir_name(&result.account), &result.range, "json");
	let document = ExportDocument {
		account: AccountRecord {
			id: &result.account.id,
			name: &result.account.name,
			kind: result.account.kind,
		},
		time_range: RangeRecord {
			from: result.range.from_text(),
			to: result.range.to_text(),
		},
		saldo: result.balance.as_deref(),
		transactions: rows,
	};
	let bytes = serde_json::to_vec_pretty(&document).map_err(|e| ScrapeError::export(&path, e.into()))?;

	persist(&path, &bytes)?;
	info!(target = "bankscrape.export", path = %path.display(), rows = rows.len(), "export written");
	Ok(path)
}

/// Moves a downloaded portal file next to where the JSON artifact would go.
pub fn write_download(root: &Path, account: &Account, range: &TimeRange, file: &Path) -> Result<PathBuf> {
	let extension = file
		.extension()
		.map(|ext| ext.to_string_lossy().into_owned())
		.unwrap_or_else(|| "bin".to_string());
	let path = export_path(root, &account_dir_name(account), range, &extension);
	let dir = parent_dir(&path)?;
	std::fs::create_dir_all(dir).map_err(|e| ScrapeError::export(dir, e))?;

	if std::fs::rename(file, &path).is_err() {
		// Staging may sit on another filesystem.
		let bytes = std::fs::read(file).map_err(|e| ScrapeError::export(file, e))?;
		persist(&path, &bytes)?;
		let _ = std::fs::remove_file(file);
	}
	info!(target = "bankscrape.export", path = %path.display(), "download stored");
	Ok(path)
}

fn parent_dir(path: &Path) -> Result<&Path> {
	path.parent()
		.ok_or_else(|| ScrapeError::export(path, std::io::Error::other("export path has no parent directory")))
}

fn persist(path: &Path, bytes: &[u8]) -> Result<()> {
	let dir = parent_dir(path)?;
	std::fs::create_dir_all(dir).map_err(|e| ScrapeError::export(dir, e))?;

	let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| ScrapeError::export(path, e))?;
	staged.write_all(bytes).map_err(|e| ScrapeError::export(path, e))?;
	staged.flush().map_err(|e| ScrapeError::export(path, e))?;
	staged.persist(path).map_err(|e| ScrapeError::export(path, e.error))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn range() -> TimeRange {
		TimeRange::parse("01.01.2024", "31.01.2024").unwrap()
	}

	fn result(account: Account, balance: Option<&str>) -> ExtractionResult {
		ExtractionResult {
			account,
			range: range(),
			payload: Payload::Rows(vec![vec!["02.01.2024".into(), "REWE".into(), "-12,34".into()]]),
			balance: balance.map(str::to_string),
		}
	}

	#[test]
	fn sanitize_strips_documented_characters() {
		assert_eq!(sanitize(r#"a/b\c&d;e$f%g@h"i<j>k(l)m+n,o p"#), "abcdefghijklmnop");
		assert_eq!(sanitize("DE12 3456 Girokonto"), "DE123456Girokonto");
		assert_eq!(sanitize("Kreditkarte-4567_x.y"), "Kreditkarte-4567_x.y");
	}

	#[test]
	fn directory_falls_back_to_id_then_constant() {
		assert_eq!(account_dir_name(&Account::new("acc-1", " / ", AccountType::Debit)), "acc-1");
		assert_eq!(account_dir_name(&Account::new("()", "", AccountType::Debit)), "account");
	}

	#[test]
	fn export_path_is_pure() {
		let root = Path::new("/out");
		let a = export_path(root, "Girokonto", &range(), "json");
		let b = export_path(root, "Girokonto", &range(), "json");
		assert_eq!(a, b);
		assert_eq!(a, Path::new("/out/Girokonto/01.01.2024_31.01.2024.json"));
	}

	#[test]
	fn writes_document_shape() {
		let dir = tempfile::tempdir().unwrap();
		let path = write(dir.path(), &result(Account::new("1", "4567 Kreditkarte", AccountType::Credit), Some("1.234,56 EUR"))).unwrap();
		assert_eq!(path, dir.path().join("4567Kreditkarte/01.01.2024_31.01.2024.json"));

		let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
		assert_eq!(json["account"]["id"], "1");
		assert_eq!(json["account"]["type"], "credit");
		assert_eq!(json["timeRange"]["from"], "01.01.2024");
		assert_eq!(json["saldo"], "1.234,56 EUR");
		assert_eq!(json["transactions"][0][1], "REWE");
	}

	#[test]
	fn rerun_overwrites_identically() {
		let dir = tempfile::tempdir().unwrap();
		let account = Account::new("0", "Girokonto", AccountType::Debit);
		let first = write(dir.path(), &result(account.clone(), None)).unwrap();
		let before = std::fs::read(&first).unwrap();
		let second = write(dir.path(), &result(account, None)).unwrap();

		assert_eq!(first, second);
		assert_eq!(before, std::fs::read(&second).unwrap());
		let json: serde_json::Value = serde_json::from_slice(&before).unwrap();
		assert!(json.get("saldo").is_none());
		assert_eq!(std::fs::read_dir(first.parent().unwrap()).unwrap().count(), 1);
	}

	#[test]
	fn download_keeps_extension() {
		let out = tempfile::tempdir().unwrap();
		let staging = tempfile::tempdir().unwrap();
		let file = staging.path().join("umsaetze.csv");
		std::fs::write(&file, "a;b\n").unwrap();

		let account = Account::new("0", "Girokonto", AccountType::Debit);
		let path = write_download(out.path(), &account, &range(), &file).unwrap();
		assert_eq!(path, out.path().join("Girokonto/01.01.2024_31.01.2024.csv"));
		assert_eq!(std::fs::read_to_string(&path).unwrap(), "a;b\n");
		assert!(!file.exists());
	}
}
