//! Account discovery, classification and selection.

use driver::ElementState;
use tracing::{debug, info};

use crate::error::{Result, ScrapeError};
use crate::model::{Account, AccountType};
use crate::session::Session;

/// Selector value that keeps every discovered account.
pub const ALL_ACCOUNTS: &str = "all";

/// `Credit` iff `label` contains `marker`.
pub fn classify(label: &str, marker: &str) -> AccountType {
	if label.contains(marker) {
		AccountType::Credit
	} else {
		AccountType::Debit
	}
}

/// Reads the account selector in UI order.
pub async fn discover(session: &Session) -> Result<Vec<Account>> {
	session.ensure_authenticated("discover accounts")?;
	let config = session.config();
	let select = &config.selectors.account_select;

	session
		.driver()
		.wait_for(select, ElementState::Visible)
		.await
		.map_err(ScrapeError::Discovery)?;
	let options = session.driver().select_options(select).await.map_err(ScrapeError::Discovery)?;

	let accounts: Vec<Account> = options
		.into_iter()
		.map(|option| {
			let kind = classify(&option.label, &config.credit_card_marker);
			Account::new(option.value, option.label, kind)
		})
		.collect();

	for account in &accounts {
		debug!(target = "bankscrape.accounts", id = %account.id, name = %account.name, kind = %account.kind, "discovered");
	}
	info!(target = "bankscrape.accounts", count = accounts.len(), "accounts discovered");
	Ok(accounts)
}

/// Filters `discovered` by the caller's selectors.
///
/// `["all"]` keeps everything. Otherwise an account is kept when its name
/// contains any selector (case-sensitive); order follows `discovered`.
pub fn select(requested: &[String], discovered: &[Account]) -> Vec<Account> {
	if matches!(requested, [only] if only == ALL_ACCOUNTS) {
		return discovered.to_vec();
	}

	let mut selected: Vec<Account> = Vec::new();
	for account in discovered {
		let wanted = requested.iter().any(|selector| account.name.contains(selector.as_str()));
		if wanted && !selected.contains(account) {
			selected.push(account.clone());
		}
	}
	selected
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use driver::SelectOption;
	use driver::fake::{ClickEffect, FakePage};

	use super::*;
	use crate::config::{Credentials, PortalConfig};

	fn accounts() -> Vec<Account> {
		vec![
			Account::new("0", "DE12 1234 Girokonto", AccountType::Debit),
			Account::new("1", "4567 Kreditkarte", AccountType::Credit),
			Account::new("2", "DE99 9999 Tagesgeld", AccountType::Debit),
		]
	}

	fn requested(selectors: &[&str]) -> Vec<String> {
		selectors.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn classify_uses_marker_substring() {
		assert_eq!(classify("1234******5678 Kreditkarte", "Kreditkarte"), AccountType::Credit);
		assert_eq!(classify("DE12 Girokonto", "Kreditkarte"), AccountType::Debit);
		assert_eq!(classify("kreditkarte", "Kreditkarte"), AccountType::Debit);
	}

	#[test]
	fn all_keeps_discovered_accounts() {
		assert_eq!(select(&requested(&["all"]), &accounts()), accounts());
	}

	#[test]
	fn selectors_filter_in_discovered_order_without_duplicates() {
		let selected = select(&requested(&["Tagesgeld", "DE", "4567"]), &accounts());
		let ids: Vec<&str> = selected.iter().map(|a| a.id.as_str()).collect();
		assert_eq!(ids, ["0", "1", "2"]);

		let selected = select(&requested(&["4567"]), &accounts());
		assert_eq!(selected.len(), 1);
		assert_eq!(selected[0].kind, AccountType::Credit);
	}

	#[test]
	fn selection_is_case_sensitive_and_may_be_empty() {
		assert!(select(&requested(&["girokonto"]), &accounts()).is_empty());
		assert!(select(&requested(&["Giro"]), &[]).is_empty());
	}

	#[test]
	fn all_among_other_selectors_is_a_substring() {
		let selected = select(&requested(&["all", "Giro"]), &accounts());
		assert_eq!(selected.len(), 1);
	}

	#[tokio::test]
	async fn discover_classifies_options() {
		let page = FakePage::new()
			.with_visible("#loginInputSelector")
			.with_visible("#pinInputSelector")
			.on_click("#buttonlogin", ClickEffect::navigate().showing("#logout"))
			.with_visible("select[id$='_slAllAccounts']")
			.with_options(
				"select[id$='_slAllAccounts']",
				vec![SelectOption::new("0", "DE12 Girokonto"), SelectOption::new("1", "4567 Kreditkarte")],
			);
		let mut session = Session::open(&page.launcher(), Arc::new(PortalConfig::default())).await.unwrap();
		session.login(&Credentials::new("max", "4711")).await.unwrap();

		let discovered = discover(&session).await.unwrap();
		assert_eq!(discovered.len(), 2);
		assert_eq!(discovered[0].kind, AccountType::Debit);
		assert_eq!(discovered[1].kind, AccountType::Credit);
		assert_eq!(discovered[1].name, "4567 Kreditkarte");
	}
}
