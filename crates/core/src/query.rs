//! Account-type-specific date queries.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};
use crate::model::{AccountType, TimeRange};

/// Selectors of the two date inputs a query fills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPair {
	pub from: String,
	pub to: String,
}

impl FieldPair {
	pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
		Self {
			from: from.into(),
			to: to.into(),
		}
	}
}

/// Which date inputs apply to which [`AccountType`].
///
/// Serialized as a JSON object keyed by `"debit"` / `"credit"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryFieldMapping(BTreeMap<AccountType, FieldPair>);

impl Default for QueryFieldMapping {
	fn default() -> Self {
		Self::empty()
			.with(
				AccountType::Debit,
				FieldPair::new("input[id$='_transactionDate']", "input[id$='_toTransactionDate']"),
			)
			.with(
				AccountType::Credit,
				FieldPair::new("input[id$='_postingDate']", "input[id$='_toPostingDate']"),
			)
	}
}

impl QueryFieldMapping {
	pub fn empty() -> Self {
		Self(BTreeMap::new())
	}

	pub fn with(mut self, kind: AccountType, fields: FieldPair) -> Self {
		self.0.insert(kind, fields);
		self
	}

	/// Fields for `kind`; an unmapped type is a configuration error.
	pub fn fields(&self, kind: AccountType) -> Result<&FieldPair> {
		self.0
			.get(&kind)
			.ok_or_else(|| ScrapeError::Configuration(format!("no query fields mapped for {} accounts", kind)))
	}

	/// Checks that every account type is mapped and no selector is used twice.
	pub fn validate(&self) -> Result<()> {
		let mut seen = HashSet::new();
		for kind in AccountType::ALL {
			let fields = self.fields(kind)?;
			for selector in [&fields.from, &fields.to] {
				if selector.trim().is_empty() {
					return Err(ScrapeError::Configuration(format!("empty query field selector for {} accounts", kind)));
				}
				if !seen.insert(selector.as_str()) {
					return Err(ScrapeError::Configuration(format!("query field selector '{}' is mapped more than once", selector)));
				}
			}
		}
		Ok(())
	}
}

/// A date query ready to be typed into the portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
	pub kind: AccountType,
	pub fields: FieldPair,
	pub from: String,
	pub to: String,
}

/// Resolves the date inputs for `kind` and renders `range` in portal form.
pub fn build_query(mapping: &QueryFieldMapping, kind: AccountType, range: &TimeRange) -> Result<Query> {
	let fields = mapping.fields(kind)?.clone();
	Ok(Query {
		kind,
		fields,
		from: range.from_text(),
		to: range.to_text(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn range() -> TimeRange {
		TimeRange::parse("01.03.2024", "31.03.2024").unwrap()
	}

	#[test]
	fn debit_and_credit_use_disjoint_fields() {
		let mapping = QueryFieldMapping::default();
		let debit = build_query(&mapping, AccountType::Debit, &range()).unwrap();
		let credit = build_query(&mapping, AccountType::Credit, &range()).unwrap();

		assert_eq!(debit.fields.from, "input[id$='_transactionDate']");
		assert_eq!(credit.fields.to, "input[id$='_toPostingDate']");
		for selector in [&debit.fields.from, &debit.fields.to] {
			assert_ne!(selector, &credit.fields.from);
			assert_ne!(selector, &credit.fields.to);
		}
		assert_eq!(debit.from, "01.03.2024");
		assert_eq!(debit.to, "31.03.2024");
	}

	#[test]
	fn unmapped_type_is_configuration_error() {
		let mapping = QueryFieldMapping::empty().with(AccountType::Debit, FieldPair::new("#a", "#b"));
		let err = build_query(&mapping, AccountType::Credit, &range()).unwrap_err();
		assert_eq!(err.code(), "CONFIGURATION_INVALID");
		assert!(mapping.validate().is_err());
	}

	#[test]
	fn overlapping_selectors_fail_validation() {
		let mapping = QueryFieldMapping::empty()
			.with(AccountType::Debit, FieldPair::new("#from", "#to"))
			.with(AccountType::Credit, FieldPair::new("#from", "#credit-to"));
		let err = mapping.validate().unwrap_err();
		assert!(err.to_string().contains("'#from'"));
	}

	#[test]
	fn default_mapping_is_valid() {
		QueryFieldMapping::default().validate().unwrap();
	}

	#[test]
	fn mapping_deserializes_from_lowercase_keys() {
		let json = r##"{"debit": {"from": "#d1", "to": "#d2"}, "credit": {"from": "#c1", "to": "#c2"}}"##;
		let mapping: QueryFieldMapping = serde_json::from_str(json).unwrap();
		mapping.validate().unwrap();
		assert_eq!(mapping.fields(AccountType::Credit).unwrap().from, "#c1");
	}
}
