use std::fmt;
use std::path::PathBuf;

use crate::model::Account;

/// A piece of run state that a phase produces or consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextSlot {
	/// Logged in and on the transactions page.
	Authenticated,
	/// Discovered and filtered accounts.
	Accounts,
	/// Paths of written export artifacts.
	Artifacts,
}

impl fmt::Display for ContextSlot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ContextSlot::Authenticated => write!(f, "authenticated"),
			ContextSlot::Accounts => write!(f, "accounts"),
			ContextSlot::Artifacts => write!(f, "artifacts"),
		}
	}
}

/// Mutable state of one run, threaded through every phase.
#[derive(Debug, Default)]
pub struct WorkflowContext {
	pub discovered: Vec<Account>,
	pub selected: Vec<Account>,
	pub artifacts: Vec<PathBuf>,
}
