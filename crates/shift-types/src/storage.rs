//! Storage namespaces used by the swap pipeline.

use std::str::FromStr;

/// Storage namespaces.
///
/// Keys are stored as `<namespace>:<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Idempotency ledger records, keyed by source transaction hash.
	Swaps,
	/// Settlement decisions, keyed by source transaction hash.
	Decisions,
}

impl StorageKey {
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Swaps => "swaps",
			StorageKey::Decisions => "decisions",
		}
	}

	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Swaps, Self::Decisions].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"swaps" => Ok(Self::Swaps),
			"decisions" => Ok(Self::Decisions),
			_ => Err(()),
		}
	}
}
