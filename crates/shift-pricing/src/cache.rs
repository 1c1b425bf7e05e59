//! Last-known-good price cache.

use dashmap::DashMap;
use shift_types::{Price, SourceId};

/// Most recent successful price per source.
///
/// Shared by handle across concurrent fetches. Writes replace the whole
/// entry for a source and the last write wins. Entries are never evicted.
#[derive(Debug, Default)]
pub struct SourceCache {
	entries: DashMap<SourceId, Price>,
}

impl SourceCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, source: &SourceId) -> Option<Price> {
		self.entries.get(source).map(|entry| entry.value().clone())
	}

	pub fn store(&self, price: Price) {
		self.entries.insert(price.source.clone(), price);
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rust_decimal_macros::dec;

	#[test]
	fn test_last_write_wins() {
		let cache = SourceCache::new();
		let source = SourceId::from("binance");
		assert!(cache.get(&source).is_none());

		cache.store(Price::new(source.clone(), dec!(0.41), 100));
		cache.store(Price::new(source.clone(), dec!(0.43), 200));

		let cached = cache.get(&source).unwrap();
		assert_eq!(cached.value, dec!(0.43));
		assert_eq!(cached.fetched_at, 200);
		assert_eq!(cache.len(), 1);
	}
}
