//! String formatting helpers for hashes and addresses in logs.

/// Shortens an identifier for log output: the first 10 characters followed
/// by `..` (enough for `0x` plus eight hex digits).
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(10) {
		Some((idx, _)) => format!("{}..", &id[..idx]),
		None => id.to_string(),
	}
}
