//! Registry trait for self-registering implementations.
//!
//! Pluggable components (price sources, storage backends) expose a `Registry`
//! struct so the builder can map a configuration name to a factory function.

/// Base trait for implementation registries.
///
/// Each implementation module provides a `Registry` struct implementing this
/// trait, declaring the name used in configuration and the factory that
/// builds it.
pub trait ImplementationRegistry {
	/// The name used in configuration files to select this implementation.
	///
	/// For example `"coingecko"` for `[pricing.sources.x] kind = "coingecko"`
	/// or `"file"` for `[storage.implementations.file]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Returns the factory function for this implementation.
	fn factory() -> Self::Factory;
}
