//! Common types module for the shift settlement backend.
//!
//! This crate defines the data model shared by every component of the swap
//! pipeline: prices and consensus results, verified deposits, settlement
//! decisions, payout receipts, and the HTTP wire types. Keeping them in one
//! place lets the pricing, deposit, settlement and delivery crates agree on
//! a single vocabulary without depending on each other.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Payout transaction types.
pub mod delivery;
/// Deposit verification types, including the plain chain data seen by verifiers.
pub mod deposit;
/// Network and asset configuration types.
pub mod networks;
/// Price, quote and consensus types.
pub mod price;
/// Trait implemented by every pluggable implementation registry.
pub mod registry;
/// Secure string handling for keys and API tokens.
pub mod secret_string;
/// Settlement direction and decision types.
pub mod settlement;
/// Storage namespaces.
pub mod storage;
/// Utility functions for formatting and unit conversion.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use api::*;
pub use delivery::*;
pub use deposit::*;
pub use networks::{deserialize_networks, AssetConfig, NetworkConfig, NetworksConfig};
pub use price::*;
pub use registry::ImplementationRegistry;
pub use rust_decimal::Decimal;
pub use secret_string::SecretString;
pub use settlement::*;
pub use storage::*;
pub use utils::{
	current_timestamp, format_units, parse_decimal, parse_units, truncate_id, UnitsError,
};
pub use validation::*;
