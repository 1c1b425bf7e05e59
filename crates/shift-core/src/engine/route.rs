//! Per-route parameters derived from configuration.

use rust_decimal::Decimal;
use shift_config::{RouteConfig, SettlementConfig};
use shift_pricing::RoutePricing;
use shift_settlement::SettlementPolicy;
use shift_types::{AssetConfig, DepositExpectation, SourceId};

/// Everything the engine needs to run swaps on one route.
#[derive(Debug, Clone)]
pub struct Route {
	pub name: String,
	pub deposit: DepositExpectation,
	pub pricing: RoutePricing,
	pub settlement: SettlementPolicy,
	pub destination_chain_id: u64,
	pub payout_asset: AssetConfig,
}

impl Route {
	pub fn from_config(
		name: &str,
		route: &RouteConfig,
		settlement: &SettlementConfig,
		fee_rate: Decimal,
	) -> Self {
		Self {
			name: name.to_string(),
			deposit: DepositExpectation {
				chain_id: route.source_chain_id,
				deposit_address: route.deposit_address,
				asset: route.deposit_asset.clone(),
				strategies: route.effective_verification(),
			},
			pricing: RoutePricing {
				sources: route
					.price_sources
					.iter()
					.map(|name| SourceId::new(name.as_str()))
					.collect(),
				trim_fraction: route.effective_trim_fraction(),
				min_sources: route.min_sources,
			},
			settlement: SettlementPolicy::new(route.direction, fee_rate)
				.with_tolerance(settlement.tolerance_rate, route.tolerance_cap)
				.with_min_deposit(route.min_deposit),
			destination_chain_id: route.destination_chain_id,
			payout_asset: route.payout_asset.clone(),
		}
	}
}
