//! Loyalty coins

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Converts an order total into loyalty coins.
pub trait LoyaltyFormula: Send + Sync + std::fmt::Debug {
    fn coins_for(&self, total: Decimal) -> u64;
}

/// One coin for every `spend_per_coin` of total, rounded down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendPerCoin {
    spend_per_coin: Decimal,
}

impl SpendPerCoin {
    pub fn new(spend_per_coin: Decimal) -> Self { Self { spend_per_coin } }
}

impl Default for SpendPerCoin {
    fn default() -> Self { Self::new(Decimal::ONE_HUNDRED) }
}

impl LoyaltyFormula for SpendPerCoin {
    fn coins_for(&self, total: Decimal) -> u64 {
        if total <= Decimal::ZERO || self.spend_per_coin <= Decimal::ZERO { return 0; }
        (total / self.spend_per_coin).floor().to_u64().unwrap_or(0)
    }
}
