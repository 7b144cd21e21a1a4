use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::values::{AssetId, Price, Quantity, StrategyId, Timestamp};

/// Unique identifier for an order proposal
pub type ProposalId = Uuid;

/// Order side (Buy or Sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// An order a strategy wants to place, prior to risk validation.
///
/// The price is the reference price the proposal was sized against and is
/// what the validation gate uses for notional arithmetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderProposal {
    pub id: ProposalId,
    pub strategy_id: StrategyId,
    pub asset: AssetId,
    pub side: Side,
    pub quantity: Quantity,
    pub price: Price,
    pub created_at: Timestamp,
}

impl OrderProposal {
    /// Create a proposal with explicit timestamp
    pub fn new(
        strategy_id: impl Into<StrategyId>,
        asset: impl Into<AssetId>,
        side: Side,
        quantity: Quantity,
        price: Price,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy_id: strategy_id.into(),
            asset: asset.into(),
            side,
            quantity,
            price,
            created_at: timestamp,
        }
    }

    /// Notional value at the reference price (price * quantity)
    pub fn notional(&self) -> Quantity {
        self.price * self.quantity
    }
}

/// An execution against a previously approved proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub proposal_id: ProposalId,
    pub strategy_id: StrategyId,
    pub asset: AssetId,
    pub side: Side,
    pub quantity: Quantity,
    pub price: Price,
    pub timestamp: Timestamp,
}

impl Fill {
    /// Notional value of the execution (price * quantity)
    pub fn notional(&self) -> Quantity {
        self.price * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_proposal_notional() {
        let proposal = OrderProposal::new(
            "momentum-1",
            "BTC/USD",
            Side::Buy,
            dec!(0.5),
            dec!(50000),
            Utc::now(),
        );
        assert_eq!(proposal.notional(), dec!(25000.0));
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }
}
