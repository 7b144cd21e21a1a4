use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::orders::Side;
use crate::values::{AssetId, Price, Quantity, Timestamp};

/// Net position in one asset with weighted-average entry accounting.
///
/// Quantity is signed: positive long, negative short. Realized PnL is
/// attributed when a fill reduces or flips the position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyPosition {
    pub asset: AssetId,
    pub quantity: Quantity,
    pub avg_entry_price: Price,
    pub last_mark: Option<Price>,
    pub opened_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
}

/// Outcome of applying one fill to a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillApplication {
    pub realized_pnl: Decimal,
    pub closed_quantity: Decimal,
    /// Average entry price of the quantity that was closed
    pub entry_price: Decimal,
}

impl FillApplication {
    fn open_only() -> Self {
        Self {
            realized_pnl: Decimal::ZERO,
            closed_quantity: Decimal::ZERO,
            entry_price: Decimal::ZERO,
        }
    }
}

impl StrategyPosition {
    pub fn new(asset: impl Into<AssetId>) -> Self {
        Self {
            asset: asset.into(),
            quantity: Decimal::ZERO,
            avg_entry_price: Decimal::ZERO,
            last_mark: None,
            opened_at: None,
            updated_at: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Apply a fill, returning any realized PnL.
    ///
    /// Adding in the same direction reprices the weighted-average entry;
    /// an opposing fill closes quantity at the entry average first, and a
    /// flip restarts the position at the fill price.
    pub fn apply_fill(
        &mut self,
        side: Side,
        quantity: Quantity,
        price: Price,
        at: Timestamp,
    ) -> FillApplication {
        let signed = match side {
            Side::Buy => quantity,
            Side::Sell => -quantity,
        };
        self.updated_at = Some(at);

        if self.quantity.is_zero() {
            self.quantity = signed;
            self.avg_entry_price = price;
            self.opened_at = Some(at);
            return FillApplication::open_only();
        }

        let was_long = self.quantity > Decimal::ZERO;
        let same_direction = was_long == (signed > Decimal::ZERO);
        if same_direction {
            let total = self.quantity.abs() + quantity;
            self.avg_entry_price =
                (self.avg_entry_price * self.quantity.abs() + price * quantity) / total;
            self.quantity += signed;
            return FillApplication::open_only();
        }

        let closed_quantity = self.quantity.abs().min(quantity);
        let entry_price = self.avg_entry_price;
        let realized_pnl = if was_long {
            closed_quantity * (price - entry_price)
        } else {
            closed_quantity * (entry_price - price)
        };

        self.quantity += signed;
        if self.quantity.is_zero() {
            self.avg_entry_price = Decimal::ZERO;
            self.opened_at = None;
        } else if (self.quantity > Decimal::ZERO) != was_long {
            // flipped through flat: the remainder opens at the fill price
            self.avg_entry_price = price;
            self.opened_at = Some(at);
        }

        FillApplication {
            realized_pnl,
            closed_quantity,
            entry_price,
        }
    }

    pub fn mark(&mut self, price: Price, at: Timestamp) {
        self.last_mark = Some(price);
        self.updated_at = Some(at);
    }

    /// Unrealized PnL against the last mark, zero when flat or unmarked
    pub fn unrealized_pnl(&self) -> Decimal {
        match self.last_mark {
            Some(mark) if !self.quantity.is_zero() => {
                self.quantity * (mark - self.avg_entry_price)
            }
            _ => Decimal::ZERO,
        }
    }

    /// Unrealized PnL against an explicit mark price
    pub fn unrealized_at(&self, mark: Price) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.quantity * (mark - self.avg_entry_price)
        }
    }

    /// Absolute notional at a reference price
    pub fn notional(&self, reference: Price) -> Decimal {
        (self.quantity * reference).abs()
    }
}
