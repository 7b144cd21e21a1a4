use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Price value - uses Decimal for precision
pub type Price = Decimal;

/// Quantity value - uses Decimal for precision
pub type Quantity = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Identifier for a tradeable asset (e.g. "BTC/USD")
pub type AssetId = String;

/// Identifier for a registered strategy
pub type StrategyId = String;
