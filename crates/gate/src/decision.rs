use proteus_core::{OrderProposal, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for an exposure reservation
pub type ReservationId = Uuid;

/// Why the gate refused a proposal.
///
/// Limit rejections carry the configured limit and the value acceptance
/// would have produced, never a generic denial.
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    #[error("gate is not accepting new proposals")]
    NotAccepting,

    #[error("emergency stop active: {reason}")]
    EmergencyStopped { reason: String },

    #[error("strategy {strategy_id} is halted: {reason}")]
    StrategyHalted {
        strategy_id: String,
        reason: String,
    },

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("quantity {requested} exceeds live max position size {limit}")]
    PositionSize {
        requested: Decimal,
        limit: Decimal,
    },

    #[error("portfolio exposure would reach {measured:.4} of equity, limit {limit:.4}")]
    PortfolioExposure { measured: f64, limit: f64 },

    #[error("{asset} exposure would reach {measured:.4} of equity, limit {limit:.4}")]
    Concentration {
        asset: String,
        measured: f64,
        limit: f64,
    },

    #[error("correlation {measured:.4} with live strategies exceeds limit {limit:.4}")]
    Correlation { measured: f64, limit: f64 },
}

/// A proposal that passed every check, carrying its exposure reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedOrder {
    pub reservation_id: ReservationId,
    pub proposal: OrderProposal,
    pub approved_at: Timestamp,
}

/// Outcome of a validation. Binding and final for the proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decision {
    Approved(ApprovedOrder),
    Rejected(RejectReason),
}

impl Decision {
    pub fn is_approved(&self) -> bool {
        matches!(self, Decision::Approved(_))
    }

    pub fn approved(&self) -> Option<&ApprovedOrder> {
        match self {
            Decision::Approved(order) => Some(order),
            Decision::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&RejectReason> {
        match self {
            Decision::Approved(_) => None,
            Decision::Rejected(reason) => Some(reason),
        }
    }
}
