//! Proteus Order Validation Gate
//!
//! The single choke point between a strategy's decision and a live
//! order. Every proposal passes through [`OrderGate::validate`], which
//! runs the checks in a fixed order and short-circuits on the first
//! failure:
//!
//! 1. gate accepting, no emergency stop, strategy not halted
//! 2. quantity within the strategy's live `max_position_size`
//! 3. resulting portfolio exposure within the exposure limit
//! 4. resulting per-asset concentration within the concentration limit
//! 5. correlation with live strategies within the correlation limit
//!
//! Exposure and concentration are check-then-reserve: the resulting
//! values count open reservations, and the reservation for an approved
//! order is taken under the same ledger lock, so two concurrent
//! proposals can never both pass a limit only one fits under.
//! Reservations are settled on fill and released on cancel or expiry.
//!
//! A decision is final for its proposal; a changed mind requires a new
//! proposal. Rejections always carry the specific limit and the value
//! the order would have produced.

mod config;
mod decision;
mod gate;
mod ledger;

pub use config::GateConfig;
pub use decision::{ApprovedOrder, Decision, RejectReason, ReservationId};
pub use gate::OrderGate;
pub use ledger::{Reservation, ReservationLedger};
