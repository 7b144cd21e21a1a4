use std::collections::HashMap;

use proteus_core::{AssetId, ProposalId, StrategyId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decision::ReservationId;

/// Exposure held for an approved proposal until its fill or release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub proposal_id: ProposalId,
    pub strategy_id: StrategyId,
    pub asset: AssetId,
    /// Absolute notional at the proposal's reference price
    pub notional: Decimal,
    pub reserved_at: Timestamp,
}

/// Open reservations, indexed by reservation id and by proposal id.
///
/// Carries no synchronization of its own; the gate holds it behind a
/// mutex so a limit check and the reservation it admits form one atomic
/// step.
#[derive(Debug, Default)]
pub struct ReservationLedger {
    open: HashMap<ReservationId, Reservation>,
    by_proposal: HashMap<ProposalId, ReservationId>,
}

impl ReservationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, reservation: Reservation) {
        self.by_proposal
            .insert(reservation.proposal_id, reservation.id);
        self.open.insert(reservation.id, reservation);
    }

    /// Total notional held across all open reservations.
    pub fn total_notional(&self) -> Decimal {
        self.open.values().map(|r| r.notional).sum()
    }

    /// Notional held against one asset.
    pub fn asset_notional(&self, asset: &str) -> Decimal {
        self.open
            .values()
            .filter(|r| r.asset == asset)
            .map(|r| r.notional)
            .sum()
    }

    pub fn get(&self, id: ReservationId) -> Option<&Reservation> {
        self.open.get(&id)
    }

    pub fn release(&mut self, id: ReservationId) -> Option<Reservation> {
        let reservation = self.open.remove(&id)?;
        self.by_proposal.remove(&reservation.proposal_id);
        Some(reservation)
    }

    pub fn release_proposal(&mut self, proposal_id: ProposalId) -> Option<Reservation> {
        let id = self.by_proposal.get(&proposal_id).copied()?;
        self.release(id)
    }

    /// Removes and returns every reservation taken strictly before
    /// `cutoff`.
    pub fn drain_older_than(&mut self, cutoff: Timestamp) -> Vec<Reservation> {
        let stale: Vec<ReservationId> = self
            .open
            .values()
            .filter(|r| r.reserved_at < cutoff)
            .map(|r| r.id)
            .collect();
        stale.into_iter().filter_map(|id| self.release(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn reservation(asset: &str, notional: Decimal, at: Timestamp) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            proposal_id: Uuid::new_v4(),
            strategy_id: "alpha".to_string(),
            asset: asset.to_string(),
            notional,
            reserved_at: at,
        }
    }

    #[test]
    fn test_totals_by_asset_and_overall() {
        let mut ledger = ReservationLedger::new();
        ledger.reserve(reservation("BTC/USD", dec!(1000), t0()));
        ledger.reserve(reservation("BTC/USD", dec!(250), t0()));
        ledger.reserve(reservation("ETH/USD", dec!(500), t0()));

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.total_notional(), dec!(1750));
        assert_eq!(ledger.asset_notional("BTC/USD"), dec!(1250));
        assert_eq!(ledger.asset_notional("ETH/USD"), dec!(500));
        assert_eq!(ledger.asset_notional("SOL/USD"), Decimal::ZERO);
    }

    #[test]
    fn test_release_by_id_and_by_proposal() {
        let mut ledger = ReservationLedger::new();
        let first = reservation("BTC/USD", dec!(1000), t0());
        let second = reservation("BTC/USD", dec!(400), t0());
        let first_id = first.id;
        let second_proposal = second.proposal_id;
        ledger.reserve(first);
        ledger.reserve(second);

        let released = ledger.release(first_id).unwrap();
        assert_eq!(released.notional, dec!(1000));
        assert!(ledger.release(first_id).is_none());
        // the proposal index is cleaned up with the reservation
        assert!(ledger.release_proposal(released.proposal_id).is_none());

        let settled = ledger.release_proposal(second_proposal).unwrap();
        assert_eq!(settled.notional, dec!(400));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_drain_older_than_keeps_fresh_entries() {
        let mut ledger = ReservationLedger::new();
        ledger.reserve(reservation("BTC/USD", dec!(100), t0()));
        ledger.reserve(reservation("BTC/USD", dec!(200), t0() + Duration::seconds(600)));

        let stale = ledger.drain_older_than(t0() + Duration::seconds(300));
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].notional, dec!(100));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.total_notional(), dec!(200));
    }
}
