use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Duration;
use log::{debug, info, warn};
use proteus_core::{Fill, OrderProposal, Timestamp};
use proteus_ports::Clock;
use proteus_risk_monitor::{RiskLimitConfig, RiskMonitor};
use proteus_strategy::StrategyManager;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use crate::config::GateConfig;
use crate::decision::{ApprovedOrder, Decision, RejectReason, ReservationId};
use crate::ledger::{Reservation, ReservationLedger};

/// The only path by which a strategy's decision becomes a live order.
///
/// Validation is synchronous and reads state the other components
/// maintain on their own ticks: halt flags and limits from the risk
/// monitor, the live position-size cap from the strategy arena, cached
/// correlations from the last risk evaluation. It never waits on
/// pattern detection or analyzer recomputation.
///
/// Exposure and concentration decisions and the reservation they admit
/// happen under one ledger lock. Cheap to clone, all state is shared.
#[derive(Clone)]
pub struct OrderGate {
    config: GateConfig,
    clock: Arc<dyn Clock>,
    strategies: StrategyManager,
    risk: RiskMonitor,
    ledger: Arc<Mutex<ReservationLedger>>,
    accepting: Arc<AtomicBool>,
}

impl OrderGate {
    pub fn new(
        config: GateConfig,
        clock: Arc<dyn Clock>,
        strategies: StrategyManager,
        risk: RiskMonitor,
    ) -> Self {
        Self {
            config,
            clock,
            strategies,
            risk,
            ledger: Arc::new(Mutex::new(ReservationLedger::new())),
            accepting: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Validates one proposal against the checks in order, short-circuiting
    /// on the first failure. The decision is binding and final for this
    /// proposal; a changed mind requires a new proposal.
    pub fn validate(&self, strategy_id: &str, proposal: &OrderProposal) -> Decision {
        if !self.accepting.load(Ordering::SeqCst) {
            return self.reject(strategy_id, proposal, RejectReason::NotAccepting);
        }
        if self.risk.is_emergency_stopped() {
            let reason = self
                .risk
                .halt_registry()
                .emergency_info()
                .map(|info| info.reason)
                .unwrap_or_else(|| "emergency stop".to_string());
            return self.reject(strategy_id, proposal, RejectReason::EmergencyStopped { reason });
        }
        if self.risk.is_halted(strategy_id) {
            let reason = self
                .risk
                .halt_registry()
                .halt_info(strategy_id)
                .map(|info| info.reason)
                .unwrap_or_else(|| "halted".to_string());
            return self.reject(
                strategy_id,
                proposal,
                RejectReason::StrategyHalted {
                    strategy_id: strategy_id.to_string(),
                    reason,
                },
            );
        }

        let size_limit = match self.strategies.live_max_position_size(strategy_id) {
            Ok(limit) => limit,
            Err(_) => {
                return self.reject(
                    strategy_id,
                    proposal,
                    RejectReason::UnknownStrategy(strategy_id.to_string()),
                );
            }
        };
        let requested = proposal.quantity.abs();
        if requested > size_limit {
            return self.reject(
                strategy_id,
                proposal,
                RejectReason::PositionSize {
                    requested,
                    limit: size_limit,
                },
            );
        }

        let limits = self.risk.limits();
        let equity = self.risk.portfolio_equity();
        let current_gross = self.risk.gross_exposure();
        let current_asset = self.risk.asset_exposure(&proposal.asset);
        let order_notional = proposal.notional().abs();
        let now = self.clock.now();

        // Read-modify-decide on the shared exposure aggregate: the
        // remaining checks and the reservation insert hold the same lock.
        let admitted = {
            let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
            self.admit(
                &mut ledger,
                strategy_id,
                proposal,
                &limits,
                equity,
                current_gross,
                current_asset,
                order_notional,
                now,
            )
        };

        match admitted {
            Ok(reservation_id) => {
                debug!(
                    "[GATE] Approved {} {:?} {} {} @ {} (reservation {})",
                    strategy_id,
                    proposal.side,
                    proposal.quantity,
                    proposal.asset,
                    proposal.price,
                    reservation_id
                );
                Decision::Approved(ApprovedOrder {
                    reservation_id,
                    proposal: proposal.clone(),
                    approved_at: now,
                })
            }
            Err(reason) => self.reject(strategy_id, proposal, reason),
        }
    }

    /// Settles the reservation backing a fill. The exposure it held is
    /// now a position the risk monitor carries from the same fill.
    pub fn settle_fill(&self, fill: &Fill) -> Option<Reservation> {
        let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        let settled = ledger.release_proposal(fill.proposal_id);
        if let Some(reservation) = &settled {
            debug!(
                "[GATE] Settled reservation {} for proposal {}",
                reservation.id, fill.proposal_id
            );
        }
        settled
    }

    /// Releases a reservation for a proposal that was cancelled or never
    /// executed. Returns false when the reservation was already gone.
    pub fn release(&self, reservation_id: ReservationId) -> bool {
        let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        let released = ledger.release(reservation_id);
        if let Some(reservation) = &released {
            info!(
                "[GATE] Released reservation {} ({} {})",
                reservation.id, reservation.strategy_id, reservation.asset
            );
        }
        released.is_some()
    }

    /// Drops reservations older than the configured TTL and returns how
    /// many were released.
    pub fn release_expired(&self) -> usize {
        let cutoff = self.clock.now() - Duration::seconds(self.config.reservation_ttl_secs);
        let stale = {
            let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
            ledger.drain_older_than(cutoff)
        };
        for reservation in &stale {
            info!(
                "[GATE] Released expired reservation {} ({} {} notional {})",
                reservation.id, reservation.strategy_id, reservation.asset, reservation.notional
            );
        }
        stale.len()
    }

    /// Stops admitting proposals. In-flight validations finish; anything
    /// arriving afterwards is rejected with `NotAccepting`.
    pub fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        info!("[GATE] No longer accepting proposals");
    }

    pub fn resume_accepting(&self) {
        self.accepting.store(true, Ordering::SeqCst);
        info!("[GATE] Accepting proposals");
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub fn open_reservations(&self) -> usize {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Notional reserved for approved proposals that have not settled.
    pub fn reserved_notional(&self) -> Decimal {
        self.ledger
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .total_notional()
    }

    /// Checks 3 to 5 and the reservation, under the ledger lock.
    #[allow(clippy::too_many_arguments)]
    fn admit(
        &self,
        ledger: &mut ReservationLedger,
        strategy_id: &str,
        proposal: &OrderProposal,
        limits: &RiskLimitConfig,
        equity: Decimal,
        current_gross: Decimal,
        current_asset: Decimal,
        order_notional: Decimal,
        now: Timestamp,
    ) -> Result<ReservationId, RejectReason> {
        let would_gross = current_gross + ledger.total_notional() + order_notional;
        let measured = exposure_fraction(would_gross, equity);
        if measured > limits.max_exposure_fraction {
            return Err(RejectReason::PortfolioExposure {
                measured,
                limit: limits.max_exposure_fraction,
            });
        }

        let would_asset =
            current_asset + ledger.asset_notional(&proposal.asset) + order_notional;
        let concentration = exposure_fraction(would_asset, equity);
        if concentration > limits.max_concentration {
            return Err(RejectReason::Concentration {
                asset: proposal.asset.clone(),
                measured: concentration,
                limit: limits.max_concentration,
            });
        }

        let correlation = self.risk.max_abs_correlation_with(strategy_id);
        if correlation > limits.max_correlation {
            return Err(RejectReason::Correlation {
                measured: correlation,
                limit: limits.max_correlation,
            });
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            proposal_id: proposal.id,
            strategy_id: strategy_id.to_string(),
            asset: proposal.asset.clone(),
            notional: order_notional,
            reserved_at: now,
        };
        let id = reservation.id;
        ledger.reserve(reservation);
        Ok(id)
    }

    fn reject(&self, strategy_id: &str, proposal: &OrderProposal, reason: RejectReason) -> Decision {
        warn!(
            "[GATE] Rejected {} {:?} {} {}: {}",
            strategy_id, proposal.side, proposal.quantity, proposal.asset, reason
        );
        Decision::Rejected(reason)
    }
}

/// Notional over equity. Non-positive equity cannot admit new exposure.
fn exposure_fraction(notional: Decimal, equity: Decimal) -> f64 {
    if equity <= Decimal::ZERO {
        return f64::INFINITY;
    }
    (notional / equity).to_f64().unwrap_or(f64::INFINITY)
}
