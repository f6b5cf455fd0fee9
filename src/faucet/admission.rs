//! Admission decisions over the cooldown ledger.
//!
//! Every read-decide-write sequence runs under the single ledger mutex; the
//! lock is never held across an `.await`.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, warn};

use super::error::LedgerError;
use super::ledger::CooldownLedger;
use super::types::{CooldownEntry, Identity, RequestEvent};

#[derive(Debug, Clone, Copy)]
pub struct AdmissionPolicy {
    pub cooldown: TimeDelta,
    /// Reject addresses already reserved by another identity's live entry.
    pub address_uniqueness: bool,
}

/// Handle to an admitted request. Only the controller mints these, so only an
/// admitted request can reach the dispatch coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionTicket {
    identity: Identity,
    target_address: String,
    next_eligible_at: DateTime<Utc>,
    generation: u64,
}

impl AdmissionTicket {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn target_address(&self) -> &str {
        &self.target_address
    }

    pub fn next_eligible_at(&self) -> DateTime<Utc> {
        self.next_eligible_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    CooldownActive { remaining: Duration },
    InFlight,
    AddressReserved { remaining: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admit(AdmissionTicket),
    Reject(Rejection),
}

/// What to do with a ticket's entry once its transfer resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep blocking the identity until `next_eligible_at`.
    Retain,
    /// Drop the entry so the identity may ask again right away.
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    CoolingDown {
        remaining: Duration,
        next_eligible_at: DateTime<Utc>,
    },
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub tracked: usize,
    pub in_flight: usize,
}

pub struct AdmissionController {
    ledger: Mutex<CooldownLedger>,
    policy: AdmissionPolicy,
    next_generation: AtomicU64,
}

impl AdmissionController {
    pub fn new(policy: AdmissionPolicy) -> Self {
        assert!(
            policy.cooldown >= TimeDelta::zero(),
            "Cooldown must not be negative"
        );
        Self {
            ledger: Mutex::new(CooldownLedger::new()),
            policy,
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn evaluate(&self, event: &RequestEvent) -> Result<AdmissionDecision, LedgerError> {
        let now = event.received_at;
        let mut ledger = self.lock();

        if let Some(entry) = ledger.lookup(&event.identity) {
            if now < entry.next_eligible_at {
                return Ok(AdmissionDecision::Reject(Rejection::CooldownActive {
                    remaining: remaining_until(entry.next_eligible_at, now),
                }));
            }
            if entry.in_flight {
                return Ok(AdmissionDecision::Reject(Rejection::InFlight));
            }
            debug!(identity = %event.identity, "Dropping expired cooldown entry");
            ledger.remove(&event.identity);
        }

        if self.policy.address_uniqueness {
            let mut stale = Vec::new();
            for holder in ledger.holders_of(&event.target_address) {
                if holder.in_flight || now < holder.next_eligible_at {
                    return Ok(AdmissionDecision::Reject(Rejection::AddressReserved {
                        remaining: remaining_until(holder.next_eligible_at, now),
                    }));
                }
                stale.push(holder.identity.clone());
            }
            for identity in &stale {
                ledger.remove(identity);
            }
        }

        let next_eligible_at = now
            .checked_add_signed(self.policy.cooldown)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let generation = self.next_generation.fetch_add(1, AtomicOrdering::Relaxed);
        let entry = CooldownEntry {
            identity: event.identity.clone(),
            target_address: event.target_address.clone(),
            next_eligible_at,
            in_flight: true,
            generation,
        };

        if let Err(err) = ledger.insert(entry) {
            error!(identity = %event.identity, "Cooldown ledger invariant violated: {err}");
            return Err(err);
        }

        Ok(AdmissionDecision::Admit(AdmissionTicket {
            identity: event.identity.clone(),
            target_address: event.target_address.clone(),
            next_eligible_at,
            generation,
        }))
    }

    /// Applies the post-transfer disposition. Returns `false` when the ticket's
    /// entry is gone or was replaced by a newer admission.
    pub fn complete(&self, ticket: &AdmissionTicket, disposition: Disposition) -> bool {
        let mut ledger = self.lock();
        let current = ledger
            .lookup(&ticket.identity)
            .map(|entry| entry.generation);
        if current != Some(ticket.generation) {
            warn!(
                identity = %ticket.identity,
                "Completion for a cooldown entry that is no longer tracked"
            );
            return false;
        }

        match disposition {
            Disposition::Retain => {
                if let Err(err) = ledger.mark_in_flight(&ticket.identity, false) {
                    error!(identity = %ticket.identity, "Failed to release in-flight flag: {err}");
                    return false;
                }
            }
            Disposition::Clear => {
                ledger.remove(&ticket.identity);
            }
        }
        true
    }

    /// Non-mutating view of what `evaluate` would say for `identity` at `now`.
    pub fn peek(&self, identity: &Identity, now: DateTime<Utc>) -> Eligibility {
        let ledger = self.lock();
        match ledger.lookup(identity) {
            Some(entry) if now < entry.next_eligible_at => Eligibility::CoolingDown {
                remaining: remaining_until(entry.next_eligible_at, now),
                next_eligible_at: entry.next_eligible_at,
            },
            Some(entry) if entry.in_flight => Eligibility::InFlight,
            _ => Eligibility::Eligible,
        }
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        self.lock().purge_expired(now)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let ledger = self.lock();
        LedgerSnapshot {
            tracked: ledger.len(),
            in_flight: ledger.in_flight_count(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CooldownLedger> {
        // Ledger mutations are single statements; a panic elsewhere cannot
        // leave it half-written.
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn remaining_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or_default()
}
