//! In-memory cooldown table.
//!
//! Pure data structure: callers provide exclusion, nothing here blocks or
//! performs I/O.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::error::LedgerError;
use super::types::{CooldownEntry, Identity};

#[derive(Debug, Default)]
pub struct CooldownLedger {
    entries: HashMap<Identity, CooldownEntry>,
    by_address: HashMap<String, HashSet<Identity>>,
}

impl CooldownLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, identity: &Identity) -> Option<&CooldownEntry> {
        self.entries.get(identity)
    }

    pub fn insert(&mut self, entry: CooldownEntry) -> Result<(), LedgerError> {
        if self.entries.contains_key(&entry.identity) {
            return Err(LedgerError::DuplicateEntry {
                identity: entry.identity,
            });
        }
        self.by_address
            .entry(entry.target_address.clone())
            .or_default()
            .insert(entry.identity.clone());
        self.entries.insert(entry.identity.clone(), entry);
        Ok(())
    }

    pub fn remove(&mut self, identity: &Identity) -> Option<CooldownEntry> {
        let entry = self.entries.remove(identity)?;
        if let Some(holders) = self.by_address.get_mut(&entry.target_address) {
            holders.remove(identity);
            if holders.is_empty() {
                self.by_address.remove(&entry.target_address);
            }
        }
        Some(entry)
    }

    pub fn mark_in_flight(&mut self, identity: &Identity, in_flight: bool) -> Result<(), LedgerError> {
        let entry = self
            .entries
            .get_mut(identity)
            .ok_or_else(|| LedgerError::UnknownIdentity {
                identity: identity.clone(),
            })?;
        entry.in_flight = in_flight;
        Ok(())
    }

    /// Entries of every identity that currently reserves `address`.
    pub fn holders_of<'a>(&'a self, address: &str) -> impl Iterator<Item = &'a CooldownEntry> + 'a {
        self.by_address
            .get(address)
            .into_iter()
            .flat_map(|holders| holders.iter())
            .filter_map(|identity| self.entries.get(identity))
    }

    /// Drops entries whose cooldown elapsed and that are not awaiting a transfer.
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<Identity> = self
            .entries
            .values()
            .filter(|entry| !entry.in_flight && entry.next_eligible_at <= now)
            .map(|entry| entry.identity.clone())
            .collect();
        for identity in &expired {
            self.remove(identity);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn in_flight_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.in_flight).count()
    }
}
