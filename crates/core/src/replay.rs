//! Replay protection for signed intents.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Error, Identity};

/// Tracks the highest consumed nonce per voter.
///
/// A nonce is accepted only if it is strictly greater than the last one
/// consumed for the same voter. Skipping ahead is allowed and permanently
/// invalidates every lower nonce for that voter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayGuard {
    last_used: BTreeMap<Identity, u64>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `nonce` against the voter's history without consuming it.
    pub fn check(&self, voter: &Identity, nonce: u64) -> Result<(), Error> {
        match self.last_used.get(voter) {
            Some(&last_used) if nonce <= last_used => Err(Error::ReplayedNonce {
                voter: *voter,
                nonce,
                last_used,
            }),
            _ => Ok(()),
        }
    }

    /// Check `nonce` and record it as spent.
    pub fn check_and_consume(&mut self, voter: &Identity, nonce: u64) -> Result<(), Error> {
        self.check(voter, nonce)?;
        self.last_used.insert(*voter, nonce);
        Ok(())
    }

    pub fn last_used(&self, voter: &Identity) -> Option<u64> {
        self.last_used.get(voter).copied()
    }

    /// Smallest nonce the voter can use next.
    pub fn next_nonce(&self, voter: &Identity) -> u64 {
        self.last_used(voter).map_or(0, |n| n.saturating_add(1))
    }
}
