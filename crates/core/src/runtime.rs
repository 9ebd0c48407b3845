//! Serialized access to a ledger and its relay.
//!
//! Every call takes the same lock once, which gives all state-changing calls a
//! single global order. A relayed intent's nonce consumption and its ledger
//! dispatch happen under one acquisition, so a replayed copy cannot slip in
//! between them.

use ed25519_dalek::SigningKey;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    Candidate, CandidateId, Error, Identity, Ledger, LedgerId, Receipt, Relay, ReplayGuard,
    SignedIntent, Tally,
};

struct Inner {
    ledger: Ledger,
    relay: Relay,
}

/// A ledger and relay shared between concurrent submitters.
pub struct Runtime {
    inner: Mutex<Inner>,
}

impl Runtime {
    pub fn new(ledger: Ledger, relay: Relay) -> Self {
        Self {
            inner: Mutex::new(Inner { ledger, relay }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Ledger calls never leave state half-written, so a poisoned lock is
        // still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Direct call as the holder of `key`.
    pub fn add_candidate(&self, key: &SigningKey, name: &str) -> Result<CandidateId, Error> {
        self.lock().ledger.add_candidate(&Identity::from(key), name)
    }

    /// Direct call as the holder of `key`.
    pub fn vote(&self, key: &SigningKey, candidate_id: CandidateId) -> Result<u64, Error> {
        self.lock().ledger.vote(&Identity::from(key), candidate_id)
    }

    pub fn relay(&self, intent: &SignedIntent) -> Result<Receipt, Error> {
        let mut inner = self.lock();
        let Inner { ledger, relay } = &mut *inner;
        relay.relay(ledger, intent)
    }

    pub fn ledger_id(&self) -> LedgerId {
        *self.lock().ledger.id()
    }

    pub fn get_candidate(&self, candidate_id: CandidateId) -> Option<Candidate> {
        self.lock().ledger.get_candidate(candidate_id).cloned()
    }

    pub fn candidates_count(&self) -> u64 {
        self.lock().ledger.candidates_count()
    }

    pub fn has_voted(&self, identity: &Identity) -> bool {
        self.lock().ledger.has_voted(identity)
    }

    pub fn next_nonce(&self, voter: &Identity) -> u64 {
        self.lock().relay.next_nonce(voter)
    }

    pub fn tally(&self) -> Tally {
        Tally::from_ledger(&self.lock().ledger)
    }

    /// Consistent copy of the persistent state.
    pub fn snapshot(&self) -> (Ledger, ReplayGuard) {
        let inner = self.lock();
        (inner.ledger.clone(), inner.relay.guard().clone())
    }
}
