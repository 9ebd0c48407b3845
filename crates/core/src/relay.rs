//! The meta-transaction relay.
//!
//! Accepts a signed intent from any submitter and, if it is fresh, correctly
//! signed, and carries an unused nonce, dispatches it to the ledger with the
//! voter as the effective caller. The submitter pays for execution; the voter
//! only signs.
//!
//! Step order matters:
//! 1. expiry (an expired intent never consumes a nonce)
//! 2. signature
//! 3. nonce consumption
//! 4. ledger dispatch
//!
//! A nonce consumed in step 3 stays consumed even if the ledger rejects the
//! action in step 4 (for example `AlreadyVoted`). The voter must sign a new
//! intent with a higher nonce to try again.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::verifier::verify_intent;
use crate::{Error, Hash, Identity, Ledger, Outcome, ReplayGuard, SignedIntent};

/// Source of the current time, in Unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct FixedClock(AtomicU64);

impl FixedClock {
    pub fn new(now: u64) -> Self {
        Self(AtomicU64::new(now))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> u64 {
        (**self).now()
    }
}

/// What a relayer gets back for a successful submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Digest of the intent's signed bytes.
    pub intent: Hash,
    pub voter: Identity,
    pub nonce: u64,
    pub outcome: Outcome,
}

/// Authorization-and-dispatch layer in front of a [`Ledger`].
pub struct Relay {
    identity: Identity,
    guard: ReplayGuard,
    clock: Box<dyn Clock>,
}

impl Relay {
    /// Create a relay acting as `identity`, which must be the ledger's trusted
    /// forwarder for dispatch to succeed.
    pub fn new(identity: Identity, clock: Box<dyn Clock>) -> Self {
        Self::with_guard(identity, ReplayGuard::new(), clock)
    }

    /// Resume a relay with previously persisted nonce state.
    pub fn with_guard(identity: Identity, guard: ReplayGuard, clock: Box<dyn Clock>) -> Self {
        Self {
            identity,
            guard,
            clock,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn guard(&self) -> &ReplayGuard {
        &self.guard
    }

    pub fn next_nonce(&self, voter: &Identity) -> u64 {
        self.guard.next_nonce(voter)
    }

    /// Verify `intent` and execute it against `ledger` as its voter.
    ///
    /// Ledger errors are returned unchanged.
    pub fn relay(&mut self, ledger: &mut Ledger, intent: &SignedIntent) -> Result<Receipt, Error> {
        self.try_relay(ledger, intent).inspect_err(|e| {
            warn!(voter = %intent.voter, nonce = intent.nonce, error = %e, "intent rejected");
        })
    }

    fn try_relay(&mut self, ledger: &mut Ledger, intent: &SignedIntent) -> Result<Receipt, Error> {
        if ledger.trusted_forwarder() != Some(&self.identity) {
            return Err(Error::Unauthorized {
                caller: self.identity,
                operation: "relay for this ledger",
            });
        }

        let now = self.clock.now();
        if let Some(expiry) = intent.expiry.filter(|_| intent.is_expired_at(now)) {
            return Err(Error::Expired { expiry, now });
        }

        let voter = verify_intent(intent, ledger.id())?;
        let digest = intent.digest(ledger.id())?;

        self.guard.check_and_consume(&voter, intent.nonce)?;
        debug!(voter = %voter, nonce = intent.nonce, "nonce consumed");

        let outcome = ledger.execute_forwarded(&self.identity, &voter, &intent.action)?;

        Ok(Receipt {
            intent: digest,
            voter,
            nonce: intent.nonce,
            outcome,
        })
    }
}
