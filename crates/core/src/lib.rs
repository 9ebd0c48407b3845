//! ezballot-core: voting ledger and gasless meta-transaction relay.
//!
//! - `Ledger`: candidates, tallies, admin-only registration, one vote per identity
//! - `Relay`: verifies a voter's `SignedIntent` and dispatches it on their behalf
//! - `ReplayGuard`: per-voter nonce tracking so each intent executes at most once
//! - `Runtime`: serialized access to a ledger and its relay

mod error;
mod hash;
mod identity;
mod intent;
mod ledger;
mod relay;
mod replay;
mod runtime;
mod tally;
pub mod genesis;
pub mod verifier;

pub use error::{Error, ErrorKind};
pub use hash::Hash;
pub use identity::Identity;
pub use intent::{IntentAction, SignedIntent};
pub use ledger::{
    Candidate, CandidateId, Ledger, LedgerConfig, LedgerEvent, LedgerId, Outcome, VoteRecord,
};
pub use relay::{Clock, FixedClock, Receipt, Relay, SystemClock};
pub use replay::ReplayGuard;
pub use runtime::Runtime;
pub use tally::{Tally, TallyEntry};

/// Re-export for convenience
pub use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
