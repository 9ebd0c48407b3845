//! Error types for ezballot-core.

use thiserror::Error;

use crate::{CandidateId, Identity};

/// Core errors.
///
/// Every variant is terminal for the attempted operation. A rejected mutation
/// leaves ledger state unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Caller is not allowed to perform this operation.
    #[error("unauthorized: {caller} may not {operation}")]
    Unauthorized {
        caller: Identity,
        operation: &'static str,
    },

    /// Empty candidate name, malformed identity, malformed intent encoding.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Candidate id outside `1..=candidates_count`.
    #[error("candidate not found: {0}")]
    CandidateNotFound(CandidateId),

    /// The identity has already cast its vote.
    #[error("{0} already voted")]
    AlreadyVoted(Identity),

    /// Signature bytes (or the claimed key) are not well-formed.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Signature is well-formed but was not produced by the claimed voter.
    #[error("signature does not match signer {0}")]
    SignerMismatch(Identity),

    /// Intent deadline has passed.
    #[error("intent expired at {expiry}, current time is {now}")]
    Expired { expiry: u64, now: u64 },

    /// Nonce is not greater than the last one consumed for this voter.
    #[error("replayed nonce {nonce} for {voter} (last used {last_used})")]
    ReplayedNonce {
        voter: Identity,
        nonce: u64,
        last_used: u64,
    },
}

/// Stable classification of [`Error`], for callers that branch on the outcome
/// (e.g. a sponsoring relayer telling a voter "you already voted").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    InvalidInput,
    CandidateNotFound,
    AlreadyVoted,
    InvalidSignature,
    SignerMismatch,
    Expired,
    ReplayedNonce,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::CandidateNotFound(_) => ErrorKind::CandidateNotFound,
            Error::AlreadyVoted(_) => ErrorKind::AlreadyVoted,
            Error::InvalidSignature(_) => ErrorKind::InvalidSignature,
            Error::SignerMismatch(_) => ErrorKind::SignerMismatch,
            Error::Expired { .. } => ErrorKind::Expired,
            Error::ReplayedNonce { .. } => ErrorKind::ReplayedNonce,
        }
    }

    /// True for failures decided by the relay before the ledger was reached.
    pub fn is_relay_rejection(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidSignature
                | ErrorKind::SignerMismatch
                | ErrorKind::Expired
                | ErrorKind::ReplayedNonce
        )
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::InvalidInput(format!("encoding failed: {}", e))
    }
}

impl From<ciborium::de::Error<std::io::Error>> for Error {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        Error::InvalidInput(format!("malformed encoding: {}", e))
    }
}
