//! Signed intents: an identity's authorization for one ledger action.
//!
//! The signed bytes are the CBOR encoding of:
//! ```text
//! SignableIntent {
//!   domain : "ezballot-intent-v1"
//!   ledger : LedgerId         // which ledger this intent targets
//!   voter  : Identity         // who authorizes it
//!   action : IntentAction     // what to do
//!   nonce  : u64              // per-voter replay counter
//!   expiry : Option<u64>      // unix seconds, inclusive deadline
//! }
//! ```
//! The ledger id is not carried in the intent itself. The relay supplies the id
//! of the ledger it serves, so an intent signed for another ledger fails
//! verification instead of being replayed here.

use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};

use crate::hash::canonical_bytes;
use crate::{CandidateId, Error, Hash, Identity, LedgerId};

const INTENT_DOMAIN: &str = "ezballot-intent-v1";

/// The closed set of actions an intent may request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentAction {
    Vote { candidate_id: CandidateId },
    AddCandidate { name: String },
}

/// An action signed by `voter`, to be submitted by any relayer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedIntent {
    pub voter: Identity,
    pub action: IntentAction,
    pub nonce: u64,
    /// Unix seconds after which the intent can no longer be consumed.
    pub expiry: Option<u64>,
    /// Ed25519 signature over [`SignedIntent::signing_bytes`].
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

impl SignedIntent {
    /// Build an intent for `ledger` and sign it with the voter's key.
    pub fn sign(
        signing_key: &SigningKey,
        ledger: &LedgerId,
        action: IntentAction,
        nonce: u64,
        expiry: Option<u64>,
    ) -> Result<Self, Error> {
        let mut intent = Self {
            voter: Identity::from(signing_key),
            action,
            nonce,
            expiry,
            signature: Vec::new(),
        };

        let content = intent.signing_bytes(ledger)?;
        intent.signature = signing_key.sign(&content).to_bytes().to_vec();

        Ok(intent)
    }

    /// The canonical bytes the voter signs.
    pub fn signing_bytes(&self, ledger: &LedgerId) -> Result<Vec<u8>, Error> {
        canonical_bytes(&SignableIntent {
            domain: INTENT_DOMAIN,
            ledger,
            voter: &self.voter,
            action: &self.action,
            nonce: self.nonce,
            expiry: self.expiry,
        })
    }

    /// Content id of this intent, as targeted at `ledger`.
    pub fn digest(&self, ledger: &LedgerId) -> Result<Hash, Error> {
        Ok(Hash::of(&self.signing_bytes(ledger)?))
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expiry.is_some_and(|expiry| now > expiry)
    }

    /// CBOR wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        canonical_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(ciborium::from_reader(bytes)?)
    }
}

#[derive(Serialize)]
struct SignableIntent<'a> {
    domain: &'static str,
    ledger: &'a LedgerId,
    voter: &'a Identity,
    action: &'a IntentAction,
    nonce: u64,
    expiry: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn vote_intent(key: &SigningKey, ledger: &LedgerId, nonce: u64) -> SignedIntent {
        SignedIntent::sign(
            key,
            ledger,
            IntentAction::Vote { candidate_id: 1 },
            nonce,
            Some(1_000),
        )
        .unwrap()
    }

    #[test]
    fn signing_bytes_bind_every_field() {
        let key = SigningKey::generate(&mut OsRng);
        let ledger = Hash::of(b"ledger-a");
        let intent = vote_intent(&key, &ledger, 3);
        let base = intent.signing_bytes(&ledger).unwrap();

        let mut other = intent.clone();
        other.nonce = 4;
        assert_ne!(other.signing_bytes(&ledger).unwrap(), base);

        let mut other = intent.clone();
        other.expiry = None;
        assert_ne!(other.signing_bytes(&ledger).unwrap(), base);

        let mut other = intent.clone();
        other.action = IntentAction::Vote { candidate_id: 2 };
        assert_ne!(other.signing_bytes(&ledger).unwrap(), base);

        let mut other = intent.clone();
        other.voter = Identity::from_bytes([9u8; 32]);
        assert_ne!(other.signing_bytes(&ledger).unwrap(), base);

        assert_ne!(intent.signing_bytes(&Hash::of(b"ledger-b")).unwrap(), base);
    }

    #[test]
    fn signature_does_not_affect_digest() {
        let key = SigningKey::generate(&mut OsRng);
        let ledger = Hash::of(b"ledger");
        let intent = vote_intent(&key, &ledger, 0);

        let mut tampered = intent.clone();
        tampered.signature[0] ^= 0xFF;
        assert_eq!(
            intent.digest(&ledger).unwrap(),
            tampered.digest(&ledger).unwrap()
        );
    }

    #[test]
    fn expiry_is_inclusive() {
        let key = SigningKey::generate(&mut OsRng);
        let intent = vote_intent(&key, &Hash::ZERO, 0);
        assert!(!intent.is_expired_at(999));
        assert!(!intent.is_expired_at(1_000));
        assert!(intent.is_expired_at(1_001));

        let mut open_ended = intent;
        open_ended.expiry = None;
        assert!(!open_ended.is_expired_at(u64::MAX));
    }

    #[test]
    fn wire_forms_preserve_intent() {
        let key = SigningKey::generate(&mut OsRng);
        let intent = SignedIntent::sign(
            &key,
            &Hash::ZERO,
            IntentAction::AddCandidate {
                name: "Alice".into(),
            },
            7,
            None,
        )
        .unwrap();

        let decoded = SignedIntent::from_bytes(&intent.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, intent);

        let json = serde_json::to_string(&intent).unwrap();
        assert!(json.contains("add_candidate"));
        assert_eq!(serde_json::from_str::<SignedIntent>(&json).unwrap(), intent);
    }

    #[test]
    fn malformed_wire_bytes_are_invalid_input() {
        let err = SignedIntent::from_bytes(&[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
