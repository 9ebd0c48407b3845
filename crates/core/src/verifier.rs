//! Signature verification for signed intents.

use ed25519_dalek::Signature;
use tracing::debug;

use crate::{Error, Identity, LedgerId, SignedIntent};

/// Order of the Ed25519 base point, little-endian.
const GROUP_ORDER: [u8; 32] = [
    0xed, 0xd3, 0xf5, 0x5c, 0x1a, 0x63, 0x12, 0x58, 0xd6, 0x9c, 0xf7, 0xa2, 0xde, 0xf9, 0xde, 0x14,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10,
];

/// `s` is canonical when it is strictly below the group order.
fn is_canonical_scalar(s: &[u8]) -> bool {
    s.iter().rev().lt(GROUP_ORDER.iter().rev())
}

/// Check that `signature` over `message` was produced by `claimed`.
///
/// Malformed input (wrong signature length, a non-canonical `s` scalar, a
/// claimed identity that is not a valid public key) fails with
/// [`Error::InvalidSignature`]. A well-formed
/// signature from some other key fails with [`Error::SignerMismatch`].
pub fn verify(claimed: &Identity, message: &[u8], signature: &[u8]) -> Result<Identity, Error> {
    let sig_bytes: [u8; 64] = signature.try_into().map_err(|_| {
        Error::InvalidSignature(format!("expected 64 bytes, got {}", signature.len()))
    })?;
    if !is_canonical_scalar(&sig_bytes[32..]) {
        return Err(Error::InvalidSignature("scalar is not canonical".to_string()));
    }
    let signature = Signature::from_bytes(&sig_bytes);

    let public_key = claimed.verifying_key()?;

    public_key
        .verify_strict(message, &signature)
        .map_err(|_| Error::SignerMismatch(*claimed))?;

    Ok(*claimed)
}

/// Verify an intent as targeted at `ledger`, returning the authorizing voter.
pub fn verify_intent(intent: &SignedIntent, ledger: &LedgerId) -> Result<Identity, Error> {
    let message = intent.signing_bytes(ledger)?;
    let voter = verify(&intent.voter, &message, &intent.signature)?;
    debug!(voter = %voter, nonce = intent.nonce, "intent signature verified");
    Ok(voter)
}
