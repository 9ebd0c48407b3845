//! Voter and admin identities.

use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A principal, identified by its Ed25519 public key bytes.
///
/// Holding the bytes does not imply the bytes form a valid curve point; that is
/// checked when a signature is verified against the identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity(#[serde(with = "hex::serde")] [u8; 32]);

impl Identity {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, Error> {
        VerifyingKey::from_bytes(&self.0)
            .map_err(|e| Error::InvalidSignature(format!("{} is not a public key: {}", self, e)))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|e| Error::InvalidInput(format!("bad identity {:?}: {}", s, e)))?;
        Ok(Self(bytes))
    }
}

impl From<VerifyingKey> for Identity {
    fn from(key: VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl From<&SigningKey> for Identity {
    fn from(key: &SigningKey) -> Self {
        key.verifying_key().into()
    }
}

impl FromStr for Identity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", &self.to_hex()[..12])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn hex_roundtrip_through_from_str() {
        let key = SigningKey::generate(&mut OsRng);
        let id = Identity::from(&key);
        let parsed: Identity = id.to_hex().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.verifying_key().unwrap(), key.verifying_key());
    }

    #[test]
    fn malformed_hex_is_invalid_input() {
        let err = Identity::from_hex("not-hex").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
