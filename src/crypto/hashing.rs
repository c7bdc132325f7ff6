//! Peer identity hashing
//!
//! A peer's identity is `RIPEMD160(SHA256(public_key))`, the same 20-byte
//! "hash160" construction Bitcoin uses for addresses.

use ripemd::Ripemd160;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use super::CryptoError;

/// Length of an identity in bytes
pub const IDENTITY_LEN: usize = 20;

/// SHA-256 digest of `data`
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// RIPEMD-160 over SHA-256 of `data`
pub fn hash160(data: &[u8]) -> [u8; IDENTITY_LEN] {
    let mut hasher = Ripemd160::new();
    hasher.update(sha256(data));
    hasher.finalize().into()
}

/// Network identity of a peer (20 bytes), used as its routing address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity([u8; IDENTITY_LEN]);

impl Identity {
    /// Compute the identity of a serialized public key
    pub fn from_public_key(public_key: &[u8]) -> Self {
        Self(hash160(public_key))
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    /// Convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidData(e.to_string()))?;
        let arr: [u8; IDENTITY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidData(format!(
                "identity must be {} bytes, got {}",
                IDENTITY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Check that `public_key` hashes to this identity
    pub fn matches(&self, public_key: &[u8]) -> bool {
        Self::from_public_key(public_key) == *self
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.to_hex())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Identity {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash160_of_empty_input() {
        // RIPEMD160(SHA256(""))
        assert_eq!(
            hex::encode(hash160(b"")),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }

    #[test]
    fn test_identity_matches() {
        let public_key = [0x02u8; 33];
        let identity = Identity::from_public_key(&public_key);

        assert!(identity.matches(&public_key));
        assert!(!identity.matches(&[0x03u8; 33]));
    }

    #[test]
    fn test_identity_hex() {
        let identity = Identity::from_public_key(b"peer");

        let parsed: Identity = identity.to_hex().parse().unwrap();
        assert_eq!(identity, parsed);
        assert_eq!(identity.to_string().len(), 40);

        assert!(Identity::from_hex("0000ff").is_err());
        assert!(Identity::from_hex("not hex").is_err());
    }

    #[test]
    fn test_identity_serde() {
        let identity = Identity::from_public_key(b"peer");
        let json = serde_json::to_string(&identity).unwrap();

        assert_eq!(json, format!("\"{}\"", identity.to_hex()));
        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(identity, back);
    }
}
