//! secp256k1 key material

use super::IdentityError;
use crate::crypto::{self, Identity};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use std::fmt;
use zeroize::Zeroize;

/// Length of a compressed SEC1 public key
pub const PUBLIC_KEY_LEN: usize = 33;

/// Upper bound on rejection sampling in [`create_private_key`]. The chance
/// of 32 random bytes falling outside `[1, n-1]` is below 2^-127.
const MAX_KEYGEN_ATTEMPTS: usize = 64;

/// 32-byte secp256k1 secret scalar, always in `[1, n-1]`; zeroized on drop
#[derive(Clone)]
pub struct PrivateKey(SecretKey);

impl PrivateKey {
    /// Validate and wrap raw scalar bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, IdentityError> {
        SecretKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| IdentityError::InvalidPrivateKey)
    }

    /// Parse from a 64-character hex string
    pub fn from_hex(s: &str) -> Result<Self, IdentityError> {
        let mut bytes: [u8; 32] = crypto::decode_hex_array(s)?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Get the secret bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes().into()
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.0
    }
}

impl From<SecretKey> for PrivateKey {
    fn from(secret: SecretKey) -> Self {
        Self(secret)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Compressed secp256k1 public key (33 bytes, prefix 0x02 or 0x03)
#[derive(Clone, Copy)]
pub struct PublicKey {
    bytes: [u8; PUBLIC_KEY_LEN],
    point: k256::PublicKey,
}

impl PublicKey {
    /// Validate that `bytes` is a compressed point on the curve
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let bytes: [u8; PUBLIC_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidPublicKey)?;
        let point =
            k256::PublicKey::from_sec1_bytes(&bytes).map_err(|_| IdentityError::InvalidPublicKey)?;
        Ok(Self { bytes, point })
    }

    /// Parse from hex
    pub fn from_hex(s: &str) -> Result<Self, IdentityError> {
        let bytes = hex::decode(s).map_err(|_| IdentityError::InvalidPublicKey)?;
        Self::from_bytes(&bytes)
    }

    pub(crate) fn from_point(point: k256::PublicKey) -> Self {
        let encoded = point.to_encoded_point(true);
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        bytes.copy_from_slice(encoded.as_bytes());
        Self { bytes, point }
    }

    pub(crate) fn point(&self) -> &k256::PublicKey {
        &self.point
    }

    /// Get raw compressed bytes
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.bytes
    }

    /// Lowercase hex form, as carried in the AUTHENTICATE element
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Peer identity bound to this key
    pub fn identity(&self) -> Identity {
        Identity::from_public_key(&self.bytes)
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for PublicKey {}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// Generate a fresh private key, re-drawing until the bytes are a valid scalar
pub fn create_private_key() -> PrivateKey {
    for _ in 0..MAX_KEYGEN_ATTEMPTS {
        let mut candidate = crypto::random_32_bytes();
        let key = PrivateKey::from_bytes(&candidate);
        candidate.zeroize();
        if let Ok(key) = key {
            return key;
        }
    }
    // Unreachable in practice; fall back to the curve library's sampler
    PrivateKey(SecretKey::random(&mut rand::thread_rng()))
}

/// Compute `G·priv` in compressed form
pub fn derive_public_key(private_key: &PrivateKey) -> PublicKey {
    PublicKey::from_point(private_key.secret_key().public_key())
}

/// secp256k1 key pair
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Create a new key pair from a validated private key
    pub fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = derive_public_key(&private_key);
        Self {
            private_key,
            public_key,
        }
    }

    /// Generate a random key pair
    pub fn generate() -> Self {
        Self::from_private_key(create_private_key())
    }

    /// Identity of the public half
    pub fn identity(&self) -> Identity {
        self.public_key.identity()
    }
}
