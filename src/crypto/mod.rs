//! Cryptography Module - hashing and randomness for peer authentication
//!
//! Provides the SHA-256 / hash160 primitives that bind a public key to a
//! peer identity, and a secure random source for key generation.

mod hashing;

pub use hashing::{hash160, sha256, Identity, IDENTITY_LEN};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Secure random bytes generator
pub fn random_bytes(len: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Secure random 32-byte array
pub fn random_32_bytes() -> [u8; 32] {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Decode a hex string into a fixed-size array
pub fn decode_hex_array<const N: usize>(s: &str) -> Result<[u8; N], CryptoError> {
    let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidData(e.to_string()))?;
    bytes.as_slice().try_into().map_err(|_| {
        CryptoError::InvalidData(format!("expected {} bytes, got {}", N, bytes.len()))
    })
}
