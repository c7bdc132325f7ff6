//! Auth Module - signed JSON-RPC envelopes
//!
//! Outbound, [`Signer`] hashes the canonical payload list with SHA-256,
//! signs the digest with the peer's secp256k1 key and appends an
//! `AUTHENTICATE` notification. Inbound, [`Verifier`] splits that
//! notification off and checks, in order, that the announced identity is
//! the hash of the asserted key, that the key is the stated child of the
//! asserted extended key, and that the signature holds. Every message is
//! judged on its own: there is no session and no replay window.

mod envelope;
mod signer;
mod verifier;

pub use envelope::{AuthenticateParams, KeyProof, SignatureEncoding};
pub use signer::Signer;
pub use verifier::{VerifiedMessage, Verifier};

use crate::p2p::P2PError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to parse received payload: {0}")]
    MalformedPayload(String),

    #[error("Identity does not match public key")]
    IdentityMismatch,

    #[error("Public key is not a valid child")]
    InvalidDerivation,

    #[error("Message includes invalid signature")]
    InvalidSignature,

    #[error("Signing failed: {0}")]
    Signing(String),

    /// Failure of the serializer stage this one wraps, passed through as-is
    #[error(transparent)]
    Upstream(Box<dyn std::error::Error + Send + Sync>),
}

/// Discriminant of [`AuthError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    MalformedPayload,
    IdentityMismatch,
    InvalidDerivation,
    InvalidSignature,
    Signing,
    Upstream,
}

impl AuthError {
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            Self::MalformedPayload(_) => AuthErrorKind::MalformedPayload,
            Self::IdentityMismatch => AuthErrorKind::IdentityMismatch,
            Self::InvalidDerivation => AuthErrorKind::InvalidDerivation,
            Self::InvalidSignature => AuthErrorKind::InvalidSignature,
            Self::Signing(_) => AuthErrorKind::Signing,
            Self::Upstream(_) => AuthErrorKind::Upstream,
        }
    }
}

impl From<P2PError> for AuthError {
    fn from(err: P2PError) -> Self {
        match err {
            P2PError::Protocol(msg) => Self::MalformedPayload(msg),
        }
    }
}
