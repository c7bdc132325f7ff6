//! AuthRPC Core - authenticated JSON-RPC messaging between peers
//!
//! This crate binds a peer's network identity to a secp256k1 key (optionally
//! a BIP32 child of a master key) and authenticates every RPC message the
//! peer sends or receives. It plugs into an existing RPC node through two
//! byte-level pipeline stages and never touches the transport itself.

pub mod auth;
pub mod crypto;
pub mod identity;
pub mod p2p;

#[cfg(test)]
mod proptests;

use std::sync::Arc;
use thiserror::Error;

pub use auth::{AuthError, AuthErrorKind, SignatureEncoding, Signer, VerifiedMessage, Verifier};
pub use crypto::Identity;
pub use identity::{DerivationIndex, KeyConfig, PeerKeys};

/// Main error type for AuthRPC operations
#[derive(Error, Debug)]
pub enum AuthRpcError {
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Identity error: {0}")]
    Identity(#[from] identity::IdentityError),

    #[error("Authentication error: {0}")]
    Auth(#[from] auth::AuthError),

    #[error("P2P protocol error: {0}")]
    P2P(#[from] p2p::P2PError),
}

pub type Result<T> = std::result::Result<T, AuthRpcError>;

/// Deployment-wide settings of the authenticated envelope
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Text encoding of the signature field
    pub signature_encoding: SignatureEncoding,

    /// Require every sender to prove its key is the stated child of its
    /// advertised extended public key
    pub require_derivation_proof: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signature_encoding: SignatureEncoding::Base64Recoverable,
            require_derivation_proof: true,
        }
    }
}

/// One peer's keys plus the signing and verifying stages built from them
pub struct PeerAuthenticator {
    keys: Arc<PeerKeys>,
    signer: Arc<Signer>,
    verifier: Arc<Verifier>,
}

impl PeerAuthenticator {
    /// Build keys from `key_config` and the two pipeline stages
    pub fn new(key_config: &KeyConfig, config: &AuthConfig) -> Result<Self> {
        let keys = PeerKeys::from_config(key_config)?;
        Ok(Self::from_keys(keys, config))
    }

    /// Build around an existing key bundle
    pub fn from_keys(keys: PeerKeys, config: &AuthConfig) -> Self {
        let keys = Arc::new(keys);
        let signer = Arc::new(Signer::new(keys.clone(), config.signature_encoding));
        let verifier = Arc::new(Verifier::new(
            config.signature_encoding,
            config.require_derivation_proof,
        ));

        tracing::info!(
            identity = %keys.identity(),
            index = keys.derivation_index().to_wire(),
            "Created peer authenticator"
        );

        Self {
            keys,
            signer,
            verifier,
        }
    }

    /// Hand identity, contact keys and pipeline stages to the host node
    pub fn install<H: p2p::PeerHost + ?Sized>(&self, host: &mut H) {
        host.set_identity(self.keys.identity());
        host.set_contact_keys(self.keys.public_extended_key(), self.keys.derivation_index());
        host.append_serializer(self.signer.clone());
        host.prepend_deserializer(self.verifier.clone());

        tracing::info!(identity = %self.keys.identity(), "Installed message authentication");
    }

    pub fn identity(&self) -> Identity {
        self.keys.identity()
    }

    pub fn public_key(&self) -> &identity::PublicKey {
        self.keys.public_key()
    }

    pub fn public_extended_key(&self) -> String {
        self.keys.public_extended_key()
    }

    pub fn keys(&self) -> &PeerKeys {
        &self.keys
    }

    pub fn signer(&self) -> Arc<Signer> {
        self.signer.clone()
    }

    pub fn verifier(&self) -> Arc<Verifier> {
        self.verifier.clone()
    }
}
