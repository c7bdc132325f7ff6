//! Inbound path: check the trailing `AUTHENTICATE` before anything else
//! sees the message

use super::envelope::{AuthenticateParams, SignatureEncoding};
use super::AuthError;
use crate::crypto::{sha256, Identity};
use crate::identity::{is_valid_child, DerivationIndex, PublicKey};
use crate::p2p::protocol::{self, Payload, AUTHENTICATE};
use crate::p2p::MessageTransform;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::VerifyingKey;

/// A message whose sender has been authenticated
#[derive(Debug, Clone)]
pub struct VerifiedMessage {
    /// Identity announced by the sender and bound to its key
    pub identity: Identity,

    /// Key that produced the signature
    pub public_key: PublicKey,

    /// Application payloads, without the `AUTHENTICATE` notification
    pub payloads: Vec<Payload>,

    buffer: Vec<u8>,
}

impl VerifiedMessage {
    /// The received bytes, unmodified
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

/// Verifies inbound messages. Holds no key material and no per-peer state.
#[derive(Debug, Clone)]
pub struct Verifier {
    encoding: SignatureEncoding,
    require_derivation_proof: bool,
}

impl Verifier {
    pub fn new(encoding: SignatureEncoding, require_derivation_proof: bool) -> Self {
        Self {
            encoding,
            require_derivation_proof,
        }
    }

    /// Verify `buffer` and forward it unchanged on success
    pub fn deserialize(&self, buffer: Vec<u8>) -> Result<Vec<u8>, AuthError> {
        self.verify(buffer).map(VerifiedMessage::into_bytes)
    }

    /// Authenticate one received message
    pub fn verify(&self, buffer: Vec<u8>) -> Result<VerifiedMessage, AuthError> {
        match self.check(&buffer) {
            Ok((identity, public_key, payloads)) => {
                tracing::debug!(%identity, payloads = payloads.len(), "Verified inbound message");
                Ok(VerifiedMessage {
                    identity,
                    public_key,
                    payloads,
                    buffer,
                })
            }
            Err(e) => {
                tracing::warn!(kind = ?e.kind(), "Rejected inbound message: {}", e);
                Err(e)
            }
        }
    }

    fn check(&self, buffer: &[u8]) -> Result<(Identity, PublicKey, Vec<Payload>), AuthError> {
        let mut payloads = protocol::parse_canonical_payloads(buffer)?;

        let authenticate = match payloads.pop() {
            Some(last) if protocol::method_of(&last) == Some(AUTHENTICATE) => last,
            _ => {
                return Err(AuthError::MalformedPayload(
                    "message does not end with AUTHENTICATE".into(),
                ))
            }
        };
        if payloads
            .iter()
            .any(|p| protocol::method_of(p) == Some(AUTHENTICATE))
        {
            return Err(AuthError::MalformedPayload(
                "message carries more than one AUTHENTICATE".into(),
            ));
        }

        let params = AuthenticateParams::from_payload(&authenticate)?;
        let claimed = protocol::claimed_identity(&payloads)?;
        let public_key_bytes = hex::decode(&params.public_key_hex)
            .map_err(|e| AuthError::MalformedPayload(format!("public key is not hex: {}", e)))?;
        let digest = sha256(&protocol::encode_payloads(&payloads)?);

        if !claimed.matches(&public_key_bytes) {
            return Err(AuthError::IdentityMismatch);
        }

        if self.require_derivation_proof && !Self::has_valid_proof(&params) {
            return Err(AuthError::InvalidDerivation);
        }

        let public_key =
            PublicKey::from_bytes(&public_key_bytes).map_err(|_| AuthError::InvalidSignature)?;
        self.check_signature(&digest, &params.signature, &public_key)?;

        Ok((claimed, public_key, payloads))
    }

    fn has_valid_proof(params: &AuthenticateParams) -> bool {
        let Some(proof) = &params.key_proof else {
            return false;
        };
        match DerivationIndex::from_wire(proof.derivation_index) {
            Ok(index) => is_valid_child(&params.public_key_hex, &proof.public_extended_key, index),
            Err(_) => false,
        }
    }

    fn check_signature(
        &self,
        digest: &[u8; 32],
        field: &str,
        public_key: &PublicKey,
    ) -> Result<(), AuthError> {
        let (signature, recovery_id) = self.encoding.decode(field)?;
        let verifying_key = VerifyingKey::from(public_key.point());

        verifying_key
            .verify_prehash(digest, &signature)
            .map_err(|_| AuthError::InvalidSignature)?;

        if let Some(recovery_id) = recovery_id {
            let recovered = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
                .map_err(|_| AuthError::InvalidSignature)?;
            if recovered != verifying_key {
                return Err(AuthError::InvalidSignature);
            }
        }

        Ok(())
    }
}

impl MessageTransform for Verifier {
    fn transform(&self, buffer: Vec<u8>) -> Result<Vec<u8>, AuthError> {
        self.deserialize(buffer)
    }
}
