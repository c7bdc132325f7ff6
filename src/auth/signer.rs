//! Outbound path: sign the serialized payload list and append `AUTHENTICATE`

use super::envelope::{AuthenticateParams, KeyProof, SignatureEncoding};
use super::AuthError;
use crate::crypto::sha256;
use crate::identity::PeerKeys;
use crate::p2p::protocol::{self, Payload, AUTHENTICATE};
use crate::p2p::{MessageTransform, OutboundMessage};
use k256::ecdsa::SigningKey;
use std::error::Error as StdError;
use std::sync::Arc;

/// Signs outbound messages with a peer's key
pub struct Signer {
    keys: Arc<PeerKeys>,
    signing_key: SigningKey,
    encoding: SignatureEncoding,
}

impl Signer {
    pub fn new(keys: Arc<PeerKeys>, encoding: SignatureEncoding) -> Self {
        let signing_key = SigningKey::from(keys.private_key().secret_key().clone());
        Self {
            keys,
            signing_key,
            encoding,
        }
    }

    /// Sign the result of the upstream serializer. An upstream failure is
    /// passed through untouched and nothing is signed.
    pub fn serialize<T, E>(
        &self,
        upstream: Result<OutboundMessage<T>, E>,
    ) -> Result<OutboundMessage<T>, AuthError>
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        let message = upstream.map_err(|e| AuthError::Upstream(e.into()))?;
        message.try_map_buffer(|buffer| self.sign_buffer(&buffer))
    }

    /// Parse an encoded payload list, sign it, and re-encode with the
    /// `AUTHENTICATE` notification appended
    pub fn sign_buffer(&self, buffer: &[u8]) -> Result<Vec<u8>, AuthError> {
        let payloads = protocol::parse_payloads(buffer)?;
        self.sign_payloads(payloads)
    }

    /// Sign a payload list and return the canonical encoding of
    /// `payloads ++ [AUTHENTICATE]`
    pub fn sign_payloads(&self, mut payloads: Vec<Payload>) -> Result<Vec<u8>, AuthError> {
        if payloads
            .iter()
            .any(|p| protocol::method_of(p) == Some(AUTHENTICATE))
        {
            return Err(AuthError::MalformedPayload(
                "payload is already authenticated".into(),
            ));
        }

        let canonical = protocol::encode_payloads(&payloads)?;
        let authenticate = self.authenticate(&canonical)?;

        tracing::debug!(
            identity = %self.keys.identity(),
            payloads = payloads.len(),
            "Signed outbound message"
        );

        payloads.push(authenticate.to_payload());
        Ok(protocol::encode_payloads(&payloads)?)
    }

    /// Build the `AUTHENTICATE` params over already-canonical bytes
    pub fn authenticate(&self, canonical: &[u8]) -> Result<AuthenticateParams, AuthError> {
        let digest = sha256(canonical);
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| AuthError::Signing(e.to_string()))?;

        Ok(AuthenticateParams {
            signature: self.encoding.encode(&signature, recovery_id),
            public_key_hex: self.keys.public_key().to_hex(),
            key_proof: Some(KeyProof {
                public_extended_key: self.keys.public_extended_key(),
                derivation_index: self.keys.derivation_index().to_wire(),
            }),
        })
    }

    pub fn keys(&self) -> &PeerKeys {
        &self.keys
    }
}

impl MessageTransform for Signer {
    fn transform(&self, buffer: Vec<u8>) -> Result<Vec<u8>, AuthError> {
        self.sign_buffer(&buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{DerivationIndex, KeyConfig};
    use serde_json::{json, Value};

    fn signer() -> Signer {
        Signer::new(
            Arc::new(PeerKeys::generate().unwrap()),
            SignatureEncoding::default(),
        )
    }

    fn ping(signer: &Signer) -> Vec<Payload> {
        vec![
            protocol::request("abc", protocol::PING, json!([])),
            protocol::identify(
                &signer.keys().identity(),
                json!({ "hostname": "localhost", "port": 8080 }),
            ),
        ]
    }

    #[test]
    fn test_appends_authenticate() {
        let signer = signer();
        let signed = signer.sign_payloads(ping(&signer)).unwrap();

        let result: Vec<Value> = serde_json::from_slice(&signed).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(
            result[1]["params"][0],
            Value::String(signer.keys().identity().to_hex())
        );
        assert_eq!(result[2]["method"], AUTHENTICATE);
        assert_eq!(result[2]["params"].as_array().unwrap().len(), 3);
        assert_eq!(
            result[2]["params"][1],
            Value::String(signer.keys().public_key().to_hex())
        );
        assert_eq!(result[2]["params"][2][1], json!(0));
    }

    #[test]
    fn test_flat_key_emits_sentinel() {
        let private_key = crate::identity::create_private_key();
        let keys = PeerKeys::from_config(&KeyConfig::flat(&private_key)).unwrap();
        assert_eq!(keys.derivation_index(), DerivationIndex::Flat);

        let signer = Signer::new(Arc::new(keys), SignatureEncoding::default());
        let signed = signer.sign_payloads(ping(&signer)).unwrap();

        let result: Vec<Value> = serde_json::from_slice(&signed).unwrap();
        assert_eq!(result[2]["params"][2][1], json!(-1));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let signer = signer();
        let payloads = ping(&signer);

        assert_eq!(
            signer.sign_payloads(payloads.clone()).unwrap(),
            signer.sign_payloads(payloads).unwrap()
        );
    }

    #[test]
    fn test_upstream_bytes_are_canonicalized() {
        let signer = signer();
        let compact = protocol::encode_payloads(&ping(&signer)).unwrap();
        let spaced = String::from_utf8(compact.clone())
            .unwrap()
            .replace(",", ", ")
            .replace(":", " : ");

        let signed = signer.sign_buffer(spaced.as_bytes()).unwrap();
        assert_eq!(signed, signer.sign_buffer(&compact).unwrap());
        assert!(signed.starts_with(&compact[..compact.len() - 1]));
    }

    #[test]
    fn test_rejects_already_signed() {
        let signer = signer();
        let signed = signer.sign_payloads(ping(&signer)).unwrap();

        assert!(matches!(
            signer.sign_buffer(&signed),
            Err(AuthError::MalformedPayload(_))
        ));
        assert!(matches!(
            signer.sign_buffer(b"{oops"),
            Err(AuthError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_upstream_error_propagates_verbatim() {
        let signer = signer();
        let upstream: Result<OutboundMessage<()>, std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Parse error",
        ));

        let err = signer.serialize(upstream).unwrap_err();
        assert!(matches!(err, AuthError::Upstream(_)));
        assert_eq!(err.to_string(), "Parse error");
    }

    #[test]
    fn test_serialize_keeps_id_and_target() {
        let signer = signer();
        let buffer = protocol::encode_payloads(&ping(&signer)).unwrap();
        let upstream: Result<_, std::io::Error> =
            Ok(OutboundMessage::new("abc", buffer, ("127.0.0.1", 8080)));

        let message = signer.serialize(upstream).unwrap();
        assert_eq!(message.id, "abc");
        assert_eq!(message.target, ("127.0.0.1", 8080));

        let result: Vec<Value> = serde_json::from_slice(&message.buffer).unwrap();
        assert_eq!(result.len(), 3);
    }
}
