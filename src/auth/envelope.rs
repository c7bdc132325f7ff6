//! The `AUTHENTICATE` notification
//!
//! ```text
//! {"jsonrpc":"2.0","method":"AUTHENTICATE",
//!  "params":[<signature>, <public key hex>, [<xpub>, <derivation index>]]}
//! ```
//!
//! Signers always emit the third element; flat-key peers send index `-1`.

use super::AuthError;
use crate::p2p::protocol::{self, Payload, AUTHENTICATE};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use k256::ecdsa::{RecoveryId, Signature};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// How the signature field is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureEncoding {
    /// base64 of `recovery_id ‖ r ‖ s` (65 bytes)
    #[default]
    Base64Recoverable,
    /// hex of `r ‖ s` (64 bytes)
    HexCompact,
}

impl SignatureEncoding {
    pub fn encode(self, signature: &Signature, recovery_id: RecoveryId) -> String {
        match self {
            Self::Base64Recoverable => {
                let mut bytes = Vec::with_capacity(65);
                bytes.push(recovery_id.to_byte());
                bytes.extend_from_slice(&signature.to_bytes());
                STANDARD.encode(bytes)
            }
            Self::HexCompact => hex::encode(signature.to_bytes()),
        }
    }

    /// Decode either 65 bytes (with recovery id) or 64 bytes (without)
    pub fn decode(self, field: &str) -> Result<(Signature, Option<RecoveryId>), AuthError> {
        let bytes = match self {
            Self::Base64Recoverable => STANDARD.decode(field).ok(),
            Self::HexCompact => hex::decode(field).ok(),
        }
        .ok_or(AuthError::InvalidSignature)?;

        let (recovery_id, compact) = match bytes.len() {
            65 => (
                Some(RecoveryId::from_byte(bytes[0]).ok_or(AuthError::InvalidSignature)?),
                &bytes[1..],
            ),
            64 => (None, &bytes[..]),
            _ => return Err(AuthError::InvalidSignature),
        };

        let signature = Signature::from_slice(compact).map_err(|_| AuthError::InvalidSignature)?;
        Ok((signature, recovery_id))
    }
}

/// Extended public key and index proving where the signing key came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyProof {
    pub public_extended_key: String,
    pub derivation_index: i64,
}

/// Parsed params of an `AUTHENTICATE` notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticateParams {
    pub signature: String,
    pub public_key_hex: String,
    pub key_proof: Option<KeyProof>,
}

impl AuthenticateParams {
    pub fn to_payload(&self) -> Payload {
        let mut params = vec![
            Value::String(self.signature.clone()),
            Value::String(self.public_key_hex.clone()),
        ];
        if let Some(proof) = &self.key_proof {
            params.push(json!([proof.public_extended_key, proof.derivation_index]));
        }
        protocol::notification(AUTHENTICATE, Value::Array(params))
    }

    pub fn from_payload(payload: &Payload) -> Result<Self, AuthError> {
        if protocol::method_of(payload) != Some(AUTHENTICATE) {
            return Err(AuthError::MalformedPayload("not an AUTHENTICATE notification".into()));
        }
        let params = protocol::params_of(payload)
            .ok_or_else(|| AuthError::MalformedPayload("AUTHENTICATE has no params".into()))?;

        let field = |i: usize, name: &str| {
            params
                .get(i)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or_else(|| AuthError::MalformedPayload(format!("AUTHENTICATE {} missing", name)))
        };
        let signature = field(0, "signature")?;
        let public_key_hex = field(1, "public key")?;

        let key_proof = match params.get(2) {
            None | Some(Value::Null) => None,
            Some(Value::Array(proof)) => match proof.as_slice() {
                [Value::String(xpub), index] => Some(KeyProof {
                    public_extended_key: xpub.clone(),
                    derivation_index: index.as_i64().ok_or_else(|| {
                        AuthError::MalformedPayload("derivation index is not an integer".into())
                    })?,
                }),
                _ => {
                    return Err(AuthError::MalformedPayload(
                        "key proof must be [xpub, index]".into(),
                    ))
                }
            },
            Some(_) => {
                return Err(AuthError::MalformedPayload(
                    "key proof must be [xpub, index]".into(),
                ))
            }
        };

        Ok(Self {
            signature,
            public_key_hex,
            key_proof,
        })
    }
}
