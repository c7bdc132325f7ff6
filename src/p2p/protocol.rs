//! JSON-RPC payload lists as exchanged between peers
//!
//! A message on the wire is a JSON array of JSON-RPC 2.0 objects: the call
//! or response, an `IDENTIFY` notification announcing the sender, and (once
//! signed) a trailing `AUTHENTICATE` notification.
//!
//! The canonical byte form of a list is compact `serde_json` output with
//! object keys in received/inserted order and numbers kept as written.
//! Signer and verifier both hash exactly this form, so it must not change
//! between versions. Received signed messages must already be canonical:
//! a buffer that does not re-encode to itself is rejected, so the bytes
//! handed on are the bytes that were signed.

use super::P2PError;
use crate::crypto::Identity;
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";

/// Method of the signature notification appended to every signed message
pub const AUTHENTICATE: &str = "AUTHENTICATE";

/// Method of the notification announcing the sender's identity and contact
pub const IDENTIFY: &str = "IDENTIFY";

pub const PING: &str = "PING";

/// One JSON-RPC object (request, response or notification)
pub type Payload = Value;

/// Build a JSON-RPC request
pub fn request(id: &str, method: &str, params: Value) -> Payload {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Build a JSON-RPC notification (no id)
pub fn notification(method: &str, params: Value) -> Payload {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": method,
        "params": params,
    })
}

/// Build the `IDENTIFY` notification for `identity` reachable at `contact`
pub fn identify(identity: &Identity, contact: Value) -> Payload {
    notification(IDENTIFY, json!([identity.to_hex(), contact]))
}

/// Method name, if the payload is a request or notification
pub fn method_of(payload: &Payload) -> Option<&str> {
    payload.get("method").and_then(Value::as_str)
}

/// Positional params, if present
pub fn params_of(payload: &Payload) -> Option<&Vec<Value>> {
    payload.get("params").and_then(Value::as_array)
}

/// Decode a buffer into a payload list
pub fn parse_payloads(buffer: &[u8]) -> Result<Vec<Payload>, P2PError> {
    let value: Value = serde_json::from_slice(buffer)
        .map_err(|e| P2PError::Protocol(format!("invalid JSON: {}", e)))?;

    let Value::Array(payloads) = value else {
        return Err(P2PError::Protocol("payload is not a list".into()));
    };

    if let Some(position) = payloads.iter().position(|p| !p.is_object()) {
        return Err(P2PError::Protocol(format!(
            "element {} is not a JSON-RPC object",
            position
        )));
    }

    Ok(payloads)
}

/// Decode a buffer that must already be in canonical form. Whitespace,
/// escapes serde_json would not emit, and duplicate keys all fail.
pub fn parse_canonical_payloads(buffer: &[u8]) -> Result<Vec<Payload>, P2PError> {
    let payloads = parse_payloads(buffer)?;
    if encode_payloads(&payloads)? != buffer {
        return Err(P2PError::Protocol("payload is not in canonical form".into()));
    }
    Ok(payloads)
}

/// Canonical byte encoding of a payload list
pub fn encode_payloads(payloads: &[Payload]) -> Result<Vec<u8>, P2PError> {
    serde_json::to_vec(payloads).map_err(|e| P2PError::Protocol(e.to_string()))
}

/// Identity announced by the `IDENTIFY` notification in `payloads`
pub fn claimed_identity(payloads: &[Payload]) -> Result<Identity, P2PError> {
    let identify = payloads
        .iter()
        .find(|p| method_of(p) == Some(IDENTIFY))
        .ok_or_else(|| P2PError::Protocol("missing IDENTIFY notification".into()))?;

    let identity_hex = params_of(identify)
        .and_then(|params| params.first())
        .and_then(Value::as_str)
        .ok_or_else(|| P2PError::Protocol("IDENTIFY carries no identity".into()))?;

    Identity::from_hex(identity_hex).map_err(|e| P2PError::Protocol(e.to_string()))
}
