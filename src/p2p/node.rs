//! Host node integration

use crate::auth::AuthError;
use crate::crypto::Identity;
use crate::identity::DerivationIndex;
use std::sync::Arc;

/// A serialized outbound message as produced by the host's JSON-RPC
/// serializer: message id, encoded payload list, and opaque routing target.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage<T> {
    pub id: String,
    pub buffer: Vec<u8>,
    pub target: T,
}

impl<T> OutboundMessage<T> {
    pub fn new(id: impl Into<String>, buffer: Vec<u8>, target: T) -> Self {
        Self {
            id: id.into(),
            buffer,
            target,
        }
    }

    /// Replace the buffer, keeping id and target untouched
    pub fn try_map_buffer<E>(
        self,
        f: impl FnOnce(Vec<u8>) -> Result<Vec<u8>, E>,
    ) -> Result<Self, E> {
        Ok(Self {
            id: self.id,
            buffer: f(self.buffer)?,
            target: self.target,
        })
    }
}

/// A byte-level stage of the host's RPC pipeline.
///
/// Implementations must be callable from many in-flight messages at once.
pub trait MessageTransform: Send + Sync {
    fn transform(&self, buffer: Vec<u8>) -> Result<Vec<u8>, AuthError>;
}

/// What the authenticator needs from a host node.
///
/// The host keeps ownership of its contact record, router and pipeline;
/// [`crate::PeerAuthenticator::install`] only calls these hooks.
pub trait PeerHost {
    /// Replace the node's (and its router's) identity
    fn set_identity(&mut self, identity: Identity);

    /// Advertise the key proof material in the node's contact record
    fn set_contact_keys(&mut self, public_extended_key: String, derivation_index: DerivationIndex);

    /// Add a stage after the JSON-RPC serializer
    fn append_serializer(&mut self, transform: Arc<dyn MessageTransform>);

    /// Add a stage before the JSON-RPC deserializer
    fn prepend_deserializer(&mut self, transform: Arc<dyn MessageTransform>);
}
