//! P2P Module - the seam between the authenticator and a host RPC node
//!
//! The host owns transport, routing and JSON-RPC encoding. This module
//! defines the payload list format the authenticator works on and the
//! traits through which the host receives the peer identity and installs
//! the signing and verifying transforms.

mod node;
pub mod protocol;

pub use node::{MessageTransform, OutboundMessage, PeerHost};
pub use protocol::Payload;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum P2PError {
    #[error("Protocol error: {0}")]
    Protocol(String),
}
