//! BIP32 hierarchical deterministic keys
//!
//! Derivation and the base58check `xprv`/`xpub` forms come from the `bip32`
//! crate over k256. On top of it sit two local rules: a root may be a plain
//! private key wrapped with an all-zero chain code ("flat mode"), and a child
//! index that yields an invalid key moves on to the next index.
//!
//! Children of a flat root are still valid keys, but anyone holding the
//! public key alone can compute every non-hardened child, so the hierarchy
//! gives no unlinkability for that identity.

use super::keys::{PrivateKey, PublicKey, PUBLIC_KEY_LEN};
use super::IdentityError;
use crate::crypto;
use bip32::{ChildNumber, ExtendedKeyAttrs, Prefix, XPrv, XPub};
use k256::SecretKey;
use std::fmt;
use zeroize::Zeroizing;

/// First hardened child number
pub const HARDENED_OFFSET: u32 = ChildNumber::HARDENED_FLAG;

const RANDOM_SEED_LEN: usize = 64;

#[derive(Clone)]
enum Node {
    Private(XPrv),
    Public(XPub),
}

/// An HD node: key material plus chain code and position in the tree
#[derive(Clone)]
pub struct ExtendedKey {
    node: Node,
    private_key: Option<PrivateKey>,
    public_key: PublicKey,
}

impl ExtendedKey {
    /// Build a root node from `seed`, or from 64 fresh random bytes.
    /// Seeds must be 16, 32 or 64 bytes long.
    pub fn from_seed(seed: Option<&[u8]>) -> Result<Self, IdentityError> {
        let seed = match seed {
            Some(seed) => Zeroizing::new(seed.to_vec()),
            None => Zeroizing::new(crypto::random_bytes(RANDOM_SEED_LEN)),
        };

        let root = XPrv::new(seed.as_slice())
            .map_err(|e| IdentityError::KeyDerivation(format!("invalid seed: {}", e)))?;
        Ok(Self::from_node(Node::Private(root)))
    }

    /// Wrap a plain private key as a root node with a zeroed chain code.
    ///
    /// This is the flat-key mode: the result serializes and derives like any
    /// other node, but its chain code is public knowledge.
    pub fn from_flat_private_key(private_key: &PrivateKey) -> Result<Self, IdentityError> {
        let mut key_bytes = Zeroizing::new([0u8; PUBLIC_KEY_LEN]);
        key_bytes[1..].copy_from_slice(&private_key.to_bytes());

        let encoded = bip32::ExtendedKey {
            prefix: Prefix::XPRV,
            attrs: ExtendedKeyAttrs {
                depth: 0,
                parent_fingerprint: [0u8; 4],
                child_number: ChildNumber(0),
                chain_code: [0u8; 32],
            },
            key_bytes: *key_bytes,
        };
        let root = XPrv::try_from(encoded)
            .map_err(|e| IdentityError::KeyDerivation(e.to_string()))?;

        tracing::debug!("Wrapped flat private key as root node");
        Ok(Self::from_node(Node::Private(root)))
    }

    /// Parse a base58check `xprv` or `xpub` string
    pub fn from_extended_key(encoded: &str) -> Result<Self, IdentityError> {
        let invalid = |e: bip32::Error| IdentityError::InvalidExtendedKey(e.to_string());

        let parsed: bip32::ExtendedKey = encoded.parse().map_err(invalid)?;
        let node = if parsed.prefix == Prefix::XPRV {
            Node::Private(XPrv::try_from(parsed).map_err(invalid)?)
        } else if parsed.prefix == Prefix::XPUB {
            Node::Public(XPub::try_from(parsed).map_err(invalid)?)
        } else {
            return Err(IdentityError::InvalidExtendedKey(format!(
                "unsupported version {:?}",
                parsed.prefix
            )));
        };
        Ok(Self::from_node(node))
    }

    fn from_node(node: Node) -> Self {
        let (private_key, point) = match &node {
            Node::Private(xprv) => {
                let secret = SecretKey::from(*xprv.private_key().as_nonzero_scalar());
                let point = secret.public_key();
                (Some(PrivateKey::from(secret)), point)
            }
            Node::Public(xpub) => (None, k256::PublicKey::from(xpub.public_key())),
        };

        Self {
            node,
            private_key,
            public_key: PublicKey::from_point(point),
        }
    }

    fn attrs(&self) -> &ExtendedKeyAttrs {
        match &self.node {
            Node::Private(xprv) => xprv.attrs(),
            Node::Public(xpub) => xpub.attrs(),
        }
    }

    fn xpub(&self) -> XPub {
        match &self.node {
            Node::Private(xprv) => xprv.public_key(),
            Node::Public(xpub) => xpub.clone(),
        }
    }

    /// Derive the child at `index`; `index >= HARDENED_OFFSET` is hardened.
    ///
    /// If the index yields an invalid key (probability below 2^-127) the
    /// next index is used instead, per BIP32.
    pub fn derive_child(&self, index: u32) -> Result<Self, IdentityError> {
        let number = ChildNumber(index);
        let child = match &self.node {
            Node::Private(xprv) => xprv.derive_child(number).map(Node::Private),
            Node::Public(_) if number.is_hardened() => {
                return Err(IdentityError::HardenedFromPublic)
            }
            Node::Public(xpub) => xpub.derive_child(number).map(Node::Public),
        };

        match child {
            Ok(node) => Ok(Self::from_node(node)),
            Err(bip32::Error::Crypto) => {
                let next = index.checked_add(1).ok_or_else(|| {
                    IdentityError::KeyDerivation("child index space exhausted".into())
                })?;
                tracing::debug!(index, "Child index yields an invalid key, skipping");
                self.derive_child(next)
            }
            Err(e) => Err(IdentityError::KeyDerivation(e.to_string())),
        }
    }

    /// Derive along a path such as `m/44'/0'/0/1` (`h` also marks hardened)
    pub fn derive_path(&self, path: &str) -> Result<Self, IdentityError> {
        let mut components = path.split('/');
        match components.next() {
            Some("m") | Some("M") | Some("m'") | Some("M'") => {}
            _ => {
                return Err(IdentityError::InvalidPath(format!(
                    "path must start with 'm': {}",
                    path
                )))
            }
        }

        let mut node = self.clone();
        for component in components {
            let (number, hardened) = match component
                .strip_suffix('\'')
                .or_else(|| component.strip_suffix('h'))
            {
                Some(number) => (number, true),
                None => (component, false),
            };
            let child = number
                .parse()
                .ok()
                .and_then(|index| ChildNumber::new(index, hardened).ok())
                .ok_or_else(|| IdentityError::InvalidPath(format!("bad component: {}", component)))?;
            node = node.derive_child(child.0)?;
        }
        Ok(node)
    }

    /// Public-only copy of this node
    pub fn neuter(&self) -> Self {
        Self::from_node(Node::Public(self.xpub()))
    }

    /// First four bytes of hash160 of the public key
    pub fn fingerprint(&self) -> [u8; 4] {
        self.xpub().fingerprint()
    }

    /// Base58check `xpub` serialization
    pub fn to_xpub(&self) -> String {
        self.xpub().to_string(Prefix::XPUB)
    }

    /// Base58check `xprv` serialization; `None` for public-only nodes
    pub fn to_xprv(&self) -> Option<String> {
        match &self.node {
            Node::Private(xprv) => Some(xprv.to_string(Prefix::XPRV).as_str().to_owned()),
            Node::Public(_) => None,
        }
    }

    pub fn private_key(&self) -> Option<&PrivateKey> {
        self.private_key.as_ref()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.attrs().chain_code
    }

    pub fn depth(&self) -> u8 {
        self.attrs().depth
    }

    pub fn child_number(&self) -> u32 {
        self.attrs().child_number.0
    }

    /// True when the chain code is all zeros (flat-key root)
    pub fn is_flat(&self) -> bool {
        self.attrs().chain_code == [0u8; 32]
    }
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("xpub", &self.to_xpub())
            .field("has_private_key", &self.private_key.is_some())
            .finish()
    }
}
