//! Identity Module - secp256k1 keys, BIP32 key trees and peer identities
//!
//! A peer signs with a child of its extended key (or with the extended key
//! itself when the derivation index is the flat sentinel `-1`), and its
//! network identity is the hash160 of that signing key's public half.

mod hdkey;
mod keys;
mod seed;

pub use hdkey::{ExtendedKey, HARDENED_OFFSET};
pub use keys::{create_private_key, derive_public_key, KeyPair, PrivateKey, PublicKey, PUBLIC_KEY_LEN};
pub use seed::SeedPhrase;

use crate::crypto::{self, Identity};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid extended key: {0}")]
    InvalidExtendedKey(String),

    #[error("Invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("Cannot derive a hardened child from a public extended key")]
    HardenedFromPublic,

    #[error("Derivation index {0} is not -1 or a non-hardened child index")]
    HardenedIndex(i64),

    #[error("Invalid seed phrase: {0}")]
    InvalidSeedPhrase(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] crypto::CryptoError),
}

/// Which key of an extended key a peer signs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivationIndex {
    /// Use the extended key's own key material (wire value `-1`)
    Flat,
    /// Non-hardened child at this index
    Child(u32),
}

impl DerivationIndex {
    /// Wire value reserved for [`DerivationIndex::Flat`]
    pub const FLAT_SENTINEL: i64 = -1;

    /// Interpret a wire integer. Hardened indices are rejected because a
    /// verifier holding only the public extended key could not check them.
    pub fn from_wire(value: i64) -> Result<Self, IdentityError> {
        match value {
            Self::FLAT_SENTINEL => Ok(Self::Flat),
            v if (0..i64::from(HARDENED_OFFSET)).contains(&v) => Ok(Self::Child(v as u32)),
            v => Err(IdentityError::HardenedIndex(v)),
        }
    }

    pub fn to_wire(self) -> i64 {
        match self {
            Self::Flat => Self::FLAT_SENTINEL,
            Self::Child(index) => i64::from(index),
        }
    }

    /// Select the signing node under `root`
    pub fn select(self, root: &ExtendedKey) -> Result<ExtendedKey, IdentityError> {
        match self {
            Self::Flat => Ok(root.clone()),
            Self::Child(index) => root.derive_child(index),
        }
    }
}

impl Serialize for DerivationIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.to_wire())
    }
}

impl<'de> Deserialize<'de> for DerivationIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        Self::from_wire(value).map_err(serde::de::Error::custom)
    }
}

/// Where a peer's keys come from.
///
/// Root precedence: `private_extended_key`, then `private_key` (flat
/// mode), then `seed_hex`, then `mnemonic`, then a fresh random seed.
/// `derivation_path` is applied to the root before `derivation_index`,
/// which defaults to `-1` for a flat private key and `0` otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Base58check `xprv`
    pub private_extended_key: Option<String>,

    /// Plain 32-byte private key, hex
    pub private_key: Option<String>,

    /// Master seed, hex (16, 32 or 64 bytes)
    pub seed_hex: Option<String>,

    /// BIP39 mnemonic for the master seed
    pub mnemonic: Option<String>,

    /// BIP39 passphrase, used with `mnemonic`
    pub passphrase: Option<String>,

    /// BIP32 path applied to the root, e.g. `m/0'/7`
    pub derivation_path: Option<String>,

    /// Child index of the signing key, or `-1` for the root itself
    pub derivation_index: Option<i64>,
}

impl KeyConfig {
    /// Config for an existing `xprv` and index
    pub fn extended(xprv: impl Into<String>, derivation_index: i64) -> Self {
        Self {
            private_extended_key: Some(xprv.into()),
            derivation_index: Some(derivation_index),
            ..Self::default()
        }
    }

    /// Config for a plain private key used as-is
    pub fn flat(private_key: &PrivateKey) -> Self {
        Self {
            private_key: Some(hex::encode(private_key.to_bytes())),
            ..Self::default()
        }
    }
}

/// Immutable key bundle of one peer
#[derive(Debug, Clone)]
pub struct PeerKeys {
    /// Extended key after `derivation_path`, advertised to verifiers
    hd_key: ExtendedKey,
    derivation_index: DerivationIndex,
    signing_key: KeyPair,
    identity: Identity,
}

impl PeerKeys {
    /// Build the key bundle described by `config`
    pub fn from_config(config: &KeyConfig) -> Result<Self, IdentityError> {
        let (root, default_index) = if let Some(xprv) = &config.private_extended_key {
            let root = ExtendedKey::from_extended_key(xprv)?;
            if root.private_key().is_none() {
                return Err(IdentityError::InvalidExtendedKey(
                    "a private extended key is required".into(),
                ));
            }
            (root, DerivationIndex::Child(0))
        } else if let Some(private_key) = &config.private_key {
            let private_key = PrivateKey::from_hex(private_key)?;
            (
                ExtendedKey::from_flat_private_key(&private_key)?,
                DerivationIndex::Flat,
            )
        } else if let Some(seed_hex) = &config.seed_hex {
            let seed = hex::decode(seed_hex)
                .map_err(|e| IdentityError::Crypto(crypto::CryptoError::InvalidData(e.to_string())))?;
            (ExtendedKey::from_seed(Some(&seed))?, DerivationIndex::Child(0))
        } else if let Some(mnemonic) = &config.mnemonic {
            let phrase = SeedPhrase::from_phrase(mnemonic)?;
            tracing::debug!(words = phrase.words().len(), "Using mnemonic root");
            let seed = phrase.to_seed(config.passphrase.as_deref().unwrap_or(""));
            (ExtendedKey::from_seed(Some(&seed))?, DerivationIndex::Child(0))
        } else {
            (ExtendedKey::from_seed(None)?, DerivationIndex::Child(0))
        };

        let derivation_index = match config.derivation_index {
            Some(value) => DerivationIndex::from_wire(value)?,
            None => default_index,
        };

        Self::new(root, config.derivation_path.as_deref(), derivation_index)
    }

    /// Build from a root, an optional path, and the signing key selector
    pub fn new(
        root: ExtendedKey,
        derivation_path: Option<&str>,
        derivation_index: DerivationIndex,
    ) -> Result<Self, IdentityError> {
        let hd_key = match derivation_path {
            Some(path) => root.derive_path(path)?,
            None => root,
        };

        let signing_node = derivation_index.select(&hd_key)?;
        let private_key = signing_node
            .private_key()
            .cloned()
            .ok_or(IdentityError::InvalidPrivateKey)?;
        let signing_key = KeyPair::from_private_key(private_key);
        let identity = signing_key.identity();

        tracing::debug!(
            %identity,
            depth = hd_key.depth(),
            flat_root = hd_key.is_flat(),
            index = derivation_index.to_wire(),
            "Derived peer signing key"
        );

        Ok(Self {
            hd_key,
            derivation_index,
            signing_key,
            identity,
        })
    }

    /// Fresh random seed, child index 0
    pub fn generate() -> Result<Self, IdentityError> {
        Self::from_config(&KeyConfig::default())
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.signing_key.public_key
    }

    pub(crate) fn private_key(&self) -> &PrivateKey {
        &self.signing_key.private_key
    }

    pub fn public_extended_key(&self) -> String {
        self.hd_key.to_xpub()
    }

    pub fn private_extended_key(&self) -> Option<String> {
        self.hd_key.to_xprv()
    }

    pub fn derivation_index(&self) -> DerivationIndex {
        self.derivation_index
    }

    /// True when the signing key is the extended key's own key
    pub fn is_flat(&self) -> bool {
        self.derivation_index == DerivationIndex::Flat
    }
}

/// Check that `public_key_hex` is the key selected by `index` under the
/// public extended key `xpub`.
///
/// With [`DerivationIndex::Flat`] the comparison is against `xpub`'s own
/// public key with no derivation step. Unparsable input is never valid.
pub fn is_valid_child(public_key_hex: &str, xpub: &str, index: DerivationIndex) -> bool {
    let Ok(node) = ExtendedKey::from_extended_key(xpub) else {
        return false;
    };
    let node = node.neuter();

    let expected = match index {
        DerivationIndex::Flat => *node.public_key(),
        DerivationIndex::Child(i) => match node.derive_child(i) {
            Ok(child) => *child.public_key(),
            Err(_) => return false,
        },
    };

    expected.to_hex() == public_key_hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_generates_child_zero() {
        let keys = PeerKeys::generate().unwrap();

        assert_eq!(keys.derivation_index(), DerivationIndex::Child(0));
        assert!(!keys.is_flat());
        assert_eq!(keys.identity(), keys.public_key().identity());
        assert!(is_valid_child(
            &keys.public_key().to_hex(),
            &keys.public_extended_key(),
            DerivationIndex::Child(0)
        ));
    }

    #[test]
    fn test_identity_recovery_from_xprv() {
        let original = PeerKeys::from_config(&KeyConfig {
            derivation_index: Some(3),
            ..KeyConfig::default()
        })
        .unwrap();
        let xprv = original.private_extended_key().unwrap();

        let recovered = PeerKeys::from_config(&KeyConfig::extended(xprv, 3)).unwrap();
        assert_eq!(original.identity(), recovered.identity());
        assert_eq!(original.public_extended_key(), recovered.public_extended_key());
    }

    #[test]
    fn test_flat_private_key_defaults_to_sentinel() {
        let private_key = create_private_key();
        let keys = PeerKeys::from_config(&KeyConfig::flat(&private_key)).unwrap();

        assert!(keys.is_flat());
        assert_eq!(keys.public_key(), &derive_public_key(&private_key));
        assert!(is_valid_child(
            &keys.public_key().to_hex(),
            &keys.public_extended_key(),
            DerivationIndex::Flat
        ));
    }

    #[test]
    fn test_mnemonic_and_path() {
        let config = KeyConfig {
            mnemonic: Some(SeedPhrase::generate(12).unwrap().to_string()),
            passphrase: Some("hunter2".into()),
            derivation_path: Some("m/0'/1".into()),
            derivation_index: Some(7),
            ..KeyConfig::default()
        };

        let a = PeerKeys::from_config(&config).unwrap();
        let b = PeerKeys::from_config(&config).unwrap();
        assert_eq!(a.identity(), b.identity());

        let xpub = ExtendedKey::from_extended_key(&a.public_extended_key()).unwrap();
        assert_eq!(xpub.depth(), 2);
    }

    #[test]
    fn test_extended_key_takes_precedence() {
        let root = ExtendedKey::from_seed(None).unwrap();
        let config = KeyConfig {
            private_extended_key: root.to_xprv(),
            private_key: Some(hex::encode(create_private_key().to_bytes())),
            ..KeyConfig::default()
        };

        let keys = PeerKeys::from_config(&config).unwrap();
        assert_eq!(keys.public_extended_key(), root.to_xpub());
        assert_eq!(keys.derivation_index(), DerivationIndex::Child(0));
    }

    #[test]
    fn test_xpub_config_rejected() {
        let root = ExtendedKey::from_seed(None).unwrap();
        assert!(matches!(
            PeerKeys::from_config(&KeyConfig::extended(root.to_xpub(), 0)),
            Err(IdentityError::InvalidExtendedKey(_))
        ));
    }

    #[test]
    fn test_derivation_index_wire_form() {
        assert_eq!(DerivationIndex::from_wire(-1).unwrap(), DerivationIndex::Flat);
        assert_eq!(DerivationIndex::from_wire(5).unwrap(), DerivationIndex::Child(5));
        assert!(DerivationIndex::from_wire(-2).is_err());
        assert!(DerivationIndex::from_wire(i64::from(HARDENED_OFFSET)).is_err());

        assert_eq!(serde_json::to_string(&DerivationIndex::Flat).unwrap(), "-1");
        let parsed: DerivationIndex = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, DerivationIndex::Child(3));
    }

    #[test]
    fn test_is_valid_child() {
        let root = ExtendedKey::from_seed(None).unwrap();
        let xpub = root.to_xpub();
        let child = root.derive_child(4).unwrap().public_key().to_hex();

        assert!(is_valid_child(&child, &xpub, DerivationIndex::Child(4)));
        assert!(!is_valid_child(&child, &xpub, DerivationIndex::Child(5)));
        assert!(!is_valid_child(&child, &xpub, DerivationIndex::Flat));
        assert!(!is_valid_child(&child, "garbage", DerivationIndex::Child(4)));
    }

    #[test]
    fn test_flat_sentinel_ignores_child_zero() {
        let root = ExtendedKey::from_seed(None).unwrap();
        let xpub = root.to_xpub();
        let own = root.public_key().to_hex();
        let child_zero = root.derive_child(0).unwrap().public_key().to_hex();

        assert!(is_valid_child(&own, &xpub, DerivationIndex::Flat));
        assert!(!is_valid_child(&child_zero, &xpub, DerivationIndex::Flat));
        assert!(!is_valid_child(&own, &xpub, DerivationIndex::Child(0)));
    }
}
