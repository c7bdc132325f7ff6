//! BIP39 Seed Phrase Implementation
//!
//! A mnemonic is an alternative way to supply the master seed of a peer's
//! key tree; the 64-byte BIP39 seed feeds [`super::ExtendedKey::from_seed`].

use super::IdentityError;
use bip39::Mnemonic;

/// Wrapper around BIP39 mnemonic
pub struct SeedPhrase {
    mnemonic: Mnemonic,
}

impl SeedPhrase {
    /// Generate a new random seed phrase with the given word count
    pub fn generate(word_count: usize) -> Result<Self, IdentityError> {
        let entropy_bits = match word_count {
            12 => 128,
            15 => 160,
            18 => 192,
            21 => 224,
            24 => 256,
            _ => {
                return Err(IdentityError::InvalidSeedPhrase(
                    "Word count must be 12, 15, 18, 21, or 24".to_string(),
                ))
            }
        };

        let entropy = crate::crypto::random_bytes(entropy_bits / 8);
        let mnemonic = Mnemonic::from_entropy(&entropy)
            .map_err(|e| IdentityError::InvalidSeedPhrase(e.to_string()))?;

        Ok(Self { mnemonic })
    }

    /// Parse an existing seed phrase
    pub fn from_phrase(phrase: &str) -> Result<Self, IdentityError> {
        let normalized: Vec<&str> = phrase.split_whitespace().collect();
        let normalized_phrase = normalized.join(" ");

        let mnemonic = Mnemonic::parse_normalized(&normalized_phrase)
            .map_err(|e| IdentityError::InvalidSeedPhrase(e.to_string()))?;

        Ok(Self { mnemonic })
    }

    /// Convert to seed bytes (512 bits) using optional passphrase
    pub fn to_seed(&self, passphrase: &str) -> [u8; 64] {
        self.mnemonic.to_seed(passphrase)
    }

    /// Get individual words
    pub fn words(&self) -> Vec<&str> {
        self.mnemonic.word_iter().collect()
    }
}

impl std::fmt::Display for SeedPhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic)
    }
}
