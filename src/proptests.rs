use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::{AuthError, SignatureEncoding, Signer, Verifier};
use crate::identity::{is_valid_child, DerivationIndex, ExtendedKey, KeyPair, PeerKeys, PrivateKey};
use crate::p2p::protocol;

fn signer_from(secret: [u8; 32]) -> Option<Signer> {
    let private_key = PrivateKey::from_bytes(&secret).ok()?;
    let root = ExtendedKey::from_flat_private_key(&private_key).ok()?;
    let keys = PeerKeys::new(root, None, DerivationIndex::Flat).ok()?;
    Some(Signer::new(Arc::new(keys), SignatureEncoding::default()))
}

fn message(signer: &Signer, method: &str, params: &[String]) -> Vec<Value> {
    vec![
        protocol::request("id", method, json!(params)),
        protocol::identify(&signer.keys().identity(), json!({ "port": 8080 })),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // Sign then verify yields the original application payloads
    #[test]
    fn test_sign_verify_round_trip(
        secret in any::<[u8; 32]>(),
        method in "[A-Z_]{1,12}",
        params in prop::collection::vec(".*", 0..4),
    ) {
        let Some(signer) = signer_from(secret) else { return Ok(()); };
        let payloads = message(&signer, &method, &params);

        let signed = signer.sign_payloads(payloads.clone()).unwrap();
        let verified = Verifier::new(SignatureEncoding::default(), true)
            .verify(signed)
            .unwrap();

        prop_assert_eq!(verified.payloads, payloads);
        prop_assert_eq!(verified.identity, signer.keys().identity());
    }

    // Changing any application string value breaks the signature
    #[test]
    fn test_tampered_param_detected(
        secret in any::<[u8; 32]>(),
        params in prop::collection::vec("[a-z]{1,8}", 1..4),
        which in any::<prop::sample::Index>(),
    ) {
        let Some(signer) = signer_from(secret) else { return Ok(()); };
        let signed = signer.sign_payloads(message(&signer, "STORE", &params)).unwrap();

        let mut edited: Vec<Value> = serde_json::from_slice(&signed).unwrap();
        let i = which.index(params.len());
        edited[0]["params"][i] = json!(format!("{}!", params[i]));
        let tampered = serde_json::to_vec(&edited).unwrap();

        let result = Verifier::new(SignatureEncoding::default(), true).verify(tampered);
        prop_assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    // Flipping bits of any byte covered by the signature is rejected
    #[test]
    fn test_flipped_byte_rejected(
        secret in any::<[u8; 32]>(),
        params in prop::collection::vec("[a-z0-9 ]{0,8}", 0..4),
        offset in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let Some(signer) = signer_from(secret) else { return Ok(()); };
        let payloads = message(&signer, "STORE", &params);
        let covered = protocol::encode_payloads(&payloads).unwrap().len();
        let mut signed = signer.sign_payloads(payloads).unwrap();

        // Skip the list's opening bracket; the covered payloads end before
        // the comma that joins AUTHENTICATE
        let i = 1 + offset.index(covered - 2);
        signed[i] ^= mask;

        let result = Verifier::new(SignatureEncoding::default(), true).verify(signed);
        prop_assert!(matches!(
            result,
            Err(AuthError::InvalidSignature)
                | Err(AuthError::MalformedPayload(_))
                | Err(AuthError::IdentityMismatch)
        ));
    }

    // A child verifies at its own index and not at the next one
    #[test]
    fn test_child_index_binding(
        seed in prop::sample::select(vec![16usize, 32, 64])
            .prop_flat_map(|len| prop::collection::vec(any::<u8>(), len)),
        index in 0u32..1_000_000,
    ) {
        let root = ExtendedKey::from_seed(Some(&seed)).unwrap();
        let xpub = root.to_xpub();
        let child = root.derive_child(index).unwrap().public_key().to_hex();

        prop_assert!(is_valid_child(&child, &xpub, DerivationIndex::Child(index)));
        prop_assert!(!is_valid_child(&child, &xpub, DerivationIndex::Child(index + 1)));
    }

    // Generated keys are always accepted by public key derivation
    #[test]
    fn test_generated_keys_valid(_round in 0u8..8) {
        let pair = KeyPair::generate();
        prop_assert!(PrivateKey::from_bytes(&pair.private_key.to_bytes()).is_ok());
        prop_assert_eq!(pair.public_key.as_bytes().len(), 33);
    }
}
