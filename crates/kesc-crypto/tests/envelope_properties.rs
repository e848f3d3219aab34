//! Property tests for envelopes and derivation.

use kesc_core::EscrowError;
use kesc_crypto::{content_hash, open, seal, storage_id, Derived, Secret};
use proptest::prelude::*;

proptest! {
    #[test]
    fn seal_open_roundtrip(key in proptest::collection::vec(any::<u8>(), 32), msg in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let env = seal(&key, &msg).unwrap();
        prop_assert_eq!(open(&key, &env).unwrap(), msg);
    }

    #[test]
    fn any_ciphertext_bit_flip_is_rejected(msg in proptest::collection::vec(any::<u8>(), 1..512), idx in any::<prop::sample::Index>(), bit in 0u8..8) {
        let key = [3u8; 32];
        let mut env = seal(&key, &msg).unwrap();
        let i = idx.index(env.ciphertext.len());
        env.ciphertext[i] ^= 1 << bit;
        prop_assert!(matches!(open(&key, &env), Err(EscrowError::Authentication)));
    }

    #[test]
    fn derivation_is_deterministic(ct in proptest::collection::vec(any::<u8>(), 0..256), secret in proptest::collection::vec(any::<u8>(), 1..=32)) {
        let secret = Secret::new(&secret).unwrap();
        let a = Derived::new(&ct, &secret);
        let b = Derived::new(&ct, &secret);
        prop_assert_eq!(a.storage_id, b.storage_id);
        prop_assert!(a.auth_token.matches(&b.auth_token));
        prop_assert_eq!(a.wrap_key.as_bytes(), b.wrap_key.as_bytes());
        prop_assert_eq!(a.storage_id, storage_id(&content_hash(&ct)));
    }
}
