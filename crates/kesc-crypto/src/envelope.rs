//! AES-EAX envelopes
//!
//! An [`Envelope`] carries the ciphertext, the 16-byte tag, and the 16-byte
//! nonce separately (no associated data). Keys of 16, 24, or 32 bytes select
//! AES-128, AES-192, or AES-256.

use aes::{Aes128, Aes192, Aes256};
use eax::aead::{generic_array::GenericArray, AeadInPlace, KeyInit};
use eax::Eax;
use kesc_core::{EscrowError, EscrowResult, Envelope};
use rand::RngCore;

use crate::{NONCE_SIZE, TAG_SIZE};

/// Dispatch on key length to the matching AES-EAX instance.
macro_rules! with_eax {
    ($key:expr, |$cipher:ident| $body:expr) => {
        match $key.len() {
            16 => {
                let $cipher = Eax::<Aes128>::new_from_slice($key)
                    .map_err(|_| EscrowError::KeyLength($key.len()))?;
                $body
            }
            24 => {
                let $cipher = Eax::<Aes192>::new_from_slice($key)
                    .map_err(|_| EscrowError::KeyLength($key.len()))?;
                $body
            }
            32 => {
                let $cipher = Eax::<Aes256>::new_from_slice($key)
                    .map_err(|_| EscrowError::KeyLength($key.len()))?;
                $body
            }
            n => return Err(EscrowError::KeyLength(n)),
        }
    };
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn seal(key: &[u8], plaintext: &[u8]) -> EscrowResult<Envelope> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let mut buffer = plaintext.to_vec();
    let tag = with_eax!(key, |cipher| cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&nonce), b"", &mut buffer)
        .map_err(|e| anyhow::anyhow!("AES-EAX encryption failed: {e}"))?);

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(Envelope {
        ciphertext: buffer,
        tag: tag_bytes,
        nonce,
    })
}

/// Decrypt and verify `envelope` under `key`.
///
/// A wrong key and a modified ciphertext, tag, or nonce are indistinguishable
/// and both surface as [`EscrowError::Authentication`].
pub fn open(key: &[u8], envelope: &Envelope) -> EscrowResult<Vec<u8>> {
    let mut buffer = envelope.ciphertext.clone();
    let nonce = GenericArray::from_slice(&envelope.nonce);
    let tag = GenericArray::from_slice(&envelope.tag);

    with_eax!(key, |cipher| cipher
        .decrypt_in_place_detached(nonce, b"", &mut buffer, tag)
        .map_err(|_| {
            tracing::debug!("envelope verification failed");
            EscrowError::Authentication
        })?);

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [42u8; 32];

    #[test]
    fn test_seal_open_roundtrip() {
        let env = seal(&KEY, b"hello, escrowed world!").unwrap();
        let plaintext = open(&KEY, &env).unwrap();
        assert_eq!(plaintext, b"hello, escrowed world!");
    }

    #[test]
    fn test_all_aes_key_sizes() {
        for len in [16usize, 24, 32] {
            let key = vec![7u8; len];
            let env = seal(&key, b"data").unwrap();
            assert_eq!(open(&key, &env).unwrap(), b"data", "key length {len}");
        }
    }

    #[test]
    fn test_empty_plaintext() {
        let env = seal(&KEY, b"").unwrap();
        assert!(env.ciphertext.is_empty());
        assert_eq!(open(&KEY, &env).unwrap(), b"");
    }

    #[test]
    fn test_ciphertext_length_matches_plaintext() {
        let env = seal(&KEY, &[0u8; 1000]).unwrap();
        assert_eq!(env.ciphertext.len(), 1000);
        assert_eq!(env.tag.len(), TAG_SIZE);
        assert_eq!(env.nonce.len(), NONCE_SIZE);
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let a = seal(&KEY, b"same").unwrap();
        let b = seal(&KEY, b"same").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_key_too_long() {
        let key = [0u8; 33];
        assert!(matches!(seal(&key, b"x"), Err(EscrowError::KeyLength(33))));

        let env = seal(&KEY, b"x").unwrap();
        assert!(matches!(open(&key, &env), Err(EscrowError::KeyLength(33))));
    }

    #[test]
    fn test_non_aes_key_length() {
        assert!(matches!(
            seal(&[0u8; 20], b"x"),
            Err(EscrowError::KeyLength(20))
        ));
    }

    #[test]
    fn test_wrong_key() {
        let env = seal(&KEY, b"secret data").unwrap();
        let result = open(&[1u8; 32], &env);
        assert!(matches!(result, Err(EscrowError::Authentication)));
    }

    #[test]
    fn test_tampered_parts() {
        let env = seal(&KEY, b"secret data").unwrap();

        let mut ct = env.clone();
        ct.ciphertext[0] ^= 0x01;
        assert!(matches!(open(&KEY, &ct), Err(EscrowError::Authentication)));

        let mut tag = env.clone();
        tag.tag[15] ^= 0x80;
        assert!(matches!(open(&KEY, &tag), Err(EscrowError::Authentication)));

        let mut nonce = env;
        nonce.nonce[0] ^= 0xFF;
        assert!(matches!(open(&KEY, &nonce), Err(EscrowError::Authentication)));
    }
}
