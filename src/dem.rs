// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data encapsulation mechanisms for the payload.
//!
//! Both authenticated modes use a key derived freshly for every encryption,
//! so the AES-GCM nonce can be a fixed constant. The HMAC-CTR mode exists for
//! environments that need to verify decryption on-chain; it is built from
//! HMAC-SHA3-256 only.

use aes_gcm::AesGcm;
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use hmac::{Hmac, Mac};
use sha3::Sha3_256;
use subtle::ConstantTimeEq;

use crate::error::Error;
use crate::kdf::KEY_SIZE;
use crate::object::Ciphertext;
use crate::rng::Rng;

/// What to encrypt and in which mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncryptionInput {
    Aes256Gcm { data: Vec<u8>, aad: Option<Vec<u8>> },
    Hmac256Ctr { data: Vec<u8>, aad: Option<Vec<u8>> },
    /// No payload; the derived key itself is the secret being shared.
    Plain,
}

impl EncryptionInput {
    /// A fresh key suitable for any of the modes.
    pub fn generate_key(rng: &Rng) -> Result<[u8; KEY_SIZE], Error> {
        Ok(rng.random_array()?)
    }

    pub(crate) fn encrypt(&self, key: &[u8; KEY_SIZE]) -> Ciphertext {
        match self {
            EncryptionInput::Aes256Gcm { data, aad } => Ciphertext::Aes256Gcm {
                blob: Aes256Gcm::encrypt(key, data, aad.as_deref().unwrap_or_default()),
                aad: aad.clone(),
            },
            EncryptionInput::Hmac256Ctr { data, aad } => {
                let (blob, mac) =
                    Hmac256Ctr::encrypt(key, data, aad.as_deref().unwrap_or_default());
                Ciphertext::Hmac256Ctr {
                    blob,
                    aad: aad.clone(),
                    mac,
                }
            }
            EncryptionInput::Plain => Ciphertext::Plain,
        }
    }
}

impl Ciphertext {
    /// Decrypt the payload with the DEM key. In `Plain` mode the key itself
    /// is returned.
    pub(crate) fn decrypt(&self, key: &[u8; KEY_SIZE]) -> Result<Vec<u8>, Error> {
        match self {
            Ciphertext::Aes256Gcm { blob, aad } => {
                Aes256Gcm::decrypt(key, blob, aad.as_deref().unwrap_or_default())
            }
            Ciphertext::Hmac256Ctr { blob, aad, mac } => {
                Hmac256Ctr::decrypt(key, blob, aad.as_deref().unwrap_or_default(), mac)
            }
            Ciphertext::Plain => Ok(key.to_vec()),
        }
    }
}

/// AES-256-GCM with a 16-byte nonce.
pub struct Aes256Gcm;

type Aes256Gcm16 = AesGcm<aes_gcm::aes::Aes256, U16>;

impl Aes256Gcm {
    /// Fixed nonce; keys are single-use so this is safe.
    const IV: [u8; 16] = [
        138, 55, 153, 253, 198, 46, 121, 219, 160, 128, 89, 7, 214, 156, 148, 220,
    ];

    pub fn encrypt(key: &[u8; KEY_SIZE], msg: &[u8], aad: &[u8]) -> Vec<u8> {
        Aes256Gcm16::new(key.into())
            .encrypt((&Self::IV).into(), Payload { msg, aad })
            .expect("aes-gcm encryption does not fail")
    }

    pub fn decrypt(key: &[u8; KEY_SIZE], blob: &[u8], aad: &[u8]) -> Result<Vec<u8>, Error> {
        Aes256Gcm16::new(key.into())
            .decrypt((&Self::IV).into(), Payload { msg: blob, aad })
            .map_err(|_| Error::Decryption)
    }
}

/// Counter-mode encryption with an encrypt-then-MAC tag, both HMAC-SHA3-256.
pub struct Hmac256Ctr;

impl Hmac256Ctr {
    pub fn encrypt(key: &[u8; KEY_SIZE], msg: &[u8], aad: &[u8]) -> (Vec<u8>, [u8; KEY_SIZE]) {
        let blob = apply_keystream(key, msg);
        let mac = Self::mac(key, aad, &blob);
        (blob, mac)
    }

    pub fn decrypt(
        key: &[u8; KEY_SIZE],
        blob: &[u8],
        aad: &[u8],
        mac: &[u8; KEY_SIZE],
    ) -> Result<Vec<u8>, Error> {
        let expected = Self::mac(key, aad, blob);
        if expected.ct_eq(mac).into() {
            Ok(apply_keystream(key, blob))
        } else {
            Err(Error::Decryption)
        }
    }

    /// Tag over the length-prefixed aad followed by the ciphertext.
    fn mac(key: &[u8; KEY_SIZE], aad: &[u8], blob: &[u8]) -> [u8; KEY_SIZE] {
        let mac_key = hmac_sha3_256(key, &[2]);
        let mut input = Vec::with_capacity(8 + aad.len() + blob.len());
        input.extend_from_slice(&(aad.len() as u64).to_le_bytes());
        input.extend_from_slice(aad);
        input.extend_from_slice(blob);
        hmac_sha3_256(&mac_key, &input)
    }
}

/// XOR the message with a keystream of per-block HMAC outputs. Involutive,
/// so it both encrypts and decrypts.
fn apply_keystream(key: &[u8; KEY_SIZE], msg: &[u8]) -> Vec<u8> {
    let encryption_key = hmac_sha3_256(key, &[1]);
    msg.chunks(KEY_SIZE)
        .enumerate()
        .flat_map(|(i, block)| {
            let mask = hmac_sha3_256(&encryption_key, &(i as u64).to_le_bytes());
            block
                .iter()
                .zip(mask)
                .map(|(b, m)| b ^ m)
                .collect::<Vec<u8>>()
        })
        .collect()
}

fn hmac_sha3_256(key: &[u8], data: &[u8]) -> [u8; KEY_SIZE] {
    // `KeyInit` is also in scope for AES-GCM, so name the trait explicitly.
    let mut mac =
        <Hmac<Sha3_256> as Mac>::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}
