// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key derivation.
//!
//! Two derivations are used: masking keys for IBE-encrypted shares, derived
//! from a pairing output, and purpose-tagged keys derived from the shared
//! base key. Both are HKDF-SHA3-256 and must be byte-stable, the derived
//! values are part of the ciphertext format.

use hkdf::Hkdf;
use sha3::Sha3_256;

use crate::bls::{G1Element, G2Element, GtElement};
use crate::object::ObjectId;

pub const KEY_SIZE: usize = 32;

/// Derive the mask for a single IBE-encrypted share.
///
/// The pairing output is bound to the encryption nonce and the identity point
/// through the ikm, and to the receiving server and its share index through
/// the info parameter, so that each (server, index) pair gets an independent
/// mask even though all of them share the same nonce.
pub fn kdf(
    input: &GtElement,
    nonce: &G2Element,
    gid: &G1Element,
    object_id: &ObjectId,
    index: u8,
) -> [u8; KEY_SIZE] {
    let mut ikm = Vec::with_capacity(GtElement::SIZE + G2Element::SIZE + G1Element::SIZE);
    ikm.extend_from_slice(&input.to_bytes());
    ikm.extend_from_slice(&nonce.to_bytes());
    ikm.extend_from_slice(&gid.to_bytes());

    let mut info = Vec::with_capacity(ObjectId::SIZE + 1);
    info.extend_from_slice(object_id.as_bytes());
    info.push(index);

    hkdf_sha3_256(&ikm, &info)
}

/// Domain labels for keys derived from the shared base key.
#[derive(Debug, Clone, Copy)]
pub enum KeyPurpose {
    /// Masking key for the encrypted encryption randomness.
    EncryptedRandomness,
    /// The DEM key protecting the payload.
    Dem,
}

impl KeyPurpose {
    fn tag(&self) -> u8 {
        match self {
            KeyPurpose::EncryptedRandomness => 0,
            KeyPurpose::Dem => 1,
        }
    }
}

/// Derive a purpose-bound key from the base key.
///
/// Besides the purpose tag, the encrypted shares, the threshold and the
/// key-server object ids are bound into the derivation, so a ciphertext with
/// a modified header yields an unrelated key even when the base key is
/// recovered correctly.
pub fn derive_key(
    purpose: KeyPurpose,
    base_key: &[u8; KEY_SIZE],
    encrypted_shares: &[[u8; KEY_SIZE]],
    threshold: u8,
    services: &[ObjectId],
) -> [u8; KEY_SIZE] {
    let mut info = Vec::with_capacity(
        2 + encrypted_shares.len() * KEY_SIZE + services.len() * ObjectId::SIZE,
    );
    info.push(purpose.tag());
    info.push(threshold);
    for encrypted_share in encrypted_shares {
        info.extend_from_slice(encrypted_share);
    }
    for service in services {
        info.extend_from_slice(service.as_bytes());
    }
    hkdf_sha3_256(base_key, &info)
}

fn hkdf_sha3_256(ikm: &[u8], info: &[u8]) -> [u8; KEY_SIZE] {
    let hk = Hkdf::<Sha3_256>::new(None, ikm);
    let mut okm = [0u8; KEY_SIZE];
    hk.expand(info, &mut okm)
        .expect("32 bytes is a valid hkdf output length");
    okm
}

#[cfg(test)]
mod tests {
    use super::{KeyPurpose, derive_key, kdf};
    use crate::bls::{G1Element, G2Element, Scalar};
    use crate::object::ObjectId;
    use crate::rng::Rng;

    #[test]
    fn kdf_is_deterministic_and_index_bound() {
        let rng = Rng::from_seed([9; 32]);
        let r = Scalar::rand(&rng).unwrap();
        let nonce = G2Element::generator().mul(&r);
        let gid = G1Element::hash_to_curve(b"some identity");
        let gt = gid.pairing(&nonce);
        let object_id = ObjectId::new([1; 32]);

        assert_eq!(
            kdf(&gt, &nonce, &gid, &object_id, 1),
            kdf(&gt, &nonce, &gid, &object_id, 1)
        );
        assert_ne!(
            kdf(&gt, &nonce, &gid, &object_id, 1),
            kdf(&gt, &nonce, &gid, &object_id, 2)
        );
        assert_ne!(
            kdf(&gt, &nonce, &gid, &object_id, 1),
            kdf(&gt, &nonce, &gid, &ObjectId::new([2; 32]), 1)
        );
    }

    #[test]
    fn derived_keys_bind_the_header() {
        let base_key = [7u8; 32];
        let shares = [[1u8; 32], [2u8; 32]];
        let services = [ObjectId::new([1; 32]), ObjectId::new([2; 32])];

        let key = derive_key(KeyPurpose::Dem, &base_key, &shares, 2, &services);
        assert_eq!(
            key,
            derive_key(KeyPurpose::Dem, &base_key, &shares, 2, &services)
        );
        assert_ne!(
            key,
            derive_key(KeyPurpose::EncryptedRandomness, &base_key, &shares, 2, &services)
        );
        assert_ne!(
            key,
            derive_key(KeyPurpose::Dem, &base_key, &[[1u8; 32], [3u8; 32]], 2, &services)
        );
        assert_ne!(
            key,
            derive_key(KeyPurpose::Dem, &base_key, &shares, 1, &services)
        );
        assert_ne!(
            key,
            derive_key(
                KeyPurpose::Dem,
                &base_key,
                &shares,
                2,
                &[ObjectId::new([1; 32]), ObjectId::new([3; 32])]
            )
        );
    }
}
