// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boneh-Franklin identity-based encryption over BLS12-381.
//!
//! Key servers hold a master scalar; the public key is in G2 and the
//! user secret key for an identity is the G1 identity point times the master
//! scalar. Encryption encapsulates a 32-byte share to each server under a
//! common nonce `g2 · r`, with the mask derived from the pairing
//! `e(H(id) · r, pk)`. Decryption computes the same pairing as
//! `e(usk, nonce)`.

use crate::bls::{G1Element, G2Element, Scalar};
use crate::error::Error;
use crate::kdf::{KEY_SIZE, kdf};
use crate::object::ObjectId;
use crate::rng::Rng;

/// Domain separation tag for identity points.
pub const DST: &[u8] = b"VEILED-IBE-BLS12381-00";

/// Domain separation tag for key-server proofs of possession.
pub const DST_POP: &[u8] = b"VEILED-IBE-BLS12381-00-POP";

/// The full IBE identity: length-prefixed domain tag, package id, inner id.
pub fn create_full_id(package_id: &ObjectId, id: &[u8]) -> Vec<u8> {
    let mut full_id = Vec::with_capacity(1 + DST.len() + ObjectId::SIZE + id.len());
    full_id.push(DST.len() as u8);
    full_id.extend_from_slice(DST);
    full_id.extend_from_slice(package_id.as_bytes());
    full_id.extend_from_slice(id);
    full_id
}

/// Derive the user secret key for an identity from a master key.
///
/// Only used by tests and tooling; in production the key servers perform the
/// extraction.
pub fn extract(master_key: &Scalar, full_id: &[u8]) -> G1Element {
    G1Element::hash_to_curve(full_id).mul(master_key)
}

/// The public key corresponding to a master key.
pub fn public_key_from_master_key(master_key: &Scalar) -> G2Element {
    G2Element::generator().mul(master_key)
}

/// Encrypt one share per public key under fresh randomness.
///
/// Returns the encapsulation nonce, the masked shares and the encryption
/// randomness, in that order. The caller masks the randomness with
/// [`encrypt_randomness`] once the derived masking key is available.
pub fn encrypt_batched(
    shares: &[[u8; KEY_SIZE]],
    public_keys: &[G2Element],
    full_id: &[u8],
    info: &[(ObjectId, u8)],
    rng: &Rng,
) -> Result<(G2Element, Vec<[u8; KEY_SIZE]>, Scalar), Error> {
    if shares.is_empty() {
        return Err(Error::InvalidInput("nothing to encrypt".into()));
    }
    let r = Scalar::rand(rng)?;
    let (nonce, encrypted_shares) =
        encrypt_batched_deterministic(&r, shares, public_keys, full_id, info)?;
    Ok((nonce, encrypted_shares, r))
}

/// Encrypt one share per public key under the shared randomness `r`.
///
/// The nonce and the masks are deterministic in `r`, which is what allows a
/// decryptor holding `r` to re-encrypt and compare, checking that all
/// encrypted shares are consistent with the ones it used.
pub fn encrypt_batched_deterministic(
    r: &Scalar,
    shares: &[[u8; KEY_SIZE]],
    public_keys: &[G2Element],
    full_id: &[u8],
    info: &[(ObjectId, u8)],
) -> Result<(G2Element, Vec<[u8; KEY_SIZE]>), Error> {
    if shares.len() != public_keys.len() || shares.len() != info.len() {
        return Err(Error::InvalidInput(
            "shares, public keys and info must have the same length".into(),
        ));
    }

    let nonce = G2Element::generator().mul(r);
    let gid = G1Element::hash_to_curve(full_id);
    let gid_r = gid.mul(r);
    let encrypted_shares = shares
        .iter()
        .zip(public_keys)
        .zip(info)
        .map(|((share, public_key), (object_id, index))| {
            let mask = kdf(&gid_r.pairing(public_key), &nonce, &gid, object_id, *index);
            xor(share, &mask)
        })
        .collect();
    Ok((nonce, encrypted_shares))
}

/// Decrypt a single encrypted share with a user secret key.
///
/// Succeeds unconditionally; an invalid key or ciphertext yields garbage,
/// which the caller detects via the share consistency check or the DEM.
pub fn decrypt(
    nonce: &G2Element,
    usk: &G1Element,
    encrypted_share: &[u8; KEY_SIZE],
    full_id: &[u8],
    object_id: &ObjectId,
    index: u8,
) -> [u8; KEY_SIZE] {
    let gid = G1Element::hash_to_curve(full_id);
    let mask = kdf(&usk.pairing(nonce), nonce, &gid, object_id, index);
    xor(encrypted_share, &mask)
}

/// Whether `usk` is a valid user secret key for `full_id` under `public_key`,
/// checked with the pairing identity `e(usk, g2) == e(H(full_id), pk)`.
pub fn verify_user_secret_key(
    usk: &G1Element,
    full_id: &[u8],
    public_key: &G2Element,
) -> bool {
    usk.pairing(&G2Element::generator())
        == G1Element::hash_to_curve(full_id).pairing(public_key)
}

/// Mask the encryption randomness under a derived masking key.
pub fn encrypt_randomness(r: &Scalar, key: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    xor(&r.to_bytes_be(), key)
}

/// Recover the encryption randomness from its masked form.
pub fn decrypt_randomness(
    encrypted_randomness: &[u8; KEY_SIZE],
    key: &[u8; KEY_SIZE],
) -> Result<Scalar, Error> {
    Scalar::from_bytes_be(&xor(encrypted_randomness, key))
}

/// Whether `r` reproduces the encapsulation nonce.
pub fn verify_nonce(r: &Scalar, nonce: &G2Element) -> bool {
    G2Element::generator().mul(r) == *nonce
}

pub(crate) fn xor(a: &[u8; KEY_SIZE], b: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    let mut out = [0u8; KEY_SIZE];
    for (out, (a, b)) in out.iter_mut().zip(a.iter().zip(b)) {
        *out = a ^ b;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{
        create_full_id, decrypt, decrypt_randomness, encrypt_batched_deterministic,
        encrypt_randomness, extract, public_key_from_master_key, verify_nonce,
        verify_user_secret_key,
    };
    use crate::bls::{G2Element, Scalar};
    use crate::object::ObjectId;
    use crate::rng::Rng;

    #[test]
    fn encapsulation_round_trip_per_server() {
        let rng = Rng::from_seed([21; 32]);
        let master_keys: Vec<Scalar> =
            (0..3).map(|_| Scalar::rand(&rng).unwrap()).collect();
        let public_keys: Vec<G2Element> =
            master_keys.iter().map(public_key_from_master_key).collect();
        let info: Vec<(ObjectId, u8)> = (0..3u8)
            .map(|i| (ObjectId::new([i; 32]), i + 1))
            .collect();
        let shares = [[1u8; 32], [2u8; 32], [3u8; 32]];
        let full_id = create_full_id(&ObjectId::new([9; 32]), b"document-1");

        let r = Scalar::rand(&rng).unwrap();
        let (nonce, encrypted_shares) =
            encrypt_batched_deterministic(&r, &shares, &public_keys, &full_id, &info).unwrap();

        for i in 0..3 {
            let usk = extract(&master_keys[i], &full_id);
            assert!(verify_user_secret_key(&usk, &full_id, &public_keys[i]));
            let (object_id, index) = info[i];
            assert_eq!(
                decrypt(&nonce, &usk, &encrypted_shares[i], &full_id, &object_id, index),
                shares[i]
            );
        }
    }

    #[test]
    fn wrong_key_decrypts_to_garbage() {
        let rng = Rng::from_seed([22; 32]);
        let master_key = Scalar::rand(&rng).unwrap();
        let public_key = public_key_from_master_key(&master_key);
        let full_id = create_full_id(&ObjectId::new([0; 32]), b"id");
        let info = [(ObjectId::new([1; 32]), 1)];
        let shares = [[7u8; 32]];

        let r = Scalar::rand(&rng).unwrap();
        let (nonce, encrypted_shares) =
            encrypt_batched_deterministic(&r, &shares, &[public_key], &full_id, &info).unwrap();

        let wrong_key = extract(&Scalar::rand(&rng).unwrap(), &full_id);
        assert!(!verify_user_secret_key(&wrong_key, &full_id, &public_key));
        assert_ne!(
            decrypt(&nonce, &wrong_key, &encrypted_shares[0], &full_id, &info[0].0, 1),
            shares[0]
        );

        // A key for a different identity also fails verification.
        let other_id = create_full_id(&ObjectId::new([0; 32]), b"other");
        let other_usk = extract(&master_key, &other_id);
        assert!(!verify_user_secret_key(&other_usk, &full_id, &public_key));
    }

    #[test]
    fn mismatched_batch_lengths_are_rejected() {
        let rng = Rng::from_seed([23; 32]);
        let r = Scalar::rand(&rng).unwrap();
        let public_key = public_key_from_master_key(&Scalar::rand(&rng).unwrap());
        assert!(
            encrypt_batched_deterministic(&r, &[[0; 32]], &[public_key], b"id", &[]).is_err()
        );
    }

    #[test]
    fn randomness_round_trip_and_nonce_verification() {
        let rng = Rng::from_seed([24; 32]);
        let r = Scalar::rand(&rng).unwrap();
        let key = [5u8; 32];

        let encrypted = encrypt_randomness(&r, &key);
        let recovered = decrypt_randomness(&encrypted, &key).unwrap();
        assert_eq!(recovered, r);

        let nonce = G2Element::generator().mul(&r);
        assert!(verify_nonce(&r, &nonce));
        assert!(!verify_nonce(&Scalar::rand(&rng).unwrap(), &nonce));

        // A wrong masking key yields a different scalar or an out-of-range error.
        if let Ok(wrong) = decrypt_randomness(&encrypted, &[6u8; 32]) {
            assert_ne!(wrong, r);
        }
    }
}
