// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decryption of encrypted objects with server-issued secret keys.

use std::collections::HashMap;

use tracing::debug;

use crate::bls::{G1Element, G2Element};
use crate::error::Error;
use crate::ibe;
use crate::kdf::{KeyPurpose, derive_key};
use crate::object::{EncryptedObject, IbeEncryptions, ObjectId};
use crate::tss;

/// Decrypt an encrypted object.
///
/// `user_secret_keys` maps key-server object ids to secret keys issued for
/// this object's identity; at least `threshold` of the object's services must
/// be covered. When `public_keys` is given, the remaining encrypted shares
/// are checked for consistency against the recovered sharing polynomial, so
/// that every authorized party is guaranteed to decrypt to the same payload
/// regardless of which share subset it holds.
pub fn seal_decrypt(
    object: &EncryptedObject,
    user_secret_keys: &HashMap<ObjectId, G1Element>,
    public_keys: Option<&HashMap<ObjectId, G2Element>>,
) -> Result<Vec<u8>, Error> {
    object.validate()?;
    let full_id = ibe::create_full_id(&object.package_id, &object.id);
    let IbeEncryptions::BonehFranklinBls12381 {
        nonce,
        encrypted_shares,
        encrypted_randomness,
    } = &object.encrypted_shares;
    let nonce = G2Element::from_bytes(nonce)?;

    let in_keystore: Vec<usize> = (0..object.services.len())
        .filter(|i| user_secret_keys.contains_key(&object.services[*i].0))
        .collect();
    if in_keystore.len() < object.threshold as usize {
        return Err(Error::InsufficientShares);
    }

    let shares: Vec<tss::IndexedShare> = in_keystore
        .iter()
        .map(|i| {
            let (object_id, index) = object.services[*i];
            let usk = &user_secret_keys[&object_id];
            (
                index,
                ibe::decrypt(&nonce, usk, &encrypted_shares[*i], &full_id, &object_id, index),
            )
        })
        .collect();
    let base_key = tss::combine(&shares)?;

    let service_ids: Vec<ObjectId> =
        object.services.iter().map(|(object_id, _)| *object_id).collect();

    // A wrong share subset surfaces here, either as an out-of-range scalar or
    // as a nonce mismatch.
    let r = ibe::decrypt_randomness(
        encrypted_randomness,
        &derive_key(
            KeyPurpose::EncryptedRandomness,
            &base_key,
            encrypted_shares,
            object.threshold,
            &service_ids,
        ),
    )
    .map_err(|_| Error::Decryption)?;
    if !ibe::verify_nonce(&r, &nonce) {
        return Err(Error::Decryption);
    }

    if let Some(public_keys) = public_keys {
        verify_share_consistency(object, &shares, &r, &nonce, encrypted_shares, public_keys)?;
    }

    debug!(package_id = %object.package_id, "decrypted object");
    object.ciphertext.decrypt(&derive_key(
        KeyPurpose::Dem,
        &base_key,
        encrypted_shares,
        object.threshold,
        &service_ids,
    ))
}

/// Re-encrypt every share from the interpolated sharing polynomial and
/// compare against the ciphertext, including the shares we did not use.
fn verify_share_consistency(
    object: &EncryptedObject,
    shares: &[tss::IndexedShare],
    r: &crate::bls::Scalar,
    nonce: &G2Element,
    encrypted_shares: &[[u8; 32]],
    public_keys: &HashMap<ObjectId, G2Element>,
) -> Result<(), Error> {
    let polynomial = tss::interpolate(shares)?;
    let all_shares: Vec<[u8; 32]> = object
        .services
        .iter()
        .map(|(_, index)| polynomial(*index))
        .collect();
    let service_keys: Vec<G2Element> = object
        .services
        .iter()
        .map(|(object_id, _)| {
            public_keys.get(object_id).copied().ok_or_else(|| {
                Error::InvalidInput(format!("missing public key for service {object_id}"))
            })
        })
        .collect::<Result<_, _>>()?;

    let (expected_nonce, expected_shares) = ibe::encrypt_batched_deterministic(
        r,
        &all_shares,
        &service_keys,
        &ibe::create_full_id(&object.package_id, &object.id),
        &object.services,
    )?;
    if expected_nonce != *nonce || expected_shares != encrypted_shares {
        return Err(Error::InconsistentShares);
    }
    Ok(())
}
