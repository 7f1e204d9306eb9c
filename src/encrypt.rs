// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encryption of a payload under a committee of key servers.

use tracing::debug;

use crate::dem::EncryptionInput;
use crate::error::Error;
use crate::ibe;
use crate::kdf::{KEY_SIZE, KeyPurpose, derive_key};
use crate::object::{EncryptedObject, MAX_SERVERS, ObjectId, VERSION};
use crate::rng::Rng;
use crate::tss;

/// A key server taking part in an encryption: its object id and IBE public
/// key. The same server may appear more than once to give it extra weight.
pub type Service = (ObjectId, crate::bls::G2Element);

/// Encrypt `input` so that any `threshold` of the given services can later
/// authorize its decryption.
///
/// A fresh base key is split into one share per service and each share is
/// IBE-encrypted to its service under the identity derived from `package_id`
/// and `id`. Returns the encrypted object together with the derived DEM key;
/// the latter is what [`EncryptionInput::Plain`] shares, and callers using an
/// authenticated mode can simply drop it.
pub fn seal_encrypt(
    package_id: ObjectId,
    id: Vec<u8>,
    services: &[Service],
    threshold: u8,
    input: EncryptionInput,
    rng: &Rng,
) -> Result<(EncryptedObject, [u8; KEY_SIZE]), Error> {
    if services.is_empty() || services.len() > MAX_SERVERS {
        return Err(Error::InvalidInput(format!(
            "invalid number of services {}",
            services.len()
        )));
    }
    if threshold == 0 || threshold as usize > services.len() {
        return Err(Error::InvalidThreshold {
            threshold,
            servers: services.len(),
        });
    }

    let full_id = ibe::create_full_id(&package_id, &id);
    let base_key: [u8; KEY_SIZE] = rng.random_array()?;

    let shares = tss::split(&base_key, services.len() as u8, threshold, rng)?;
    let share_values: Vec<[u8; KEY_SIZE]> = shares.iter().map(|(_, share)| *share).collect();
    let info: Vec<(ObjectId, u8)> = services
        .iter()
        .zip(&shares)
        .map(|((object_id, _), (index, _))| (*object_id, *index))
        .collect();
    let public_keys: Vec<_> = services.iter().map(|(_, pk)| *pk).collect();

    let (nonce, encrypted_shares, r) =
        ibe::encrypt_batched(&share_values, &public_keys, &full_id, &info, rng)?;

    // Both derived keys bind the ciphertext header: the encrypted shares, the
    // threshold and the service ids.
    let service_ids: Vec<ObjectId> = info.iter().map(|(object_id, _)| *object_id).collect();
    let encrypted_randomness = ibe::encrypt_randomness(
        &r,
        &derive_key(
            KeyPurpose::EncryptedRandomness,
            &base_key,
            &encrypted_shares,
            threshold,
            &service_ids,
        ),
    );
    let dem_key = derive_key(
        KeyPurpose::Dem,
        &base_key,
        &encrypted_shares,
        threshold,
        &service_ids,
    );
    let object = EncryptedObject {
        version: VERSION,
        package_id,
        id,
        services: info,
        threshold,
        encrypted_shares: crate::object::IbeEncryptions::BonehFranklinBls12381 {
            nonce: nonce.to_bytes(),
            encrypted_shares,
            encrypted_randomness,
        },
        ciphertext: input.encrypt(&dem_key),
    };
    debug!(
        package_id = %object.package_id,
        services = services.len(),
        threshold,
        "encrypted object"
    );
    Ok((object, dem_key))
}
