// SPDX-License-Identifier: MIT OR Apache-2.0

//! The encrypted-object wire format.
//!
//! Encoded with BCS. Field order, widths and enum variant order are fixed:
//! independently-built encryptors and decryptors, as well as the key servers,
//! parse these bytes, so any change here is a breaking protocol change.
//! Parsing is strict and fails with [`Error::InvalidCiphertext`] instead of
//! attempting best-effort recovery.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::error::Error;
use crate::kdf::KEY_SIZE;

/// The only wire version this implementation reads and writes.
pub const VERSION: u8 = 0;

/// Largest number of key servers an object can reference; share indices and
/// the threshold are single bytes.
pub const MAX_SERVERS: usize = 255;

/// A 32-byte on-chain object address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    pub const SIZE: usize = 32;

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        bytes
            .try_into()
            .map(Self)
            .map_err(|_| Error::InvalidInput("object ids are 32 bytes".into()))
    }

    /// Parse from a hex string, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, Error> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)
            .map_err(|_| Error::InvalidInput(format!("invalid object id {s}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({self})")
    }
}

/// The IBE-encrypted key shares, tagged by scheme.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IbeEncryptions {
    BonehFranklinBls12381 {
        /// The shared encapsulation nonce, a compressed G2 point.
        #[serde_as(as = "[_; 96]")]
        nonce: [u8; 96],
        /// One masked share per service, in service order.
        encrypted_shares: Vec<[u8; KEY_SIZE]>,
        /// The encryption randomness, masked under a key derived from the
        /// base key. Lets a decryptor verify the nonce.
        encrypted_randomness: [u8; KEY_SIZE],
    },
}

/// The symmetric payload, tagged by DEM mode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ciphertext {
    Aes256Gcm {
        #[serde(with = "serde_bytes")]
        blob: Vec<u8>,
        #[serde(with = "serde_bytes")]
        aad: Option<Vec<u8>>,
    },
    Hmac256Ctr {
        #[serde(with = "serde_bytes")]
        blob: Vec<u8>,
        #[serde(with = "serde_bytes")]
        aad: Option<Vec<u8>>,
        mac: [u8; KEY_SIZE],
    },
    Plain,
}

/// A threshold-encrypted object: everything a holder of sufficiently many
/// server-issued secret keys needs in order to recover the payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedObject {
    pub version: u8,
    pub package_id: ObjectId,
    /// The inner identity bytes; the full IBE identity is derived from the
    /// domain tag, the package id and this value.
    #[serde(with = "serde_bytes")]
    pub id: Vec<u8>,
    /// Key-server object ids paired with the index of the share encrypted to
    /// them. Order matches `encrypted_shares` and is significant.
    pub services: Vec<(ObjectId, u8)>,
    pub threshold: u8,
    pub encrypted_shares: IbeEncryptions,
    pub ciphertext: Ciphertext,
}

impl EncryptedObject {
    /// Strict parse of the wire bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let object: EncryptedObject = bcs::from_bytes(bytes)
            .map_err(|e| Error::InvalidCiphertext(e.to_string()))?;
        object.validate()?;
        Ok(object)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        self.validate()?;
        bcs::to_bytes(self).map_err(|e| Error::InvalidCiphertext(e.to_string()))
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.version != VERSION {
            return Err(Error::InvalidCiphertext(format!(
                "unsupported version {}",
                self.version
            )));
        }
        if self.services.is_empty() || self.services.len() > MAX_SERVERS {
            return Err(Error::InvalidCiphertext(format!(
                "invalid number of services {}",
                self.services.len()
            )));
        }
        if self.threshold == 0 || self.threshold as usize > self.services.len() {
            return Err(Error::InvalidCiphertext(format!(
                "invalid threshold {} for {} services",
                self.threshold,
                self.services.len()
            )));
        }
        let IbeEncryptions::BonehFranklinBls12381 {
            encrypted_shares, ..
        } = &self.encrypted_shares;
        if encrypted_shares.len() != self.services.len() {
            return Err(Error::InvalidCiphertext(format!(
                "{} encrypted shares for {} services",
                encrypted_shares.len(),
                self.services.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Ciphertext, EncryptedObject, IbeEncryptions, ObjectId, VERSION};
    use crate::error::Error;

    fn sample_object(services: usize, threshold: u8) -> EncryptedObject {
        EncryptedObject {
            version: VERSION,
            package_id: ObjectId::new([1; 32]),
            id: vec![1, 2, 3],
            services: (0..services)
                .map(|i| (ObjectId::new([i as u8; 32]), i as u8 + 1))
                .collect(),
            threshold,
            encrypted_shares: IbeEncryptions::BonehFranklinBls12381 {
                nonce: [4; 96],
                encrypted_shares: vec![[5; 32]; services],
                encrypted_randomness: [6; 32],
            },
            ciphertext: Ciphertext::Hmac256Ctr {
                blob: vec![7; 40],
                aad: Some(vec![1, 2, 3, 4]),
                mac: [8; 32],
            },
        }
    }

    #[test]
    fn wire_round_trip() {
        let object = sample_object(3, 2);
        let bytes = object.to_bytes().unwrap();
        assert_eq!(EncryptedObject::parse(&bytes).unwrap(), object);
    }

    #[test]
    fn rejects_unknown_version() {
        let mut object = sample_object(3, 2);
        object.version = 1;
        let bytes = bcs::to_bytes(&object).unwrap();
        assert!(matches!(
            EncryptedObject::parse(&bytes),
            Err(Error::InvalidCiphertext(_))
        ));
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        for threshold in [0, 4] {
            let object = sample_object(3, threshold);
            let bytes = bcs::to_bytes(&object).unwrap();
            assert!(matches!(
                EncryptedObject::parse(&bytes),
                Err(Error::InvalidCiphertext(_))
            ));
        }
    }

    #[test]
    fn rejects_mismatched_share_count() {
        let mut object = sample_object(3, 2);
        let IbeEncryptions::BonehFranklinBls12381 {
            encrypted_shares, ..
        } = &mut object.encrypted_shares;
        encrypted_shares.pop();
        let bytes = bcs::to_bytes(&object).unwrap();
        assert!(matches!(
            EncryptedObject::parse(&bytes),
            Err(Error::InvalidCiphertext(_))
        ));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = sample_object(2, 1).to_bytes().unwrap();
        bytes.push(0);
        assert!(EncryptedObject::parse(&bytes).is_err());
    }

    #[test]
    fn object_id_hex_round_trip() {
        let id = ObjectId::new([0xab; 32]);
        assert_eq!(ObjectId::from_hex(&id.to_string()).unwrap(), id);
        assert!(ObjectId::from_hex("0x1234").is_err());
    }
}
