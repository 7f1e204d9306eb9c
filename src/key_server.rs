// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key servers and their on-chain registrations.

use serde::{Deserialize, Serialize};

use crate::bls::{G1Element, G2Element};
use crate::elgamal;
use crate::error::Error;
use crate::ibe::DST_POP;
use crate::object::ObjectId;
use crate::traits::ChainReader;

/// Supported IBE schemes, tagged as stored on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    BonehFranklinBls12381,
}

impl KeyType {
    pub fn from_tag(tag: u8) -> Result<Self, Error> {
        match tag {
            0 => Ok(KeyType::BonehFranklinBls12381),
            _ => Err(Error::UnsupportedKeyType(tag)),
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            KeyType::BonehFranklinBls12381 => 0,
        }
    }
}

/// The raw on-chain registration of a key server, as returned by the chain
/// reader before any validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyServerRecord {
    pub name: String,
    pub url: String,
    pub key_type: u8,
    #[serde(with = "serde_bytes")]
    pub public_key: Vec<u8>,
}

/// A validated key server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyServer {
    pub object_id: ObjectId,
    pub name: String,
    pub url: String,
    pub key_type: KeyType,
    pub public_key: G2Element,
}

impl KeyServer {
    /// Validate a registration record.
    pub fn from_record(object_id: ObjectId, record: KeyServerRecord) -> Result<Self, Error> {
        Ok(Self {
            object_id,
            name: record.name,
            url: record.url,
            key_type: KeyType::from_tag(record.key_type)?,
            public_key: G2Element::from_bytes(&record.public_key)?,
        })
    }

    /// Verify a proof of possession of the server's master key: a BLS
    /// signature over the public key and the server's object id.
    pub fn verify_pop(&self, pop: &G1Element) -> bool {
        pop.pairing(&G2Element::generator())
            == G1Element::hash_to_curve(&pop_message(&self.public_key, &self.object_id))
                .pairing(&self.public_key)
    }
}

/// Fetch and validate the registrations of the given key servers.
pub async fn retrieve_key_servers<C: ChainReader>(
    chain: &C,
    object_ids: &[ObjectId],
) -> Result<Vec<KeyServer>, Error> {
    let mut servers = Vec::with_capacity(object_ids.len());
    for object_id in object_ids {
        let record = chain.key_server_record(object_id).await?;
        servers.push(KeyServer::from_record(*object_id, record)?);
    }
    Ok(servers)
}

/// A single decryption key in a server response, still under the request's
/// ElGamal encryption.
#[derive(Clone, Debug)]
pub struct DecryptionKey {
    pub full_id: Vec<u8>,
    pub encrypted_key: elgamal::Encryption,
}

/// A key server's response to a key request.
#[derive(Clone, Debug)]
pub struct FetchKeyResponse {
    pub decryption_keys: Vec<DecryptionKey>,
}

fn pop_message(public_key: &G2Element, object_id: &ObjectId) -> Vec<u8> {
    let mut message = Vec::with_capacity(DST_POP.len() + G2Element::SIZE + ObjectId::SIZE);
    message.extend_from_slice(DST_POP);
    message.extend_from_slice(&public_key.to_bytes());
    message.extend_from_slice(object_id.as_bytes());
    message
}

/// Create a proof of possession with the master key. The counterpart of
/// [`KeyServer::verify_pop`], used by server tooling and tests.
pub fn create_pop(
    master_key: &crate::bls::Scalar,
    public_key: &G2Element,
    object_id: &ObjectId,
) -> G1Element {
    G1Element::hash_to_curve(&pop_message(public_key, object_id)).mul(master_key)
}

#[cfg(test)]
mod tests {
    use super::{KeyServer, KeyServerRecord, KeyType, create_pop};
    use crate::bls::Scalar;
    use crate::error::Error;
    use crate::ibe::public_key_from_master_key;
    use crate::object::ObjectId;
    use crate::rng::Rng;

    fn record(key_type: u8, public_key: Vec<u8>) -> KeyServerRecord {
        KeyServerRecord {
            name: "server".into(),
            url: "https://example.com".into(),
            key_type,
            public_key,
        }
    }

    #[test]
    fn record_validation() {
        let rng = Rng::from_seed([71; 32]);
        let master_key = Scalar::rand(&rng).unwrap();
        let public_key = public_key_from_master_key(&master_key);
        let object_id = ObjectId::new([1; 32]);

        let server = KeyServer::from_record(
            object_id,
            record(0, public_key.to_bytes().to_vec()),
        )
        .unwrap();
        assert_eq!(server.key_type, KeyType::BonehFranklinBls12381);
        assert_eq!(server.public_key, public_key);

        assert!(matches!(
            KeyServer::from_record(object_id, record(1, public_key.to_bytes().to_vec())),
            Err(Error::UnsupportedKeyType(1))
        ));
        assert!(matches!(
            KeyServer::from_record(object_id, record(0, vec![0u8; 96])),
            Err(Error::InvalidPoint)
        ));
    }

    #[test]
    fn proof_of_possession() {
        let rng = Rng::from_seed([72; 32]);
        let master_key = Scalar::rand(&rng).unwrap();
        let public_key = public_key_from_master_key(&master_key);
        let object_id = ObjectId::new([2; 32]);
        let server = KeyServer::from_record(
            object_id,
            record(0, public_key.to_bytes().to_vec()),
        )
        .unwrap();

        let pop = create_pop(&master_key, &public_key, &object_id);
        assert!(server.verify_pop(&pop));

        // Signed by a different master key, or for a different object.
        let other_key = Scalar::rand(&rng).unwrap();
        assert!(!server.verify_pop(&create_pop(&other_key, &public_key, &object_id)));
        let other_pop = create_pop(&master_key, &public_key, &ObjectId::new([3; 32]));
        assert!(!server.verify_pop(&other_pop));
    }
}
