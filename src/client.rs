// SPDX-License-Identifier: MIT OR Apache-2.0

//! The high-level client: fetches server-issued keys and decrypts objects.
//!
//! Key fetching fans out one request per server and resolves as soon as the
//! outcome is decided: either enough servers have answered to meet the
//! threshold, or so many have failed that the threshold is out of reach. In
//! the failure case the reported error is the one most servers agree on,
//! which keeps a single misbehaving server from dictating the diagnosis.
//!
//! Fetched keys go into an in-memory cache and are never replaced; a key is
//! pairing-verified before it is inserted, so cached entries are known good
//! for the lifetime of the client.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::bls::{G1Element, G2Element};
use crate::decrypt::seal_decrypt;
use crate::elgamal;
use crate::error::{Error, majority_error};
use crate::ibe;
use crate::key_server::{KeyServer, retrieve_key_servers};
use crate::object::{EncryptedObject, ObjectId};
use crate::rng::Rng;
use crate::session::{KeyRequest, SessionKey};
use crate::traits::{ChainReader, KeyServerTransport};

/// A client configured against a fixed committee of key servers.
pub struct Client<C, T> {
    chain: C,
    transport: T,
    servers: Vec<KeyServer>,
    timeout: Duration,
    cache: Mutex<HashMap<(Vec<u8>, ObjectId), G1Element>>,
    rng: Rng,
}

impl<C: ChainReader, T: KeyServerTransport> Client<C, T> {
    /// Create a client for the key servers registered under `server_ids`,
    /// validating each registration as it is read from the chain.
    pub async fn new(
        chain: C,
        transport: T,
        server_ids: &[ObjectId],
        timeout: Duration,
    ) -> Result<Self, Error> {
        let servers = retrieve_key_servers(&chain, server_ids).await?;
        Ok(Self {
            chain,
            transport,
            servers,
            timeout,
            cache: Mutex::new(HashMap::new()),
            rng: Rng::default(),
        })
    }

    pub fn servers(&self) -> &[KeyServer] {
        &self.servers
    }

    /// Re-read the server registrations, picking up moved URLs.
    pub async fn refresh_key_servers(&mut self) -> Result<(), Error> {
        let ids: Vec<ObjectId> = self.servers.iter().map(|s| s.object_id).collect();
        self.servers = retrieve_key_servers(&self.chain, &ids).await?;
        Ok(())
    }

    /// Fetch decryption keys for the given identities from the committee,
    /// stopping once `threshold` servers have delivered all of them.
    ///
    /// `tx_bytes` is the transaction the servers evaluate to decide access;
    /// the session key signs it into the request. Fetched keys are cached, so
    /// repeated calls for the same identities are free.
    pub async fn fetch_keys(
        &self,
        ids: &[Vec<u8>],
        tx_bytes: Vec<u8>,
        session: &SessionKey,
        threshold: u8,
    ) -> Result<(), Error> {
        let servers: Vec<&KeyServer> = self.servers.iter().collect();
        let full_ids: Vec<Vec<u8>> = ids
            .iter()
            .map(|id| ibe::create_full_id(session.package_id(), id))
            .collect();
        self.fetch_keys_from(&servers, &full_ids, tx_bytes, session, threshold)
            .await
    }

    /// Decrypt an encrypted object, fetching keys as needed.
    ///
    /// The client must be configured with at least `threshold` of the
    /// object's key servers, and the session key must be for the object's
    /// package. When the client knows all of the object's key servers, the
    /// share consistency check runs against their public keys; with a partial
    /// committee the uncovered shares cannot be re-encrypted, so the check is
    /// skipped and integrity rests on the nonce verification.
    pub async fn decrypt(
        &self,
        encrypted_object: &[u8],
        tx_bytes: Vec<u8>,
        session: &SessionKey,
    ) -> Result<Vec<u8>, Error> {
        let object = EncryptedObject::parse(encrypted_object)?;
        if object.package_id != *session.package_id() {
            return Err(Error::InvalidInput(
                "session key is for a different package".into(),
            ));
        }
        let eligible: Vec<&KeyServer> = self
            .servers
            .iter()
            .filter(|server| {
                object
                    .services
                    .iter()
                    .any(|(object_id, _)| *object_id == server.object_id)
            })
            .collect();
        if eligible.len() < object.threshold as usize {
            return Err(Error::InvalidInput(format!(
                "client covers {} of the object's key servers, threshold is {}",
                eligible.len(),
                object.threshold
            )));
        }

        let full_id = ibe::create_full_id(&object.package_id, &object.id);
        self.fetch_keys_from(
            &eligible,
            std::slice::from_ref(&full_id),
            tx_bytes,
            session,
            object.threshold,
        )
        .await?;

        let cache = self.cache.lock().await;
        let user_secret_keys: HashMap<ObjectId, G1Element> = object
            .services
            .iter()
            .filter_map(|(object_id, _)| {
                cache
                    .get(&(full_id.clone(), *object_id))
                    .map(|usk| (*object_id, *usk))
            })
            .collect();
        drop(cache);

        let public_keys: HashMap<ObjectId, G2Element> = self
            .servers
            .iter()
            .map(|server| (server.object_id, server.public_key))
            .collect();
        let covers_all = object
            .services
            .iter()
            .all(|(object_id, _)| public_keys.contains_key(object_id));
        seal_decrypt(&object, &user_secret_keys, covers_all.then_some(&public_keys))
    }

    async fn fetch_keys_from(
        &self,
        servers: &[&KeyServer],
        full_ids: &[Vec<u8>],
        tx_bytes: Vec<u8>,
        session: &SessionKey,
        threshold: u8,
    ) -> Result<(), Error> {
        if threshold == 0 || threshold as usize > servers.len() {
            return Err(Error::InvalidThreshold {
                threshold,
                servers: servers.len(),
            });
        }

        // Servers whose keys are all cached count toward the threshold
        // without being contacted again.
        let mut completed = 0usize;
        let mut remaining = Vec::new();
        {
            let cache = self.cache.lock().await;
            for server in servers {
                let cached = full_ids
                    .iter()
                    .all(|full_id| cache.contains_key(&(full_id.clone(), server.object_id)));
                if cached {
                    completed += 1;
                } else {
                    remaining.push(*server);
                }
            }
        }
        if completed >= threshold as usize {
            debug!(completed, "key cache already meets the threshold");
            return Ok(());
        }

        let (decryption_key, request) = session.create_request_params(tx_bytes, &self.rng)?;

        let mut requests: FuturesUnordered<_> = remaining
            .iter()
            .map(|server| {
                let request = &request;
                let decryption_key = &decryption_key;
                async move {
                    let result = self
                        .fetch_from_server(server, request, decryption_key, full_ids)
                        .await;
                    (*server, result)
                }
            })
            .collect();

        let mut errors = Vec::new();
        while let Some((server, result)) = requests.next().await {
            match result {
                Ok(keys) => {
                    let mut cache = self.cache.lock().await;
                    for (full_id, usk) in keys {
                        cache.entry((full_id, server.object_id)).or_insert(usk);
                    }
                    completed += 1;
                    if completed >= threshold as usize {
                        debug!(completed, threshold, "threshold reached");
                        // Dropping the stream cancels the outstanding requests.
                        return Ok(());
                    }
                }
                Err(error) => {
                    warn!(server = %server.object_id, %error, "key request failed");
                    errors.push(error);
                    if completed + requests.len() < threshold as usize {
                        return Err(majority_error(errors));
                    }
                }
            }
        }
        Err(majority_error(errors))
    }

    /// One server round trip: request, ElGamal-decrypt, verify.
    async fn fetch_from_server(
        &self,
        server: &KeyServer,
        request: &KeyRequest,
        decryption_key: &elgamal::SecretKey,
        full_ids: &[Vec<u8>],
    ) -> Result<Vec<(Vec<u8>, G1Element)>, Error> {
        let response = tokio::time::timeout(
            self.timeout,
            self.transport.fetch_key(server, request),
        )
        .await
        .map_err(|_| Error::Timeout)??;

        let received: HashMap<&[u8], &elgamal::Encryption> = response
            .decryption_keys
            .iter()
            .map(|key| (key.full_id.as_slice(), &key.encrypted_key))
            .collect();

        full_ids
            .iter()
            .map(|full_id| {
                let encrypted_key = received.get(full_id.as_slice()).ok_or_else(|| {
                    Error::ServerGeneral("response is missing a requested key".into())
                })?;
                let usk = elgamal::decrypt(decryption_key, encrypted_key);
                if !ibe::verify_user_secret_key(&usk, full_id, &server.public_key) {
                    warn!(server = %server.object_id, "server returned an invalid key");
                    return Err(Error::ServerGeneral("server returned an invalid key".into()));
                }
                Ok((full_id.clone(), usk))
            })
            .collect()
    }
}
