// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator seams.
//!
//! The chain, the key-server transport and the wallet live outside this
//! crate. They are modelled as traits so the client can be driven by any
//! implementation, including the in-memory ones used in tests.

use ed25519_dalek::Signature;

use crate::error::Error;
use crate::key_server::{FetchKeyResponse, KeyServer, KeyServerRecord};
use crate::object::ObjectId;
use crate::session::KeyRequest;

/// Read access to on-chain key-server registrations.
pub trait ChainReader {
    /// The registration stored under `object_id`, or an error if the object
    /// does not exist or is not a key-server registration.
    fn key_server_record(
        &self,
        object_id: &ObjectId,
    ) -> impl Future<Output = Result<KeyServerRecord, Error>> + Send;
}

/// The key owner's wallet, asked once per session to sign the
/// human-readable personal message.
pub trait PersonalMessageSigner {
    fn sign_personal_message(
        &self,
        message: &[u8],
    ) -> impl Future<Output = Result<Signature, Error>> + Send;
}

/// Sends a key request to a single key server.
pub trait KeyServerTransport {
    fn fetch_key(
        &self,
        server: &KeyServer,
        request: &KeyRequest,
    ) -> impl Future<Output = Result<FetchKeyResponse, Error>> + Send;
}
