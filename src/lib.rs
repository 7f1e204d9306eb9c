// SPDX-License-Identifier: MIT OR Apache-2.0

//! `veiled` is a client library for identity-based threshold encryption with
//! on-chain access control.
//!
//! Data is encrypted locally under an *identity*, an arbitrary byte string
//! scoped to an on-chain package. Nobody holds the decryption key at
//! encryption time: a committee of independent key servers each holds a
//! master key for a Boneh-Franklin IBE scheme over BLS12-381, and a server
//! derives the secret key for an identity only for requesters who satisfy the
//! package's access policy. Any `threshold` of the committee's derived keys
//! recover the payload; fewer reveal nothing.
//!
//! ## Encryption
//!
//! [`seal_encrypt`] generates a random base key, splits it into one share per
//! key server with Shamir secret sharing over GF(2⁸), and encrypts each share
//! to its server with IBE under the chosen identity. The payload itself is
//! protected by a data encapsulation mechanism keyed from the base key; see
//! [`EncryptionInput`] for the available modes. The result is a
//! self-contained, BCS-encoded [`EncryptedObject`] that can be stored
//! anywhere, including on public storage.
//!
//! ## Decryption
//!
//! A user proves to the key servers that they satisfy the access policy by
//! sending a transaction which the servers evaluate, signed with a
//! [`SessionKey`] that their wallet certified once. The [`Client`] fans the
//! request out to the committee, collects and verifies the returned keys, and
//! caches them. [`seal_decrypt`] then recovers the base key from any
//! `threshold` shares and checks, via the encrypted encryption randomness,
//! that the ciphertext was honestly produced before handing back the payload.
//!
//! ## Collaborators
//!
//! The blockchain, the key-server transport and the wallet stay outside this
//! crate; the client talks to them through the [`traits`] seams. Tests drive
//! the client with in-memory implementations of both.
//!
//! ## Security notes
//!
//! Key servers are trusted not to collude up to the threshold, and the
//! payload is only as private as the access policy is strict. Encryption
//! randomness, the base key and all derived keys are 32 bytes and never
//! leave the process; session and ElGamal secrets are ephemeral.

mod bls;
mod client;
mod decrypt;
mod dem;
pub mod elgamal;
mod encrypt;
mod error;
mod ibe;
mod kdf;
mod key_server;
mod object;
mod rng;
mod session;
pub mod traits;
mod tss;

pub use bls::{G1Element, G2Element, GtElement, Scalar};
pub use client::Client;
pub use decrypt::seal_decrypt;
pub use dem::{Aes256Gcm, EncryptionInput, Hmac256Ctr};
pub use encrypt::{Service, seal_encrypt};
pub use error::{Error, ErrorKind, majority_error};
pub use ibe::{create_full_id, extract, public_key_from_master_key, verify_user_secret_key};
pub use key_server::{
    DecryptionKey, FetchKeyResponse, KeyServer, KeyServerRecord, KeyType, create_pop,
    retrieve_key_servers,
};
pub use object::{Ciphertext, EncryptedObject, IbeEncryptions, MAX_SERVERS, ObjectId, VERSION};
pub use rng::{Rng, RngError};
pub use session::{Address, Certificate, KeyRequest, MAX_TTL_MIN, SessionKey, SessionKeyExport};
