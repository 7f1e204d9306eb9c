// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crate-wide error taxonomy.
//!
//! Errors fall into five groups with different remedies for the caller:
//! encoding and invalid-input errors are programming or data errors and are
//! never retried; authorization errors mean the session or the request needs
//! to be re-established; availability errors are transient and can be retried
//! by calling the fetch again; integrity errors are fatal for the object in
//! question. [`Error::kind`] exposes the group membership used by the
//! majority-vote aggregation in the client.

use thiserror::Error;

use crate::rng::RngError;

#[derive(Debug, Error)]
pub enum Error {
    /// A curve point could not be decoded: wrong length, invalid flags, not
    /// on the curve or not in the prime-order subgroup.
    #[error("invalid point encoding")]
    InvalidPoint,

    /// A scalar was out of range or had the wrong length.
    #[error("invalid scalar encoding")]
    InvalidScalar,

    /// The encrypted object is malformed: unknown version or tag, mismatched
    /// lengths or an out-of-range threshold.
    #[error("invalid encrypted object: {0}")]
    InvalidCiphertext(String),

    /// Mismatched or empty arguments passed to a cryptographic operation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A key server uses a key type this client does not support.
    #[error("unsupported key type {0}")]
    UnsupportedKeyType(u8),

    /// The threshold is zero or cannot be met by the given servers.
    #[error("invalid threshold {threshold} for {servers} servers")]
    InvalidThreshold { threshold: u8, servers: usize },

    /// An owner or session signature failed to verify.
    #[error("invalid signature")]
    InvalidSignature,

    /// The session key was imported with a signer whose address differs from
    /// the one the session was created for.
    #[error("signer address does not match session key address")]
    SignerMismatch,

    /// The session key's time-to-live has elapsed.
    #[error("session key has expired")]
    ExpiredSession,

    /// A key server rejected the request because the on-chain access
    /// predicate is not satisfied for the requester.
    #[error("no access to the requested keys")]
    NoAccess,

    /// A key server rejected the signature on the request.
    #[error("server rejected the session signature")]
    InvalidSessionSignature,

    /// A key server rejected the certificate, e.g. because it expired.
    #[error("server rejected the certificate")]
    InvalidCertificate,

    /// A key server rejected the access-policy transaction.
    #[error("server rejected the transaction: {0}")]
    InvalidTransaction(String),

    /// A key server request did not complete within the configured timeout.
    #[error("request to key server timed out")]
    Timeout,

    /// The transport to a key server failed.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A key server reported an internal error; the request may be retried.
    #[error("key server internal error")]
    ServerInternal,

    /// Any other key server failure.
    #[error("key server error: {0}")]
    ServerGeneral(String),

    /// Symmetric decryption failed. Deliberately opaque: a wrong key and a
    /// tampered ciphertext are indistinguishable.
    #[error("decryption failed")]
    Decryption,

    /// Fewer than `threshold` usable secret keys are available.
    #[error("not enough shares, fetch more keys")]
    InsufficientShares,

    /// The decrypted shares are not consistent with a single polynomial.
    #[error("inconsistent shares")]
    InconsistentShares,

    #[error(transparent)]
    Rng(#[from] RngError),
}

/// Coarse error classification, used to count heterogeneous per-server
/// failures in [`majority_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPoint,
    InvalidScalar,
    InvalidCiphertext,
    InvalidInput,
    UnsupportedKeyType,
    InvalidThreshold,
    InvalidSignature,
    SignerMismatch,
    ExpiredSession,
    NoAccess,
    InvalidSessionSignature,
    InvalidCertificate,
    InvalidTransaction,
    Timeout,
    Transport,
    ServerInternal,
    ServerGeneral,
    Decryption,
    InsufficientShares,
    InconsistentShares,
    Rng,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidPoint => ErrorKind::InvalidPoint,
            Error::InvalidScalar => ErrorKind::InvalidScalar,
            Error::InvalidCiphertext(_) => ErrorKind::InvalidCiphertext,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::UnsupportedKeyType(_) => ErrorKind::UnsupportedKeyType,
            Error::InvalidThreshold { .. } => ErrorKind::InvalidThreshold,
            Error::InvalidSignature => ErrorKind::InvalidSignature,
            Error::SignerMismatch => ErrorKind::SignerMismatch,
            Error::ExpiredSession => ErrorKind::ExpiredSession,
            Error::NoAccess => ErrorKind::NoAccess,
            Error::InvalidSessionSignature => ErrorKind::InvalidSessionSignature,
            Error::InvalidCertificate => ErrorKind::InvalidCertificate,
            Error::InvalidTransaction(_) => ErrorKind::InvalidTransaction,
            Error::Timeout => ErrorKind::Timeout,
            Error::Transport(_) => ErrorKind::Transport,
            Error::ServerInternal => ErrorKind::ServerInternal,
            Error::ServerGeneral(_) => ErrorKind::ServerGeneral,
            Error::Decryption => ErrorKind::Decryption,
            Error::InsufficientShares => ErrorKind::InsufficientShares,
            Error::InconsistentShares => ErrorKind::InconsistentShares,
            Error::Rng(_) => ErrorKind::Rng,
        }
    }
}

/// Reduce a set of per-server failures to a single representative one.
///
/// The most frequent [`ErrorKind`] wins; on a tie the kind whose count
/// reached the maximum first is kept. Returns [`Error::InsufficientShares`]
/// when no errors were collected at all.
pub fn majority_error(errors: Vec<Error>) -> Error {
    let mut counts: std::collections::HashMap<ErrorKind, usize> = std::collections::HashMap::new();
    let mut max_count = 0;
    let mut majority: Option<usize> = None;

    for (i, error) in errors.iter().enumerate() {
        let count = counts.entry(error.kind()).or_insert(0);
        *count += 1;
        if *count > max_count {
            max_count = *count;
            majority = Some(i);
        }
    }

    match majority {
        Some(i) => errors.into_iter().nth(i).expect("index is in range"),
        None => Error::InsufficientShares,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, majority_error};

    #[test]
    fn majority_vote_picks_most_frequent_kind() {
        let errors = vec![
            Error::NoAccess,
            Error::NoAccess,
            Error::ServerGeneral("502".into()),
            Error::Timeout,
            Error::Timeout,
        ];
        assert_eq!(majority_error(errors).kind(), ErrorKind::NoAccess);
    }

    #[test]
    fn majority_vote_tie_keeps_kind_that_peaked_first() {
        let errors = vec![
            Error::Timeout,
            Error::NoAccess,
            Error::NoAccess,
            Error::Timeout,
        ];
        assert_eq!(majority_error(errors).kind(), ErrorKind::NoAccess);
    }

    #[test]
    fn majority_vote_on_empty_input() {
        assert_eq!(majority_error(vec![]).kind(), ErrorKind::InsufficientShares);
    }
}
