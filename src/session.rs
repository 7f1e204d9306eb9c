// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session keys authorizing key requests.
//!
//! A session key is an ephemeral ed25519 key pair, authorized once by the key
//! owner signing a human-readable personal message in their wallet. For the
//! rest of its time-to-live the session key signs individual key requests, so
//! the wallet is not involved on every fetch. Key servers check the
//! certificate chain: owner signature over the personal message, session
//! signature over the request.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{TimeZone, Utc};
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::ZeroizeOnDrop;

use crate::elgamal;
use crate::error::Error;
use crate::object::ObjectId;
use crate::rng::Rng;
use crate::traits::PersonalMessageSigner;

/// The key owner's identity: their ed25519 verifying key.
pub type Address = [u8; 32];

/// Longest permitted session lifetime.
pub const MAX_TTL_MIN: u8 = 30;

/// Grace subtracted from the nominal expiry so a request signed just before
/// the deadline is not rejected by a server with a slightly slower clock.
const EXPIRY_MARGIN_MS: u64 = 10_000;

/// The owner-signed certificate sent along with every key request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub user: Address,
    pub session_vk: [u8; 32],
    pub creation_time: u64,
    pub ttl_min: u8,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

/// The signed portion of a key request, BCS-encoded before signing.
#[derive(Serialize)]
struct RequestFormat {
    ptb: Vec<u8>,
    enc_key: Vec<u8>,
    enc_verification_key: Vec<u8>,
}

/// Everything a key server needs to evaluate one key request.
#[derive(Clone, Debug)]
pub struct KeyRequest {
    pub ptb: Vec<u8>,
    pub enc_key: elgamal::PublicKey,
    pub enc_verification_key: elgamal::VerificationKey,
    pub request_signature: Signature,
    pub certificate: Certificate,
}

/// An ephemeral key authorized to request keys for one package.
#[derive(ZeroizeOnDrop)]
pub struct SessionKey {
    address: Address,
    #[zeroize(skip)]
    package_id: ObjectId,
    creation_time: u64,
    ttl_min: u8,
    session_key: SigningKey,
    #[zeroize(skip)]
    personal_message_signature: Option<Signature>,
}

/// Serializable form of a session key, for persisting across page loads or
/// process restarts. The signature is re-verified on import.
#[derive(Serialize, Deserialize)]
pub struct SessionKeyExport {
    address: Address,
    package_id: ObjectId,
    creation_time: u64,
    ttl_min: u8,
    session_key: [u8; 32],
    #[serde(with = "serde_bytes")]
    personal_message_signature: Option<Vec<u8>>,
}

impl SessionKey {
    /// Create a session key for `package_id`, owned by `address`, valid for
    /// `ttl_min` minutes. The owner must sign [`SessionKey::personal_message`]
    /// before the key can be used.
    pub fn new(
        address: Address,
        package_id: ObjectId,
        ttl_min: u8,
        rng: &Rng,
    ) -> Result<Self, Error> {
        if ttl_min == 0 || ttl_min > MAX_TTL_MIN {
            return Err(Error::InvalidInput(format!(
                "ttl must be between 1 and {MAX_TTL_MIN} minutes"
            )));
        }
        let session_key = rng.with_rng(SigningKey::generate)?;
        Ok(Self {
            address,
            package_id,
            creation_time: Utc::now().timestamp_millis() as u64,
            ttl_min,
            session_key,
            personal_message_signature: None,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn package_id(&self) -> &ObjectId {
        &self.package_id
    }

    /// The message the owner signs in their wallet. Human-readable so the
    /// wallet can display exactly what is being authorized.
    pub fn personal_message(&self) -> Vec<u8> {
        personal_message(
            &self.package_id,
            self.ttl_min,
            self.creation_time,
            &self.session_key.verifying_key(),
        )
    }

    /// Attach the owner's signature over the personal message. Fails with
    /// [`Error::InvalidSignature`] if it does not verify against the owner's
    /// address.
    pub fn set_personal_message_signature(&mut self, signature: Signature) -> Result<(), Error> {
        verify_personal_message(
            &self.address,
            &self.package_id,
            self.ttl_min,
            self.creation_time,
            &self.session_key.verifying_key(),
            &signature,
        )?;
        self.personal_message_signature = Some(signature);
        debug!(package_id = %self.package_id, "session key certified");
        Ok(())
    }

    /// Ask the wallet to sign the personal message and attach the result.
    pub async fn certify<S: PersonalMessageSigner>(&mut self, signer: &S) -> Result<(), Error> {
        let signature = signer.sign_personal_message(&self.personal_message()).await?;
        self.set_personal_message_signature(signature)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp_millis() as u64)
    }

    fn is_expired_at(&self, now_ms: u64) -> bool {
        let expiry = self.creation_time + u64::from(self.ttl_min) * 60_000 - EXPIRY_MARGIN_MS;
        now_ms >= expiry
    }

    /// The certificate for this session, once the owner has signed.
    pub fn certificate(&self) -> Result<Certificate, Error> {
        let signature = self
            .personal_message_signature
            .ok_or(Error::InvalidCertificate)?;
        Ok(Certificate {
            user: self.address,
            session_vk: self.session_key.verifying_key().to_bytes(),
            creation_time: self.creation_time,
            ttl_min: self.ttl_min,
            signature: signature.to_bytes().to_vec(),
        })
    }

    /// Build a signed key request for the given transaction bytes, together
    /// with the ElGamal key that decrypts the server's response.
    pub fn create_request_params(
        &self,
        ptb: Vec<u8>,
        rng: &Rng,
    ) -> Result<(elgamal::SecretKey, KeyRequest), Error> {
        if self.is_expired() {
            return Err(Error::ExpiredSession);
        }
        let certificate = self.certificate()?;
        let (sk, enc_key, enc_verification_key) = elgamal::genkey(rng)?;
        let message = bcs::to_bytes(&RequestFormat {
            ptb: ptb.clone(),
            enc_key: enc_key.to_bytes().to_vec(),
            enc_verification_key: enc_verification_key.to_bytes().to_vec(),
        })
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
        let request_signature = self.session_key.sign(&message);
        Ok((
            sk,
            KeyRequest {
                ptb,
                enc_key,
                enc_verification_key,
                request_signature,
                certificate,
            },
        ))
    }

    pub fn export(&self) -> SessionKeyExport {
        SessionKeyExport {
            address: self.address,
            package_id: self.package_id,
            creation_time: self.creation_time,
            ttl_min: self.ttl_min,
            session_key: self.session_key.to_bytes(),
            personal_message_signature: self
                .personal_message_signature
                .map(|s| s.to_bytes().to_vec()),
        }
    }

    /// Restore an exported session key.
    ///
    /// When `expected_signer` is given it must match the stored address; a
    /// stored personal-message signature is re-verified either way, so a
    /// tampered export cannot produce a usable session.
    pub fn import(
        export: SessionKeyExport,
        expected_signer: Option<&Address>,
    ) -> Result<Self, Error> {
        if let Some(expected) = expected_signer {
            if *expected != export.address {
                return Err(Error::SignerMismatch);
            }
        }
        let session_key = SigningKey::from_bytes(&export.session_key);
        let personal_message_signature = export
            .personal_message_signature
            .map(|bytes| {
                let bytes: [u8; 64] = bytes
                    .try_into()
                    .map_err(|_| Error::InvalidSignature)?;
                let signature = Signature::from_bytes(&bytes);
                verify_personal_message(
                    &export.address,
                    &export.package_id,
                    export.ttl_min,
                    export.creation_time,
                    &session_key.verifying_key(),
                    &signature,
                )?;
                Ok::<_, Error>(signature)
            })
            .transpose()?;
        Ok(Self {
            address: export.address,
            package_id: export.package_id,
            creation_time: export.creation_time,
            ttl_min: export.ttl_min,
            session_key,
            personal_message_signature,
        })
    }
}

fn personal_message(
    package_id: &ObjectId,
    ttl_min: u8,
    creation_time: u64,
    session_vk: &VerifyingKey,
) -> Vec<u8> {
    let from = Utc
        .timestamp_millis_opt(creation_time as i64)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    format!(
        "Accessing keys of package {package_id} for {ttl_min} mins from {from} UTC, session key {}",
        BASE64.encode(session_vk.as_bytes()),
    )
    .into_bytes()
}

fn verify_personal_message(
    address: &Address,
    package_id: &ObjectId,
    ttl_min: u8,
    creation_time: u64,
    session_vk: &VerifyingKey,
    signature: &Signature,
) -> Result<(), Error> {
    let owner = VerifyingKey::from_bytes(address).map_err(|_| Error::InvalidSignature)?;
    let message = personal_message(package_id, ttl_min, creation_time, session_vk);
    owner
        .verify(&message, signature)
        .map_err(|_| Error::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signer as _, SigningKey};

    use super::{MAX_TTL_MIN, SessionKey};
    use crate::error::Error;
    use crate::object::ObjectId;
    use crate::rng::Rng;

    fn owner(rng: &Rng) -> SigningKey {
        rng.with_rng(SigningKey::generate).unwrap()
    }

    fn certified_session(rng: &Rng, owner: &SigningKey) -> SessionKey {
        let mut session = SessionKey::new(
            owner.verifying_key().to_bytes(),
            ObjectId::new([1; 32]),
            10,
            rng,
        )
        .unwrap();
        let signature = owner.sign(&session.personal_message());
        session.set_personal_message_signature(signature).unwrap();
        session
    }

    #[test]
    fn ttl_bounds() {
        let rng = Rng::from_seed([61; 32]);
        let address = [0u8; 32];
        let package_id = ObjectId::new([1; 32]);
        assert!(SessionKey::new(address, package_id, 0, &rng).is_err());
        assert!(SessionKey::new(address, package_id, MAX_TTL_MIN + 1, &rng).is_err());
        assert!(SessionKey::new(address, package_id, MAX_TTL_MIN, &rng).is_ok());
    }

    #[test]
    fn personal_message_is_readable() {
        let rng = Rng::from_seed([62; 32]);
        let session = SessionKey::new([0u8; 32], ObjectId::new([0xab; 32]), 5, &rng).unwrap();
        let message = String::from_utf8(session.personal_message()).unwrap();
        assert!(message.starts_with(&format!(
            "Accessing keys of package 0x{} for 5 mins from ",
            "ab".repeat(32)
        )));
        assert!(message.contains(" UTC, session key "));
    }

    #[test]
    fn wrong_owner_signature_is_rejected() {
        let rng = Rng::from_seed([63; 32]);
        let owner_key = owner(&rng);
        let imposter = owner(&rng);
        let mut session = SessionKey::new(
            owner_key.verifying_key().to_bytes(),
            ObjectId::new([1; 32]),
            10,
            &rng,
        )
        .unwrap();
        let signature = imposter.sign(&session.personal_message());
        assert!(matches!(
            session.set_personal_message_signature(signature),
            Err(Error::InvalidSignature)
        ));
        assert!(matches!(
            session.certificate(),
            Err(Error::InvalidCertificate)
        ));
    }

    #[test]
    fn request_params_are_signed_by_the_session_key() {
        use ed25519_dalek::{Verifier as _, VerifyingKey};

        let rng = Rng::from_seed([64; 32]);
        let owner = owner(&rng);
        let session = certified_session(&rng, &owner);

        let (_, request) = session
            .create_request_params(b"tx bytes".to_vec(), &rng)
            .unwrap();
        assert_eq!(request.ptb, b"tx bytes".to_vec());
        assert!(request.enc_key.matches(&request.enc_verification_key));

        let certificate = &request.certificate;
        assert_eq!(certificate.user, owner.verifying_key().to_bytes());
        let session_vk = VerifyingKey::from_bytes(&certificate.session_vk).unwrap();
        let message = bcs::to_bytes(&super::RequestFormat {
            ptb: request.ptb.clone(),
            enc_key: request.enc_key.to_bytes().to_vec(),
            enc_verification_key: request.enc_verification_key.to_bytes().to_vec(),
        })
        .unwrap();
        assert!(session_vk.verify(&message, &request.request_signature).is_ok());
    }

    #[test]
    fn expiry_has_a_safety_margin() {
        let rng = Rng::from_seed([65; 32]);
        let session = SessionKey::new([0u8; 32], ObjectId::new([1; 32]), 10, &rng).unwrap();
        let start = session.creation_time;
        assert!(!session.is_expired_at(start));
        assert!(!session.is_expired_at(start + 10 * 60_000 - 10_001));
        assert!(session.is_expired_at(start + 10 * 60_000 - 10_000));
        assert!(session.is_expired_at(start + 10 * 60_000));
    }

    #[tokio::test]
    async fn certify_through_the_wallet_seam() {
        use ed25519_dalek::Signature;

        use crate::traits::PersonalMessageSigner;

        struct Wallet(SigningKey);

        impl PersonalMessageSigner for Wallet {
            fn sign_personal_message(
                &self,
                message: &[u8],
            ) -> impl Future<Output = Result<Signature, Error>> + Send {
                let signature = self.0.sign(message);
                async move { Ok(signature) }
            }
        }

        let rng = Rng::from_seed([67; 32]);
        let wallet = Wallet(owner(&rng));
        let mut session = SessionKey::new(
            wallet.0.verifying_key().to_bytes(),
            ObjectId::new([1; 32]),
            10,
            &rng,
        )
        .unwrap();
        session.certify(&wallet).await.unwrap();
        assert!(session.certificate().is_ok());
    }

    #[test]
    fn export_import_round_trip() {
        let rng = Rng::from_seed([66; 32]);
        let owner = owner(&rng);
        let session = certified_session(&rng, &owner);

        let address = *session.address();
        let imported = SessionKey::import(session.export(), Some(&address)).unwrap();
        assert!(imported.certificate().is_ok());
        assert_eq!(imported.certificate().unwrap(), session.certificate().unwrap());

        assert!(matches!(
            SessionKey::import(session.export(), Some(&[9u8; 32])),
            Err(Error::SignerMismatch)
        ));

        // A tampered export does not verify.
        let mut tampered = session.export();
        tampered.ttl_min = 1;
        assert!(matches!(
            SessionKey::import(tampered, None),
            Err(Error::InvalidSignature)
        ));
    }
}
