// SPDX-License-Identifier: MIT OR Apache-2.0

//! ElGamal encryption of G1 points.
//!
//! Each key request carries a freshly generated ElGamal key pair; the server
//! encrypts the user secret key to it, so the key is never exposed in
//! transit. The verification key in G2 lets the server check that the
//! encryption key is well formed.

use crate::bls::{G1Element, G2Element, Scalar};
use crate::error::Error;
use crate::rng::Rng;

/// Decryption key, held only by the requesting client.
pub struct SecretKey(Scalar);

/// Encryption key `g1 · sk`, sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(G1Element);

/// Verification key `g2 · sk`, lets the server check the pair with a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationKey(G2Element);

/// An ElGamal ciphertext over G1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encryption(G1Element, G1Element);

/// Generate a fresh key triple.
pub fn genkey(rng: &Rng) -> Result<(SecretKey, PublicKey, VerificationKey), Error> {
    let sk = Scalar::rand(rng)?;
    let pk = G1Element::generator().mul(&sk);
    let vk = G2Element::generator().mul(&sk);
    Ok((SecretKey(sk), PublicKey(pk), VerificationKey(vk)))
}

/// Encrypt a G1 point to `pk`.
pub fn encrypt(rng: &Rng, msg: &G1Element, pk: &PublicKey) -> Result<Encryption, Error> {
    let r = Scalar::rand(rng)?;
    Ok(Encryption(
        G1Element::generator().mul(&r),
        msg.add(&pk.0.mul(&r)),
    ))
}

/// Decrypt an encryption made to the matching public key.
pub fn decrypt(sk: &SecretKey, encryption: &Encryption) -> G1Element {
    encryption.1.sub(&encryption.0.mul(&sk.0))
}

impl PublicKey {
    pub fn to_bytes(&self) -> [u8; G1Element::SIZE] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        G1Element::from_bytes(bytes).map(Self)
    }

    /// Whether `vk` belongs to the same secret key, via
    /// `e(pk, g2) == e(g1, vk)`.
    pub fn matches(&self, vk: &VerificationKey) -> bool {
        self.0.pairing(&G2Element::generator())
            == G1Element::generator().pairing(&vk.0)
    }
}

impl VerificationKey {
    pub fn to_bytes(&self) -> [u8; G2Element::SIZE] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        G2Element::from_bytes(bytes).map(Self)
    }
}

impl Encryption {
    pub fn to_bytes(&self) -> [u8; 2 * G1Element::SIZE] {
        let mut out = [0u8; 2 * G1Element::SIZE];
        out[..G1Element::SIZE].copy_from_slice(&self.0.to_bytes());
        out[G1Element::SIZE..].copy_from_slice(&self.1.to_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != 2 * G1Element::SIZE {
            return Err(Error::InvalidPoint);
        }
        Ok(Self(
            G1Element::from_bytes(&bytes[..G1Element::SIZE])?,
            G1Element::from_bytes(&bytes[G1Element::SIZE..])?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{Encryption, decrypt, encrypt, genkey};
    use crate::bls::{G1Element, Scalar};
    use crate::rng::Rng;

    #[test]
    fn encryption_round_trip() {
        let rng = Rng::from_seed([31; 32]);
        let (sk, pk, vk) = genkey(&rng).unwrap();
        assert!(pk.matches(&vk));

        let msg = G1Element::hash_to_curve(b"user secret key");
        let encryption = encrypt(&rng, &msg, &pk).unwrap();
        assert_eq!(decrypt(&sk, &encryption), msg);

        let (other_sk, other_pk, _) = genkey(&rng).unwrap();
        assert!(!other_pk.matches(&vk));
        assert_ne!(decrypt(&other_sk, &encryption), msg);
    }

    #[test]
    fn encryption_bytes_round_trip() {
        let rng = Rng::from_seed([32; 32]);
        let (_, pk, _) = genkey(&rng).unwrap();
        let msg = G1Element::generator().mul(&Scalar::rand(&rng).unwrap());
        let encryption = encrypt(&rng, &msg, &pk).unwrap();
        assert_eq!(
            Encryption::from_bytes(&encryption.to_bytes()).unwrap(),
            encryption
        );
        assert!(Encryption::from_bytes(&[0u8; 96]).is_err());
    }
}
