// SPDX-License-Identifier: MIT OR Apache-2.0

//! Arithmetic over the BLS12-381 pairing-friendly curve.
//!
//! Wraps the arkworks backend behind small element types which own the wire
//! encodings: points use the ZCash compressed format (big-endian field
//! elements with compression, infinity and sort flags in the top bits of the
//! first byte, G2 coordinates as c1 ‖ c0) and target-group elements use a
//! fixed 576-byte encoding with a documented coefficient permutation. These
//! encodings interoperate with blst-based implementations, so they must not
//! be changed.

use ark_bls12_381::{Bls12_381, Fq, Fq2, Fr, G1Affine, G1Projective, G2Affine, G2Projective, g1, g2};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ec::hashing::HashToCurve;
use ark_ec::hashing::curve_maps::wb::WBMap;
use ark_ec::hashing::map_to_curve_hasher::MapToCurveBasedHasher;
use ark_ec::pairing::{Pairing, PairingOutput};
use ark_ff::field_hashers::DefaultFieldHasher;
use ark_ff::{BigInt, BigInteger, PrimeField, Zero};
use sha2::Sha256;

use crate::error::Error;
use crate::rng::Rng;

/// Flag bits of the first byte of a compressed point.
const COMPRESSED_FLAG: u8 = 0x80;
const INFINITY_FLAG: u8 = 0x40;
const SORT_FLAG: u8 = 0x20;

/// RFC 9380 suite identifiers for hashing arbitrary bytes to the curve.
const G1_HASH_DST: &[u8] = b"BLS12381G1_XMD:SHA-256_SSWU_RO_";
const G2_HASH_DST: &[u8] = b"BLS12381G2_XMD:SHA-256_SSWU_RO_";

type G1Hasher =
    MapToCurveBasedHasher<G1Projective, DefaultFieldHasher<Sha256, 128>, WBMap<g1::Config>>;
type G2Hasher =
    MapToCurveBasedHasher<G2Projective, DefaultFieldHasher<Sha256, 128>, WBMap<g2::Config>>;

fn fq_to_be_bytes(fq: &Fq) -> [u8; 48] {
    fq.into_bigint()
        .to_bytes_be()
        .try_into()
        .expect("base field elements are 48 bytes")
}

fn fq_from_be_bytes(bytes: &[u8; 48]) -> Result<Fq, Error> {
    let mut limbs = [0u64; 6];
    for (limb, chunk) in limbs.iter_mut().zip(bytes.rchunks(8)) {
        *limb = u64::from_be_bytes(chunk.try_into().expect("chunk is 8 bytes"));
    }
    Fq::from_bigint(BigInt::new(limbs)).ok_or(Error::InvalidPoint)
}

/// Whether y is the lexicographically larger of {y, -y}, as defined by the
/// big-endian encoding of the field element.
fn fq_is_largest(y: &Fq) -> bool {
    y.into_bigint() > (-*y).into_bigint()
}

fn fq2_is_largest(y: &Fq2) -> bool {
    let neg = -*y;
    match y.c1.into_bigint().cmp(&neg.c1.into_bigint()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => y.c0.into_bigint() > neg.c0.into_bigint(),
    }
}

/// An integer modulo the group order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scalar(pub(crate) Fr);

impl Scalar {
    pub const SIZE: usize = 32;

    /// Sample a uniformly random scalar by wide reduction of 64 random bytes.
    pub fn rand(rng: &Rng) -> Result<Self, Error> {
        let bytes = rng.random_array::<64>()?;
        Ok(Self(Fr::from_le_bytes_mod_order(&bytes)))
    }

    pub fn from_bytes_be(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: &[u8; Self::SIZE] = bytes.try_into().map_err(|_| Error::InvalidScalar)?;
        let mut limbs = [0u64; 4];
        for (limb, chunk) in limbs.iter_mut().zip(bytes.rchunks(8)) {
            *limb = u64::from_be_bytes(chunk.try_into().expect("chunk is 8 bytes"));
        }
        Fr::from_bigint(BigInt::new(limbs))
            .map(Self)
            .ok_or(Error::InvalidScalar)
    }

    pub fn from_bytes_le(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: &[u8; Self::SIZE] = bytes.try_into().map_err(|_| Error::InvalidScalar)?;
        let mut reversed = *bytes;
        reversed.reverse();
        Self::from_bytes_be(&reversed)
    }

    pub fn to_bytes_be(&self) -> [u8; Self::SIZE] {
        self.0
            .into_bigint()
            .to_bytes_be()
            .try_into()
            .expect("scalars are 32 bytes")
    }
}

impl std::ops::Add for Scalar {
    type Output = Scalar;

    fn add(self, other: Scalar) -> Scalar {
        Scalar(self.0 + other.0)
    }
}

impl std::ops::Mul for Scalar {
    type Output = Scalar;

    fn mul(self, other: Scalar) -> Scalar {
        Scalar(self.0 * other.0)
    }
}

/// A point on the G1 group, 48 bytes compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct G1Element(pub(crate) G1Projective);

impl G1Element {
    pub const SIZE: usize = 48;

    pub fn generator() -> Self {
        Self(G1Affine::generator().into())
    }

    pub fn zero() -> Self {
        Self(G1Projective::zero())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: &[u8; Self::SIZE] = bytes.try_into().map_err(|_| Error::InvalidPoint)?;
        let flags = bytes[0];
        if flags & COMPRESSED_FLAG == 0 {
            return Err(Error::InvalidPoint);
        }
        if flags & INFINITY_FLAG != 0 {
            if flags != COMPRESSED_FLAG | INFINITY_FLAG || bytes[1..].iter().any(|b| *b != 0) {
                return Err(Error::InvalidPoint);
            }
            return Ok(Self::zero());
        }
        let mut x_bytes = *bytes;
        x_bytes[0] &= !(COMPRESSED_FLAG | INFINITY_FLAG | SORT_FLAG);
        let x = fq_from_be_bytes(&x_bytes)?;
        let point = G1Affine::get_point_from_x_unchecked(x, flags & SORT_FLAG != 0)
            .ok_or(Error::InvalidPoint)?;
        if !point.is_in_correct_subgroup_assuming_on_curve() {
            return Err(Error::InvalidPoint);
        }
        Ok(Self(point.into()))
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let affine = self.0.into_affine();
        let mut out = [0u8; Self::SIZE];
        if affine.infinity {
            out[0] = COMPRESSED_FLAG | INFINITY_FLAG;
            return out;
        }
        out.copy_from_slice(&fq_to_be_bytes(&affine.x));
        out[0] |= COMPRESSED_FLAG;
        if fq_is_largest(&affine.y) {
            out[0] |= SORT_FLAG;
        }
        out
    }

    /// Deterministically map arbitrary bytes to a group element.
    pub fn hash_to_curve(data: &[u8]) -> Self {
        let hasher = G1Hasher::new(G1_HASH_DST).expect("suite parameters are valid");
        let point = hasher.hash(data).expect("hashing to G1 does not fail");
        Self(point.into())
    }

    pub fn add(&self, other: &G1Element) -> G1Element {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: &G1Element) -> G1Element {
        Self(self.0 - other.0)
    }

    pub fn mul(&self, scalar: &Scalar) -> G1Element {
        Self(self.0 * scalar.0)
    }

    /// The bilinear pairing into the target group.
    pub fn pairing(&self, other: &G2Element) -> GtElement {
        GtElement(Bls12_381::pairing(
            self.0.into_affine(),
            other.0.into_affine(),
        ))
    }
}

/// A point on the G2 group, 96 bytes compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct G2Element(pub(crate) G2Projective);

impl G2Element {
    pub const SIZE: usize = 96;

    pub fn generator() -> Self {
        Self(G2Affine::generator().into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let bytes: &[u8; Self::SIZE] = bytes.try_into().map_err(|_| Error::InvalidPoint)?;
        let flags = bytes[0];
        if flags & COMPRESSED_FLAG == 0 {
            return Err(Error::InvalidPoint);
        }
        if flags & INFINITY_FLAG != 0 {
            if flags != COMPRESSED_FLAG | INFINITY_FLAG || bytes[1..].iter().any(|b| *b != 0) {
                return Err(Error::InvalidPoint);
            }
            return Ok(Self(G2Projective::zero()));
        }
        let mut c1_bytes: [u8; 48] = bytes[..48].try_into().expect("slice is 48 bytes");
        c1_bytes[0] &= !(COMPRESSED_FLAG | INFINITY_FLAG | SORT_FLAG);
        let c1 = fq_from_be_bytes(&c1_bytes)?;
        let c0 = fq_from_be_bytes(bytes[48..].try_into().expect("slice is 48 bytes"))?;
        let x = Fq2::new(c0, c1);
        let point = G2Affine::get_point_from_x_unchecked(x, flags & SORT_FLAG != 0)
            .ok_or(Error::InvalidPoint)?;
        if !point.is_in_correct_subgroup_assuming_on_curve() {
            return Err(Error::InvalidPoint);
        }
        Ok(Self(point.into()))
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let affine = self.0.into_affine();
        let mut out = [0u8; Self::SIZE];
        if affine.infinity {
            out[0] = COMPRESSED_FLAG | INFINITY_FLAG;
            return out;
        }
        out[..48].copy_from_slice(&fq_to_be_bytes(&affine.x.c1));
        out[48..].copy_from_slice(&fq_to_be_bytes(&affine.x.c0));
        out[0] |= COMPRESSED_FLAG;
        if fq2_is_largest(&affine.y) {
            out[0] |= SORT_FLAG;
        }
        out
    }

    pub fn hash_to_curve(data: &[u8]) -> Self {
        let hasher = G2Hasher::new(G2_HASH_DST).expect("suite parameters are valid");
        let point = hasher.hash(data).expect("hashing to G2 does not fail");
        Self(point.into())
    }

    pub fn add(&self, other: &G2Element) -> G2Element {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: &G2Element) -> G2Element {
        Self(self.0 - other.0)
    }

    pub fn mul(&self, scalar: &Scalar) -> G2Element {
        Self(self.0 * scalar.0)
    }
}

/// An element of the target group, produced by the pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GtElement(PairingOutput<Bls12_381>);

impl GtElement {
    pub const SIZE: usize = 576;

    /// Serialize to the fixed cross-implementation encoding.
    ///
    /// The six Fq2 coefficients of the underlying Fq12, taken in tower order
    /// (c0.c0, c0.c1, c0.c2, c1.c0, c1.c1, c1.c2), are emitted in the
    /// permuted order [0, 3, 1, 4, 2, 5]; each coefficient is written as its
    /// two 48-byte big-endian base-field limbs, c0 first. The permutation
    /// matches the coefficient layout of blst-based implementations and is
    /// part of the wire contract.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        const PERMUTATION: [usize; 6] = [0, 3, 1, 4, 2, 5];
        let fq12 = self.0.0;
        let coefficients = [
            fq12.c0.c0, fq12.c0.c1, fq12.c0.c2, fq12.c1.c0, fq12.c1.c1, fq12.c1.c2,
        ];
        let mut out = [0u8; Self::SIZE];
        for (target, source) in PERMUTATION.iter().enumerate() {
            let pair = &coefficients[*source];
            out[target * 96..target * 96 + 48].copy_from_slice(&fq_to_be_bytes(&pair.c0));
            out[target * 96 + 48..(target + 1) * 96].copy_from_slice(&fq_to_be_bytes(&pair.c1));
        }
        out
    }
}
