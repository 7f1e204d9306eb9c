// SPDX-License-Identifier: MIT OR Apache-2.0

//! Threshold secret sharing of 32-byte keys.
//!
//! The polynomial arithmetic is delegated to the external `sharks` crate,
//! which works over GF(2⁸) with one polynomial per secret byte and carries
//! the share index as the leading byte of its share encoding. This adapter
//! keeps the index separate from the 32 share bytes, since the wire format
//! stores them in different places, and handles the `threshold == 1` case
//! itself: the underlying library needs at least two shares to reconstruct,
//! while a threshold of one means the secret is not split at all.
//!
//! Reconstruction from fewer than `threshold` distinct shares yields a value
//! indistinguishable from random rather than an error; callers must enforce
//! the threshold before combining.

use sharks::{Share, Sharks};

use crate::error::Error;
use crate::kdf::KEY_SIZE;
use crate::rng::Rng;

/// A share of a secret: its index (1..=255) and the share bytes.
pub type IndexedShare = (u8, [u8; KEY_SIZE]);

/// Split `secret` into `n` shares, any `threshold` of which reconstruct it.
pub fn split(
    secret: &[u8; KEY_SIZE],
    n: u8,
    threshold: u8,
    rng: &Rng,
) -> Result<Vec<IndexedShare>, Error> {
    if n == 0 || threshold == 0 || threshold > n {
        return Err(Error::InvalidInput(format!(
            "invalid threshold {threshold} for {n} shares"
        )));
    }

    if threshold == 1 {
        // The polynomial would be constant, so every share is the secret
        // itself. Indices are assigned as a counter to keep them unique.
        return Ok((1..=n).map(|index| (index, *secret)).collect());
    }

    let shares: Vec<Share> = rng.with_rng(|rng| {
        Sharks(threshold)
            .dealer_rng(secret, rng)
            .take(n as usize)
            .collect()
    })?;

    shares
        .iter()
        .map(|share| {
            // The library's encoding is index byte first, share bytes after.
            let bytes = Vec::from(share);
            let index = bytes[0];
            let share: [u8; KEY_SIZE] = bytes[1..]
                .try_into()
                .map_err(|_| Error::InvalidInput("unexpected share length".into()))?;
            Ok((index, share))
        })
        .collect()
}

/// Combine shares into the secret.
///
/// A single share is returned verbatim; this is only meaningful when the
/// secret was split with a threshold of one.
pub fn combine(shares: &[IndexedShare]) -> Result<[u8; KEY_SIZE], Error> {
    validate_indices(shares)?;

    if shares.len() == 1 {
        return Ok(shares[0].1);
    }

    let shares: Vec<Share> = shares
        .iter()
        .map(|(index, share)| {
            let mut bytes = Vec::with_capacity(1 + KEY_SIZE);
            bytes.push(*index);
            bytes.extend_from_slice(share);
            Share::try_from(bytes.as_slice())
                .map_err(|e| Error::InvalidInput(e.to_string()))
        })
        .collect::<Result<_, _>>()?;

    let secret = Sharks(shares.len() as u8)
        .recover(shares.iter())
        .map_err(|e| Error::InvalidInput(e.to_string()))?;

    secret
        .try_into()
        .map_err(|_| Error::InvalidInput("unexpected secret length".into()))
}

/// Interpolate the sharing polynomials and return an evaluation function.
///
/// Evaluating at a share index reproduces that share, evaluating at 0 gives
/// the secret. Used to check decrypted shares for consistency.
pub fn interpolate(shares: &[IndexedShare]) -> Result<impl Fn(u8) -> [u8; KEY_SIZE], Error> {
    validate_indices(shares)?;
    let points: Vec<(gf256::gf256, [gf256::gf256; KEY_SIZE])> = shares
        .iter()
        .map(|(index, share)| {
            (
                gf256::gf256::new(*index),
                share.map(gf256::gf256::new),
            )
        })
        .collect();

    Ok(move |x: u8| {
        let x = gf256::gf256::new(x);
        let mut result = [0u8; KEY_SIZE];
        for (byte, out) in result.iter_mut().enumerate() {
            let mut sum = gf256::gf256::new(0);
            for (j, (x_j, y_j)) in points.iter().enumerate() {
                let mut term = y_j[byte];
                for (i, (x_i, _)) in points.iter().enumerate() {
                    if i != j {
                        term *= (x - *x_i) / (*x_j - *x_i);
                    }
                }
                sum += term;
            }
            *out = u8::from(sum);
        }
        result
    })
}

fn validate_indices(shares: &[IndexedShare]) -> Result<(), Error> {
    if shares.is_empty() {
        return Err(Error::InvalidInput("no shares provided".into()));
    }
    let mut seen = [false; 256];
    for (index, _) in shares {
        if *index == 0 {
            return Err(Error::InvalidInput("share index 0 is reserved".into()));
        }
        if seen[*index as usize] {
            return Err(Error::InvalidInput(format!("duplicate share index {index}")));
        }
        seen[*index as usize] = true;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{combine, interpolate, split};
    use crate::rng::Rng;

    #[test]
    fn split_and_combine_any_threshold_subset() {
        let rng = Rng::from_seed([11; 32]);
        let secret = [42u8; 32];
        let shares = split(&secret, 5, 3, &rng).unwrap();
        assert_eq!(shares.len(), 5);
        assert_eq!(
            shares.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );

        assert_eq!(combine(&[shares[0], shares[2], shares[4]]).unwrap(), secret);
        assert_eq!(combine(&shares).unwrap(), secret);
    }

    #[test]
    fn below_threshold_reconstruction_is_garbage() {
        let rng = Rng::from_seed([12; 32]);
        let secret = [1u8; 32];
        let shares = split(&secret, 3, 3, &rng).unwrap();
        // Two of three shares reconstruct, but not to the secret.
        assert_ne!(combine(&[shares[0], shares[1]]).unwrap(), secret);
    }

    #[test]
    fn threshold_one_shares_are_the_secret() {
        let rng = Rng::from_seed([13; 32]);
        let secret = [9u8; 32];
        let shares = split(&secret, 3, 1, &rng).unwrap();
        for (_, share) in &shares {
            assert_eq!(*share, secret);
        }
        // A single share is returned verbatim.
        assert_eq!(combine(&shares[..1]).unwrap(), secret);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let rng = Rng::from_seed([14; 32]);
        assert!(split(&[0; 32], 2, 3, &rng).is_err());
        assert!(split(&[0; 32], 0, 0, &rng).is_err());
        assert!(combine(&[]).is_err());
        assert!(combine(&[(1, [0; 32]), (1, [1; 32])]).is_err());
        assert!(combine(&[(0, [0; 32]), (1, [1; 32])]).is_err());
    }

    #[test]
    fn interpolation_matches_shares_and_secret() {
        let rng = Rng::from_seed([15; 32]);
        let secret = [7u8; 32];
        let shares = split(&secret, 4, 2, &rng).unwrap();
        let polynomial = interpolate(&shares[..2]).unwrap();
        for (index, share) in &shares {
            assert_eq!(polynomial(*index), *share);
        }
        assert_eq!(polynomial(0), secret);
    }
}
