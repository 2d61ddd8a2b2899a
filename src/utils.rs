// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Big-integer and curve utilities shared by every layer of the crate.

use crate::errors::{
    Error::{self, CouldNotConvertToScalar, RetryFailed},
    Result,
};
use generic_array::GenericArray;
use k256::{
    elliptic_curve::{
        bigint::Encoding,
        group::ff::PrimeField,
        sec1::{FromEncodedPoint, ToEncodedPoint},
        Curve,
    },
    AffinePoint, EncodedPoint, Secp256k1,
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512_256};

pub(crate) const CRYPTOGRAPHIC_RETRY_MAX: usize = 500usize;

/// Wrapper around k256::ProjectivePoint so that we can define our own
/// serialization/deserialization for it.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct CurvePoint(pub(crate) k256::ProjectivePoint);

impl CurvePoint {
    pub(crate) const GENERATOR: Self = CurvePoint(k256::ProjectivePoint::GENERATOR);
    /// The identity point, used to initialize point aggregation.
    pub const IDENTITY: Self = CurvePoint(k256::ProjectivePoint::IDENTITY);

    pub(crate) fn multiply(&self, scalar: &k256::Scalar) -> Self {
        Self(self.0 * scalar)
    }

    pub(crate) fn add(&self, other: &Self) -> Self {
        Self(self.0 + other.0)
    }

    /// SEC1 compressed encoding.
    pub(crate) fn to_bytes(self) -> Vec<u8> {
        self.0.to_affine().to_encoded_point(true).as_bytes().to_vec()
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let encoded = EncodedPoint::from_bytes(bytes).or(Err(Error::Serialization))?;
        let point: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
        Ok(Self(point.ok_or(Error::Serialization)?.into()))
    }

    /// The x-coordinate of the point, as a scalar.
    pub(crate) fn x_projection(&self) -> Result<k256::Scalar> {
        use k256::elliptic_curve::AffineXCoordinate;
        let x = self.0.to_affine().x();
        Option::from(k256::Scalar::from_repr(x)).ok_or(CouldNotConvertToScalar)
    }

    /// True if the affine y-coordinate is odd.
    pub(crate) fn y_is_odd(&self) -> bool {
        // Compressed SEC1 tag is 0x03 for odd y.
        self.0.to_affine().to_encoded_point(true).as_bytes()[0] == 0x03
    }
}

impl From<k256::ProjectivePoint> for CurvePoint {
    fn from(p: k256::ProjectivePoint) -> Self {
        Self(p)
    }
}

impl Serialize for CurvePoint {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let afp = AffinePoint::from(self.0);
        afp.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CurvePoint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let p = AffinePoint::deserialize(deserializer)?;
        Ok(Self(p.into()))
    }
}

/// Compute a^e (mod n).
pub(crate) fn modpow(a: &BigNumber, e: &BigNumber, n: &BigNumber) -> BigNumber {
    a.modpow(e, n)
}

/// Sample a number uniformly at random from the range [0, n). This can be
/// used for sampling from a prime field `F_p` or the integers modulo `n`
/// (for any `n`).
pub(crate) fn random_positive_bn<R: RngCore + CryptoRng>(rng: &mut R, n: &BigNumber) -> BigNumber {
    BigNumber::from_rng(n, rng)
}

/// Sample a number uniformly at random from the range [-n, n].
pub(crate) fn random_plusminus<R: RngCore + CryptoRng>(rng: &mut R, n: &BigNumber) -> BigNumber {
    // `from_rng()` samples the _open_ interval, so add 1 to get the closed
    // interval for `n`.
    let open_interval_max: BigNumber = n + 1;
    let val = BigNumber::from_rng(&open_interval_max, rng);
    let is_positive: bool = rng.gen();
    match is_positive {
        true => val,
        false => -val,
    }
}

/// Sample a number uniformly at random from the range `[-2^n, 2^n]`.
pub(crate) fn random_plusminus_by_size<R: RngCore + CryptoRng>(rng: &mut R, n: usize) -> BigNumber {
    let range = BigNumber::one() << n;
    random_plusminus(rng, &range)
}

/// Generate a random `BigNumber` that is in the multiplicative group of
/// integers modulo `n`.
///
/// Note: In this application, `n` is typically the product of two primes. If
/// the drawn element is not coprime with `n` and is not `0 mod n`, then the
/// caller has accidentally stumbled upon the factorization of `n`!
/// This is a security issue when `n` is someone else's Paillier modulus, but
/// the chance of this happening is basically 0 and we drop the element
/// anyway.
pub(crate) fn random_bn_in_z_star<R: RngCore + CryptoRng>(
    rng: &mut R,
    n: &BigNumber,
) -> Result<BigNumber> {
    // Try up to `CRYPTOGRAPHIC_RETRY_MAX` times to draw a suitable element.
    // This should virtually never error, though.
    std::iter::repeat_with(|| BigNumber::from_rng(n, rng))
        .take(CRYPTOGRAPHIC_RETRY_MAX)
        .find(|result| result != &BigNumber::zero() && result.gcd(n) == BigNumber::one())
        .ok_or(RetryFailed)
}

/// True if `a ≡ b (mod m)`.
pub(crate) fn is_congruent(a: &BigNumber, b: &BigNumber, m: &BigNumber) -> bool {
    (a - b) % m == BigNumber::zero()
}

/// True if `(a + b) ≡ 0 (mod m)`.
pub(crate) fn is_additive_inverse(a: &BigNumber, b: &BigNumber, m: &BigNumber) -> bool {
    is_congruent(&(a + b), &BigNumber::zero(), m)
}

pub(crate) fn bn_to_scalar(x: &BigNumber) -> Result<k256::Scalar> {
    // Take (mod q)
    let order = k256_order();

    let x_modded = x % order;
    let bytes = x_modded.to_bytes();

    let mut slice = vec![0u8; 32 - bytes.len()];
    slice.extend_from_slice(&bytes);
    let mut ret: k256::Scalar = Option::from(k256::Scalar::from_repr(
        GenericArray::clone_from_slice(&slice),
    ))
    .ok_or(CouldNotConvertToScalar)?;

    // Make sure to negate the scalar if the original input was negative
    if x < &BigNumber::zero() {
        ret = ret.negate();
    }

    Ok(ret)
}

pub(crate) fn scalar_to_bn(x: &k256::Scalar) -> BigNumber {
    BigNumber::from_slice(x.to_bytes().as_slice())
}

pub(crate) fn k256_order() -> BigNumber {
    // Set order = q
    let order_bytes: [u8; 32] = Secp256k1::ORDER.to_be_bytes();
    BigNumber::from_slice(order_bytes)
}

//////////////////////////
// Fiat-Shamir challenge //
//////////////////////////

/// Derive a Fiat-Shamir challenge `e ∈ [0, 2^256)` as SHA-512/256 over a
/// domain-separation label and the length-prefixed big-endian encodings of
/// an ordered list of transcript parts (statement fields, ring-Pedersen
/// parameters, prover commitments).
pub(crate) fn challenge_from_parts(label: &'static [u8], parts: &[Vec<u8>]) -> Result<BigNumber> {
    let mut hasher = Sha512_256::new();
    hasher.update((label.len() as u32).to_be_bytes());
    hasher.update(label);
    for part in parts {
        let len = u32::try_from(part.len()).or(Err(Error::Serialization))?;
        hasher.update(len.to_be_bytes());
        hasher.update(part);
    }
    Ok(BigNumber::from_slice(hasher.finalize()))
}

/// Transcript part for a big integer.
pub(crate) fn bn_part(x: &BigNumber) -> Vec<u8> {
    x.to_bytes()
}

/// Transcript part for a curve point (SEC1 compressed).
pub(crate) fn point_part(p: &CurvePoint) -> Vec<u8> {
    p.to_bytes()
}

////////////////////////////
// Test Utility Functions //
////////////////////////////

#[cfg(test)]
use rand::{
    rngs::{OsRng, StdRng},
    SeedableRng,
};

/// Returns an rng to be used for testing. This will print the rng seed
/// to stderr so that if a test fails, the failing seed can be recovered
/// and used for debugging.
#[cfg(test)]
pub(crate) fn get_test_rng() -> StdRng {
    let mut seeder = OsRng;
    let seed = seeder.gen();
    eprintln!("seed: {seed:?}");
    StdRng::from_seed(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bn_in_range() {
        // Statistical tests -- should generate random numbers that are long
        // enough
        let mut max_len = 0;
        let num_bytes = 100;

        let mut rng = get_test_rng();
        for _ in 0..1000 {
            let bn = random_plusminus_by_size(&mut rng, num_bytes * 8);
            let len = bn.to_bytes().len();
            if max_len < len {
                max_len = len;
            }
        }

        assert!(max_len > num_bytes - 2);
    }

    #[test]
    fn test_bn_to_scalar_neg() {
        let neg1 = BigNumber::zero() - BigNumber::one();

        let scalar = bn_to_scalar(&neg1).unwrap();
        assert_eq!(k256::Scalar::ZERO, scalar.add(&k256::Scalar::ONE));
    }

    #[test]
    fn test_scalar_roundtrip() {
        let mut rng = get_test_rng();
        let x = random_positive_bn(&mut rng, &k256_order());
        let s = bn_to_scalar(&x).unwrap();
        assert_eq!(x, scalar_to_bn(&s));
    }

    #[test]
    fn test_additive_inverse_mod_q() {
        let mut rng = get_test_rng();
        let q = k256_order();
        let a = random_positive_bn(&mut rng, &q);
        let b = &q - &a;
        assert!(is_additive_inverse(&a, &b, &q));
        assert!(is_congruent(&(&a + &b), &BigNumber::zero(), &q));
    }

    #[test]
    fn test_point_bytes_roundtrip() {
        let mut rng = get_test_rng();
        let x = random_positive_bn(&mut rng, &k256_order());
        let p = CurvePoint::GENERATOR.multiply(&bn_to_scalar(&x).unwrap());
        let q = CurvePoint::from_bytes(&p.to_bytes()).unwrap();
        assert_eq!(p, q);
    }

    #[test]
    fn test_challenge_is_order_sensitive() {
        let a = bn_part(&BigNumber::from(1u64));
        let b = bn_part(&BigNumber::from(2u64));
        let e1 = challenge_from_parts(b"test", &[a.clone(), b.clone()]).unwrap();
        let e2 = challenge_from_parts(b"test", &[b, a]).unwrap();
        assert_ne!(e1, e2);
    }
}
