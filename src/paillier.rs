// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Paillier encryption over safe-prime moduli.
//!
//! The decryption key keeps its factorization around so that
//! [`DecryptionKey::decrypt_full`] can recover the encryption randomness;
//! the Dec proof uses that randomness as part of its witness.

use crate::errors::{Error, ProofType, Result};
use crate::parameters::PRIME_BITS;
use crate::utils::{
    bn_part, challenge_from_parts, modpow, point_part, random_bn_in_z_star, CurvePoint,
    CRYPTOGRAPHIC_RETRY_MAX,
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Paillier-specific errors.
#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaillierError {
    #[error("failed to create a Paillier decryption key from inputs")]
    CouldNotCreateKey,
    #[error("the inputs to a homomorphic operation on a Paillier ciphertext were malformed")]
    InvalidOperation,
    #[error("the ciphertext is not a valid element modulo N^2")]
    InvalidCiphertext,
    #[error("the attempted decryption of a Paillier ciphertext failed")]
    DecryptionFailed,

    #[cfg(test)]
    #[error("no pre-generated primes with size {0}")]
    NoPregeneratedPrimes(usize),
}

/// A Paillier ciphertext; an element of `Z_{N^2}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Ciphertext(pub(crate) BigNumber);

impl Ciphertext {
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes()
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        Self(BigNumber::from_slice(bytes))
    }
}

/// The randomizer `ρ ∈ Z*_N` consumed by an encryption. Treated as secret
/// material because several proofs use it as part of their witness.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub(crate) struct Nonce(pub(crate) BigNumber);

impl std::fmt::Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Nonce").field(&"[redacted]").finish()
    }
}

/// The public portion of a Paillier keypair: the modulus `N`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EncryptionKey {
    n: BigNumber,
    nn: BigNumber,
}

impl EncryptionKey {
    pub(crate) fn from_modulus(n: &BigNumber) -> Self {
        Self {
            n: n.clone(),
            nn: n * n,
        }
    }

    pub(crate) fn n(&self) -> &BigNumber {
        &self.n
    }

    pub(crate) fn nn(&self) -> &BigNumber {
        &self.nn
    }

    fn validate(&self, c: &Ciphertext) -> Result<()> {
        if c.0 < BigNumber::zero() || c.0 >= self.nn {
            Err(PaillierError::InvalidCiphertext)?;
        }
        Ok(())
    }

    /// Encrypt `x ∈ [0, N)` under a freshly sampled nonce.
    pub(crate) fn encrypt<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        x: &BigNumber,
    ) -> Result<(Ciphertext, Nonce)> {
        let nonce = Nonce(random_bn_in_z_star(rng, &self.n)?);
        let c = self.encrypt_with_randomness(x, &nonce)?;
        Ok((c, nonce))
    }

    /// Encrypt `x` with a caller-provided nonce: `(1+N)^x · ρ^N mod N²`.
    pub(crate) fn encrypt_with_randomness(&self, x: &BigNumber, rho: &Nonce) -> Result<Ciphertext> {
        if x < &BigNumber::zero() || x >= &self.n {
            Err(PaillierError::InvalidOperation)?;
        }
        Ok(self.encrypt_unchecked(x, &rho.0))
    }

    /// The raw encryption map, without the plaintext range check. Verifiers
    /// use this to recompute ciphertext equalities whose exponents are
    /// integer responses larger than N; the result is still well-defined
    /// because the plaintext group has order N.
    pub(crate) fn encrypt_unchecked(&self, x: &BigNumber, rho: &BigNumber) -> Ciphertext {
        let one = BigNumber::one();
        let base = &one + &self.n;
        let a = modpow(&base, x, &self.nn);
        let b = modpow(rho, &self.n, &self.nn);
        Ciphertext(a.modmul(&b, &self.nn))
    }

    /// Homomorphic addition of plaintexts: `c₁ · c₂ mod N²`.
    pub(crate) fn homo_add(&self, c1: &Ciphertext, c2: &Ciphertext) -> Result<Ciphertext> {
        self.validate(c1)?;
        self.validate(c2)?;
        Ok(Ciphertext(c1.0.modmul(&c2.0, &self.nn)))
    }

    /// Homomorphic multiplication by a plaintext scalar: `c^k mod N²`.
    pub(crate) fn homo_mult(&self, k: &BigNumber, c: &Ciphertext) -> Result<Ciphertext> {
        self.validate(c)?;
        if k < &BigNumber::zero() {
            Err(PaillierError::InvalidOperation)?;
        }
        Ok(Ciphertext(modpow(&c.0, k, &self.nn)))
    }

    /// As [`homo_mult`](Self::homo_mult), but rerandomized with a fresh
    /// nonce which is returned for use as a proof witness.
    pub(crate) fn homo_mult_with_randomness<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        k: &BigNumber,
        c: &Ciphertext,
    ) -> Result<(Ciphertext, Nonce)> {
        let scaled = self.homo_mult(k, c)?;
        let nonce = Nonce(random_bn_in_z_star(rng, &self.n)?);
        let mask = modpow(&nonce.0, &self.n, &self.nn);
        Ok((Ciphertext(scaled.0.modmul(&mask, &self.nn)), nonce))
    }

    /// An encryption of `-plaintext(c) mod N`: the group inverse `c⁻¹ mod
    /// N²`.
    pub(crate) fn homo_mult_inv(&self, c: &Ciphertext) -> Result<Ciphertext> {
        self.validate(c)?;
        let inv = c
            .0
            .invert(&self.nn)
            .ok_or(PaillierError::InvalidCiphertext)?;
        Ok(Ciphertext(inv))
    }
}

/// The secret portion of a Paillier keypair.
#[derive(Clone, Serialize, Deserialize, ZeroizeOnDrop)]
pub(crate) struct DecryptionKey {
    p: BigNumber,
    q: BigNumber,
    n: BigNumber,
    nn: BigNumber,
    /// λ = lcm(p-1, q-1)
    lambda: BigNumber,
    /// μ = L((1+N)^λ mod N²)⁻¹ mod N
    mu: BigNumber,
    /// φ(N) = (p-1)(q-1)
    totient: BigNumber,
    /// N⁻¹ mod φ(N), used to strip the N-th power off a recovered nonce.
    n_inv: BigNumber,
}

impl std::fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionKey")
            .field("n", &self.n)
            .field("p", &"[redacted]")
            .field("q", &"[redacted]")
            .finish()
    }
}

/// `L(u) = (u - 1) / N`.
fn ell(u: &BigNumber, n: &BigNumber) -> BigNumber {
    (u - &BigNumber::one()) / n
}

impl DecryptionKey {
    /// Build a decryption key from two distinct primes.
    pub(crate) fn from_primes(p: &BigNumber, q: &BigNumber) -> Result<Self> {
        if p == q {
            Err(PaillierError::CouldNotCreateKey)?;
        }
        let n = p * q;
        let nn = &n * &n;
        let p_minus_one = p - &BigNumber::one();
        let q_minus_one = q - &BigNumber::one();
        let totient = &p_minus_one * &q_minus_one;
        let gcd = p_minus_one.gcd(&q_minus_one);
        let lambda = &totient / &gcd;

        let g_lambda = modpow(&(&n + 1), &lambda, &nn);
        let mu = ell(&g_lambda, &n)
            .invert(&n)
            .ok_or(PaillierError::CouldNotCreateKey)?;
        let n_inv = n
            .invert(&totient)
            .ok_or(PaillierError::CouldNotCreateKey)?;

        Ok(Self {
            p: p.clone(),
            q: q.clone(),
            n,
            nn,
            lambda,
            mu,
            totient,
            n_inv,
        })
    }

    /// Generate a new [`DecryptionKey`] and its factors.
    ///
    /// The factors `p` and `q` are `PRIME_BITS`-long safe primes, and the
    /// resulting modulus is `2 * PRIME_BITS` long.
    pub(crate) fn new(rng: &mut (impl CryptoRng + RngCore)) -> Result<Self> {
        // Generate a pair of primes that are `PRIME_BITS` long and return
        // them if their product is `2 * PRIME_BITS` long (otherwise return
        // an error so the retry loop tries again).
        let generate_prime_pair = || -> Result<(BigNumber, BigNumber)> {
            // As generating safe primes can be computationally expensive
            // (> one minute per prime in github CI), tests use precomputed
            // ordinary primes from a pool.
            #[cfg(not(test))]
            let (p, q) = (
                prime_gen::get_random_safe_prime(rng),
                prime_gen::get_random_safe_prime(rng),
            );
            #[cfg(test)]
            let (p, q) = prime_gen::get_prime_pair_from_pool_insecure(rng)?;

            if p.bit_length() == PRIME_BITS
                && q.bit_length() == PRIME_BITS
                && (&p * &q).bit_length() == 2 * PRIME_BITS
            {
                Ok((p, q))
            } else {
                Err(PaillierError::CouldNotCreateKey)?
            }
        };

        // Sometimes two n/2-bit primes can produce an n-1 bit modulus. Allow
        // some (lazily evaluated) retries to handle that case.
        let (p, q) = std::iter::repeat_with(generate_prime_pair)
            .take(CRYPTOGRAPHIC_RETRY_MAX)
            .find(|result| result.is_ok())
            .ok_or(Error::RetryFailed)??;

        Self::from_primes(&p, &q)
    }

    /// Retrieve the public [`EncryptionKey`] corresponding to this secret
    /// [`DecryptionKey`].
    pub(crate) fn encryption_key(&self) -> EncryptionKey {
        EncryptionKey::from_modulus(&self.n)
    }

    pub(crate) fn n(&self) -> &BigNumber {
        &self.n
    }

    fn validate(&self, c: &Ciphertext) -> Result<()> {
        if c.0 < BigNumber::zero() || c.0 >= self.nn {
            Err(PaillierError::InvalidCiphertext)?;
        }
        // A ciphertext sharing a factor with N sits in a non-coprime coset;
        // decryption is undefined there. This also rejects c = N.
        if c.0.gcd(&self.n) != BigNumber::one() {
            Err(PaillierError::InvalidCiphertext)?;
        }
        Ok(())
    }

    /// Decrypt a ciphertext, returning the plaintext in `[0, N)`.
    pub(crate) fn decrypt(&self, c: &Ciphertext) -> Result<BigNumber> {
        self.validate(c)?;
        let u = modpow(&c.0, &self.lambda, &self.nn);
        Ok(ell(&u, &self.n).modmul(&self.mu, &self.n))
    }

    /// Decrypt a ciphertext and also recover the randomizer `ρ` it was
    /// encrypted under. Fails with `InvalidCiphertext` if the recovered
    /// randomness does not re-encrypt to `c`.
    pub(crate) fn decrypt_full(&self, c: &Ciphertext) -> Result<(BigNumber, Nonce)> {
        let m = self.decrypt(c)?;

        // Strip the plaintext component: u = c · (1+N)^{-m} = ρ^N mod N².
        let g_m = modpow(&(&self.n + 1), &m, &self.nn);
        let g_m_inv = g_m
            .invert(&self.nn)
            .ok_or(PaillierError::InvalidCiphertext)?;
        let u = c.0.modmul(&g_m_inv, &self.nn);
        let rho = modpow(&(&u % &self.n), &self.n_inv, &self.n);

        let reencrypted = self
            .encryption_key()
            .encrypt_with_randomness(&m, &Nonce(rho.clone()))?;
        if reencrypted != *c {
            Err(PaillierError::InvalidCiphertext)?;
        }
        Ok((m, Nonce(rho)))
    }

    /// Produce a [`KeyProof`] binding this modulus to a session index `k`
    /// and a public point `y`.
    pub(crate) fn prove(&self, k: &BigNumber, y: &CurvePoint) -> Result<KeyProof> {
        let xs = KeyProof::derive_xs(&self.n, k, y)?;
        let d = self
            .n
            .invert(&self.totient)
            .ok_or(PaillierError::CouldNotCreateKey)?;
        let elements = xs.iter().map(|x| modpow(x, &d, &self.n)).collect();
        Ok(KeyProof { elements })
    }
}

/// Number of N-th-residue witnesses in a [`KeyProof`].
const KEY_PROOF_ITERS: usize = 13;

/// A proof of knowledge of a well-formed Paillier keypair, binding the
/// modulus to a session index and a public point. The verifier re-derives
/// the challenge elements and checks that each response is an N-th root.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct KeyProof {
    pub(crate) elements: Vec<BigNumber>,
}

impl KeyProof {
    /// Deterministically derive `KEY_PROOF_ITERS` challenge elements of
    /// `Z*_N` from `(k, N, y)`.
    fn derive_xs(n: &BigNumber, k: &BigNumber, y: &CurvePoint) -> Result<Vec<BigNumber>> {
        let mut xs = Vec::with_capacity(KEY_PROOF_ITERS);
        for i in 0..KEY_PROOF_ITERS {
            let x = (0..CRYPTOGRAPHIC_RETRY_MAX)
                .find_map(|attempt| {
                    let candidate = challenge_from_parts(
                        b"PaillierKeyProof",
                        &[
                            bn_part(k),
                            bn_part(n),
                            point_part(y),
                            bn_part(&BigNumber::from(i as u64)),
                            bn_part(&BigNumber::from(attempt as u64)),
                        ],
                    )
                    .ok()?;
                    (candidate != BigNumber::zero() && candidate.gcd(n) == BigNumber::one())
                        .then_some(candidate)
                })
                .ok_or(Error::RetryFailed)?;
            xs.push(x);
        }
        Ok(xs)
    }

    pub(crate) fn verify(&self, n: &BigNumber, k: &BigNumber, y: &CurvePoint) -> Result<()> {
        if self.elements.len() != KEY_PROOF_ITERS {
            return verify_err!(ProofType::PaillierKey, "wrong number of elements");
        }
        let xs = Self::derive_xs(n, k, y)?;
        for (element, x) in self.elements.iter().zip(xs.iter()) {
            if element == &BigNumber::zero() || element >= n {
                return verify_err!(ProofType::PaillierKey, "element out of range");
            }
            if &modpow(element, n, n) != x {
                return verify_err!(ProofType::PaillierKey, "element is not an N-th root");
            }
        }
        Ok(())
    }
}

// Prime generation functions for production and testing.
pub(crate) mod prime_gen {
    use super::*;
    #[cfg(test)]
    use rand::Rng;
    use rand::{CryptoRng, RngCore};

    /// Sample a safe prime with length `PRIME_BITS` at random.
    pub(crate) fn get_random_safe_prime<R: RngCore + CryptoRng>(_rng: &mut R) -> BigNumber {
        BigNumber::safe_prime(PRIME_BITS)
    }

    #[cfg(test)]
    lazy_static::lazy_static! {
        /// Pool of `PRIME_BITS`-length ordinary primes, generated once per
        /// test process. These are _not_ safe primes and must never be used
        /// outside tests.
        static ref POOL_OF_PRIMES: Vec<BigNumber> = {
            (0..24)
                .map(|_| BigNumber::prime(PRIME_BITS))
                .collect()
        };
    }

    /// Sample a prime from a precomputed pool. For testing purposes only!!
    #[cfg(test)]
    pub(crate) fn try_get_prime_from_pool_insecure<R: RngCore + CryptoRng>(
        rng: &mut R,
    ) -> Result<BigNumber> {
        if POOL_OF_PRIMES.is_empty() {
            Err(PaillierError::NoPregeneratedPrimes(PRIME_BITS))?;
        }
        Ok(POOL_OF_PRIMES
            .get(rng.gen_range(0..POOL_OF_PRIMES.len()))
            .cloned()
            .ok_or(PaillierError::NoPregeneratedPrimes(PRIME_BITS))?)
    }

    /// Sample a pair of independent, non-matching primes from a precomputed
    /// pool. For testing purposes only!!
    #[cfg(test)]
    pub(crate) fn get_prime_pair_from_pool_insecure<R: RngCore + CryptoRng>(
        rng: &mut R,
    ) -> Result<(BigNumber, BigNumber)> {
        let p = try_get_prime_from_pool_insecure(rng)?;
        loop {
            let q = try_get_prime_from_pool_insecure(rng)?;
            if p != q {
                break Ok((p, q));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{
        bn_to_scalar, get_test_rng, is_additive_inverse, is_congruent, k256_order,
        random_positive_bn,
    };

    fn test_key() -> DecryptionKey {
        let mut rng = get_test_rng();
        DecryptionKey::new(&mut rng).unwrap()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let mut rng = get_test_rng();
        let sk = test_key();
        let pk = sk.encryption_key();

        let m = BigNumber::from(100u64);
        let (c, _) = pk.encrypt(&mut rng, &m).unwrap();
        assert_eq!(sk.decrypt(&c).unwrap(), m);

        // c = N is in a non-coprime coset and must error.
        let bad = Ciphertext(pk.n().clone());
        assert!(sk.decrypt(&bad).is_err());
        assert!(sk.decrypt_full(&bad).is_err());
    }

    #[test]
    fn decrypt_full_recovers_randomness() {
        let mut rng = get_test_rng();
        let sk = test_key();
        let pk = sk.encryption_key();

        let m = BigNumber::from(100u64);
        let (c, nonce) = pk.encrypt(&mut rng, &m).unwrap();
        let (m2, nonce2) = sk.decrypt_full(&c).unwrap();
        assert_eq!(m, m2);
        assert_eq!(nonce.0, nonce2.0);
    }

    #[test]
    fn homomorphic_add_and_mult() {
        let mut rng = get_test_rng();
        let sk = test_key();
        let pk = sk.encryption_key();

        let (c1, _) = pk.encrypt(&mut rng, &BigNumber::from(10u64)).unwrap();
        let (c2, _) = pk.encrypt(&mut rng, &BigNumber::from(32u64)).unwrap();
        let sum = pk.homo_add(&c1, &c2).unwrap();
        assert_eq!(sk.decrypt(&sum).unwrap(), BigNumber::from(42u64));

        let (three, _) = pk.encrypt(&mut rng, &BigNumber::from(3u64)).unwrap();
        let scaled = pk.homo_mult(&BigNumber::from(6u64), &three).unwrap();
        assert_eq!(sk.decrypt(&scaled).unwrap(), BigNumber::from(18u64));
    }

    #[test]
    fn homo_mult_with_randomness_matches_plain() {
        let mut rng = get_test_rng();
        let sk = test_key();
        let pk = sk.encryption_key();

        let (three, _) = pk.encrypt(&mut rng, &BigNumber::from(3u64)).unwrap();
        let six = BigNumber::from(6u64);
        let (cm, rho) = pk.homo_mult_with_randomness(&mut rng, &six, &three).unwrap();
        assert_eq!(sk.decrypt(&cm).unwrap(), BigNumber::from(18u64));

        // The returned nonce really is the extra mask on top of c^k.
        let plain = pk.homo_mult(&six, &three).unwrap();
        let mask = modpow(&rho.0, pk.n(), pk.nn());
        assert_eq!(cm.0, plain.0.modmul(&mask, pk.nn()));
    }

    #[test]
    fn homo_mult_inv_is_additive_inverse() {
        let mut rng = get_test_rng();
        let sk = test_key();
        let pk = sk.encryption_key();
        let q = k256_order();

        let num = BigNumber::from(2343u64);
        let (c, _) = pk.encrypt(&mut rng, &num).unwrap();
        let inv = pk.homo_mult_inv(&c).unwrap();
        let neg = sk.decrypt(&inv).unwrap();

        assert_eq!(neg, pk.n() - &num);
        assert!(is_additive_inverse(&num, &neg, pk.n()));
        assert!(is_congruent(
            &BigNumber::zero(),
            &((&num + &neg) % pk.n()),
            pk.n()
        ));
        // The inverse is taken mod N, not mod the curve order.
        assert!(!is_additive_inverse(&num, &neg, &q));
    }

    #[test]
    fn key_proof_verifies() {
        let mut rng = get_test_rng();
        let sk = test_key();

        let k = random_positive_bn(&mut rng, &(BigNumber::one() << 256));
        let u = random_positive_bn(&mut rng, &k256_order());
        let y = CurvePoint::GENERATOR.multiply(&bn_to_scalar(&u).unwrap());

        let proof = sk.prove(&k, &y).unwrap();
        assert!(proof.verify(sk.n(), &k, &y).is_ok());
    }

    #[test]
    fn key_proof_with_mutated_last_element_fails() {
        let mut rng = get_test_rng();
        let sk = test_key();

        let k = random_positive_bn(&mut rng, &(BigNumber::one() << 256));
        let u = random_positive_bn(&mut rng, &k256_order());
        let y = CurvePoint::GENERATOR.multiply(&bn_to_scalar(&u).unwrap());

        let mut proof = sk.prove(&k, &y).unwrap();
        let last = proof.elements.last_mut().unwrap();
        *last = &*last - 1;
        assert!(proof.verify(sk.n(), &k, &y).is_err());
    }
}
