// Copyright (c) 2023 Bolt Labs, Inc.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A ring-Pedersen commitment scheme.
//!
//! This implements the commitment scheme specified in Definition 1.3 of
//! <https://eprint.iacr.org/2021/060.pdf>. The parameters `(Ñ, s, t)` serve
//! as the auxiliary setup of the range proofs: every party owns one
//! parameter set and verifies peers' proofs against it.

use crate::{
    errors::Result,
    paillier::DecryptionKey,
    utils::{modpow, random_positive_bn},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// A commitment scheme based on a ring-variant of the Pedersen commitment
/// scheme.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct RingPedersen {
    /// The RSA modulus, corresponding to `Ñ` in the paper.
    modulus: BigNumber,
    /// Ring-Pedersen parameter `s`.
    s: BigNumber,
    /// Ring-Pedersen parameter `t`.
    t: BigNumber,
}

impl RingPedersen {
    /// Extracts a [`RingPedersen`] object from a [`DecryptionKey`].
    ///
    /// The decryption key must be dedicated to this purpose (a modulus
    /// distinct from the owner's Paillier encryption modulus). The secret
    /// exponent `λ` such that `s = t^λ mod Ñ` is dropped after extraction.
    pub(crate) fn extract(
        sk: &DecryptionKey,
        rng: &mut (impl RngCore + CryptoRng),
    ) -> Result<Self> {
        let modulus = sk.n();
        let tau = random_positive_bn(rng, modulus);
        let lambda = random_positive_bn(rng, modulus);
        let t = tau.modpow(&BigNumber::from(2u64), modulus);
        let s = t.modpow(&lambda, modulus);
        Ok(RingPedersen {
            modulus: modulus.clone(),
            s,
            t,
        })
    }

    /// Returns the underlying modulus `Ñ`.
    pub(crate) fn modulus(&self) -> &BigNumber {
        &self.modulus
    }

    /// Returns the underlying `s` parameter.
    pub(crate) fn s(&self) -> &BigNumber {
        &self.s
    }

    /// Returns the underlying `t` parameter.
    pub(crate) fn t(&self) -> &BigNumber {
        &self.t
    }

    /// Produces the commitment `s^x · t^y mod Ñ`.
    ///
    /// Exponents must be non-negative; every value committed to by the
    /// proofs in this crate is sampled or reconstructed that way.
    pub(crate) fn commit(&self, x: &BigNumber, y: &BigNumber) -> BigNumber {
        let a = modpow(&self.s, x, &self.modulus);
        let b = modpow(&self.t, y, &self.modulus);
        a.modmul(&b, &self.modulus)
    }

    /// Combines a commitment pair with exponent `e`: `com0 · com1^e mod Ñ`.
    pub(crate) fn combine(&self, com0: &BigNumber, com1: &BigNumber, e: &BigNumber) -> BigNumber {
        com0.modmul(&modpow(com1, e, &self.modulus), &self.modulus)
    }

    /// Generates a [`RingPedersen`] object from a random number generator
    /// for testing purposes.
    #[cfg(test)]
    pub(crate) fn gen(rng: &mut (impl RngCore + CryptoRng)) -> Result<Self> {
        let sk = DecryptionKey::new(rng)?;
        Self::extract(&sk, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{get_test_rng, random_positive_bn};

    #[test]
    fn commitments_are_reproducible() -> Result<()> {
        let mut rng = get_test_rng();
        let scheme = RingPedersen::gen(&mut rng)?;
        let value = random_positive_bn(&mut rng, &(BigNumber::one() << 256));
        let randomness = random_positive_bn(&mut rng, &(BigNumber::one() << 256));
        let c = scheme.commit(&value, &randomness);
        let c_ = scheme.commit(&value, &randomness);
        assert_eq!(c, c_);
        Ok(())
    }

    #[test]
    fn mixing_commitment_randomness_fails() -> Result<()> {
        let mut rng = get_test_rng();
        let scheme = RingPedersen::gen(&mut rng)?;
        let value0 = random_positive_bn(&mut rng, &(BigNumber::one() << 256));
        let value1 = random_positive_bn(&mut rng, &(BigNumber::one() << 256));
        assert_ne!(value0, value1);
        let r0 = random_positive_bn(&mut rng, &(BigNumber::one() << 256));
        let r1 = random_positive_bn(&mut rng, &(BigNumber::one() << 256));
        let c0 = scheme.commit(&value0, &r0);
        let c1 = scheme.commit(&value1, &r1);
        assert_ne!(c0, c1);
        assert_ne!(scheme.commit(&value0, &r1), c0);
        assert_ne!(scheme.commit(&value1, &r0), c1);
        Ok(())
    }

    #[test]
    fn combine_matches_direct_computation() -> Result<()> {
        let mut rng = get_test_rng();
        let scheme = RingPedersen::gen(&mut rng)?;
        let x0 = random_positive_bn(&mut rng, &(BigNumber::one() << 128));
        let y0 = random_positive_bn(&mut rng, &(BigNumber::one() << 128));
        let x1 = random_positive_bn(&mut rng, &(BigNumber::one() << 128));
        let y1 = random_positive_bn(&mut rng, &(BigNumber::one() << 128));
        let e = random_positive_bn(&mut rng, &(BigNumber::one() << 64));

        let combined = scheme.combine(&scheme.commit(&x0, &y0), &scheme.commit(&x1, &y1), &e);
        let direct = scheme.commit(&(&x0 + &x1 * &e), &(&y0 + &y1 * &e));
        assert_eq!(combined, direct);
        Ok(())
    }
}
