// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Implements the ZKP from Figure 30 of <https://eprint.iacr.org/2021/060.pdf>
//!
//! The prover has secret input `(y, ρ)` and the verifier checks the proof
//! against the statement `(q, ℓ, N0, C, x)`:
//!   `C = (1 + N0)^y · ρ^{N0} mod N0²` and `x = y mod q`.
//!
//! The witness `y` is a full homomorphic sum (it can be far larger than the
//! group order), so the first response carries no range bound; the second
//! response is bounded by `2^{ℓ+ε} · Ñ`.

use crate::{
    errors::{Error, ProofType, Result},
    paillier::{Ciphertext, EncryptionKey, Nonce},
    parameters::{ELL, EPSILON},
    ring_pedersen::RingPedersen,
    utils::{bn_part, challenge_from_parts, modpow, random_bn_in_z_star, random_positive_bn},
    zkp::Proof,
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PiDecProof {
    /// Ring-Pedersen commitment to the witness.
    S: BigNumber,
    /// Ring-Pedersen commitment to the masking value.
    T: BigNumber,
    /// Paillier commitment to the masking value.
    A: Ciphertext,
    /// The masking value reduced mod q.
    gamma: BigNumber,
    pub(crate) z1: BigNumber,
    pub(crate) z2: BigNumber,
    pub(crate) w: BigNumber,
}

#[derive(Clone)]
pub(crate) struct PiDecInput {
    setup_params: RingPedersen,
    q: BigNumber,
    /// The prover's Paillier key (`N_0`).
    pk: EncryptionKey,
    C: Ciphertext,
    x: BigNumber,
}

impl PiDecInput {
    pub(crate) fn new(
        setup_params: &RingPedersen,
        q: &BigNumber,
        pk: &EncryptionKey,
        C: &Ciphertext,
        x: &BigNumber,
    ) -> Self {
        Self {
            setup_params: setup_params.clone(),
            q: q.clone(),
            pk: pk.clone(),
            C: C.clone(),
            x: x.clone(),
        }
    }
}

pub(crate) struct PiDecSecret {
    y: BigNumber,
    rho: Nonce,
}

impl PiDecSecret {
    pub(crate) fn new(y: &BigNumber, rho: &Nonce) -> Self {
        Self {
            y: y.clone(),
            rho: rho.clone(),
        }
    }
}

impl PiDecProof {
    fn challenge(
        input: &PiDecInput,
        S: &BigNumber,
        T: &BigNumber,
        A: &Ciphertext,
        gamma: &BigNumber,
    ) -> Result<BigNumber> {
        challenge_from_parts(
            b"PiDecProof",
            &[
                bn_part(&input.q),
                bn_part(input.pk.n()),
                input.C.to_bytes(),
                bn_part(&input.x),
                bn_part(input.setup_params.modulus()),
                bn_part(input.setup_params.s()),
                bn_part(input.setup_params.t()),
                bn_part(S),
                bn_part(T),
                A.to_bytes(),
                bn_part(gamma),
            ],
        )
    }
}

impl Proof for PiDecProof {
    const PARTS: usize = 7;
    const TYPE: ProofType = ProofType::Dec;
    type CommonInput = PiDecInput;
    type ProverSecret = PiDecSecret;

    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
    ) -> Result<Self> {
        let rp = &input.setup_params;
        let alpha = random_positive_bn(rng, &(BigNumber::one() << (ELL + EPSILON)));
        let mu = random_positive_bn(rng, &((BigNumber::one() << ELL) * rp.modulus()));
        let nu = random_positive_bn(rng, &((BigNumber::one() << (ELL + EPSILON)) * rp.modulus()));
        let r = Nonce(random_bn_in_z_star(rng, input.pk.n())?);

        let S = rp.commit(&secret.y, &mu);
        let T = rp.commit(&alpha, &nu);
        let A = input.pk.encrypt_with_randomness(&alpha, &r)?;
        let gamma = &alpha % &input.q;

        let e = Self::challenge(input, &S, &T, &A, &gamma)?;

        let z1 = &alpha + &e * &secret.y;
        let z2 = nu + &e * mu;
        let w = r
            .0
            .modmul(&modpow(&secret.rho.0, &e, input.pk.n()), input.pk.n());

        Ok(Self {
            S,
            T,
            A,
            gamma,
            z1,
            z2,
            w,
        })
    }

    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        let rp = &input.setup_params;
        for component in [
            &self.S, &self.T, &self.A.0, &self.gamma, &self.z1, &self.z2, &self.w,
        ] {
            if component == &BigNumber::zero() {
                return verify_err!(Self::TYPE, "zero proof component");
            }
        }

        let e = Self::challenge(input, &self.S, &self.T, &self.A, &self.gamma)?;

        // (1+N0)^z1 · w^N0 == A · C^e mod N0²
        let eq_check_1 = {
            let lhs = input.pk.encrypt_unchecked(&self.z1, &self.w);
            let rhs = input
                .pk
                .homo_add(&self.A, &input.pk.homo_mult(&e, &input.C)?)?;
            lhs == rhs
        };
        if !eq_check_1 {
            return verify_err!(Self::TYPE, "ciphertext equality failed");
        }

        // z1 == gamma + e·x mod q
        let eq_check_2 = {
            let lhs = &self.z1 % &input.q;
            let rhs = (&self.gamma + &e * &input.x) % &input.q;
            lhs == rhs
        };
        if !eq_check_2 {
            return verify_err!(Self::TYPE, "mod-q equality failed");
        }

        // s^z1 · t^z2 == T · S^e mod Ñ
        let eq_check_3 = {
            let lhs = rp.commit(&self.z1, &self.z2);
            let rhs = rp.combine(&self.T, &self.S, &e);
            lhs == rhs
        };
        if !eq_check_3 {
            return verify_err!(Self::TYPE, "commitment equality failed");
        }

        let bound = (BigNumber::one() << (ELL + EPSILON)) * rp.modulus();
        if self.z2 < -bound.clone() || self.z2 > bound {
            return verify_err!(Self::TYPE, "masking response out of range");
        }

        Ok(())
    }

    fn to_parts(&self) -> Vec<Vec<u8>> {
        vec![
            bn_part(&self.S),
            bn_part(&self.T),
            self.A.to_bytes(),
            bn_part(&self.gamma),
            bn_part(&self.z1),
            bn_part(&self.z2),
            bn_part(&self.w),
        ]
    }

    fn from_parts(parts: &[Vec<u8>]) -> Result<Self> {
        if parts.len() != Self::PARTS {
            return Err(Error::Serialization);
        }
        Ok(Self {
            S: BigNumber::from_slice(&parts[0]),
            T: BigNumber::from_slice(&parts[1]),
            A: Ciphertext::from_bytes(&parts[2]),
            gamma: BigNumber::from_slice(&parts[3]),
            z1: BigNumber::from_slice(&parts[4]),
            z2: BigNumber::from_slice(&parts[5]),
            w: BigNumber::from_slice(&parts[6]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paillier::DecryptionKey;
    use crate::utils::{get_test_rng, k256_order};

    fn setup() -> Result<(PiDecProof, PiDecInput)> {
        let mut rng = get_test_rng();
        let sk = DecryptionKey::new(&mut rng)?;
        let pk = sk.encryption_key();
        let setup = RingPedersen::gen(&mut rng)?;
        let q = k256_order();

        let y = random_positive_bn(&mut rng, &(BigNumber::one() << (2 * ELL)));
        let (C, rho) = pk.encrypt(&mut rng, &y)?;
        let x = &y % &q;

        let input = PiDecInput::new(&setup, &q, &pk, &C, &x);
        let proof = PiDecProof::prove(&mut rng, &input, &PiDecSecret::new(&y, &rho))?;
        Ok((proof, input))
    }

    #[test]
    fn proof_verifies() -> Result<()> {
        let (proof, input) = setup()?;
        proof.verify(&input)
    }

    #[test]
    fn proof_with_mutated_last_component_fails() -> Result<()> {
        let (mut proof, input) = setup()?;
        proof.w = &proof.w - 1;
        assert!(proof.verify(&input).is_err());
        Ok(())
    }

    #[test]
    fn proof_fails_for_wrong_residue() -> Result<()> {
        let mut rng = get_test_rng();
        let sk = DecryptionKey::new(&mut rng)?;
        let pk = sk.encryption_key();
        let setup = RingPedersen::gen(&mut rng)?;
        let q = k256_order();

        let y = random_positive_bn(&mut rng, &(BigNumber::one() << (2 * ELL)));
        let (C, rho) = pk.encrypt(&mut rng, &y)?;
        let x = (&y + 1) % &q;

        let input = PiDecInput::new(&setup, &q, &pk, &C, &x);
        let proof = PiDecProof::prove(&mut rng, &input, &PiDecSecret::new(&y, &rho))?;
        assert!(proof.verify(&input).is_err());
        Ok(())
    }

    #[test]
    fn proof_bytes_roundtrip() -> Result<()> {
        let (proof, input) = setup()?;
        let decoded = PiDecProof::from_bytes(&proof.to_bytes()?)?;
        decoded.verify(&input)
    }
}
