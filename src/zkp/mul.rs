// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Implements the ZKP from Figure 29 of <https://eprint.iacr.org/2021/060.pdf>
//!
//! Proves knowledge of `(x, ρ, ρ_x)` such that `X = Enc_N(x, ρ_x)` and
//! `C = Y^x · ρ^N mod N²`, with `x` in range. Unlike the rest of the suite
//! this proof needs no ring-Pedersen parameters, so a single broadcast copy
//! serves all verifiers. The rounds use it to tie `Hᵢ = BigGᵢ^{kᵢ} · ρ^N`
//! to `BigKᵢ`.

use crate::{
    errors::{Error, ProofType, Result},
    paillier::{Ciphertext, EncryptionKey, Nonce},
    parameters::{ELL, EPSILON},
    utils::{bn_part, challenge_from_parts, modpow, random_bn_in_z_star, random_positive_bn},
    zkp::Proof,
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PiMulProof {
    A: Ciphertext,
    B: Ciphertext,
    z: BigNumber,
    u: BigNumber,
    v: BigNumber,
}

#[derive(Clone)]
pub(crate) struct PiMulInput {
    pk: EncryptionKey,
    X: Ciphertext,
    Y: Ciphertext,
    C: Ciphertext,
}

impl PiMulInput {
    pub(crate) fn new(pk: &EncryptionKey, X: &Ciphertext, Y: &Ciphertext, C: &Ciphertext) -> Self {
        Self {
            pk: pk.clone(),
            X: X.clone(),
            Y: Y.clone(),
            C: C.clone(),
        }
    }
}

pub(crate) struct PiMulSecret {
    x: BigNumber,
    rho: Nonce,
    rho_x: Nonce,
}

impl PiMulSecret {
    pub(crate) fn new(x: &BigNumber, rho: &Nonce, rho_x: &Nonce) -> Self {
        Self {
            x: x.clone(),
            rho: rho.clone(),
            rho_x: rho_x.clone(),
        }
    }
}

impl PiMulProof {
    fn challenge(input: &PiMulInput, A: &Ciphertext, B: &Ciphertext) -> Result<BigNumber> {
        challenge_from_parts(
            b"PiMulProof",
            &[
                bn_part(input.pk.n()),
                input.X.to_bytes(),
                input.Y.to_bytes(),
                input.C.to_bytes(),
                A.to_bytes(),
                B.to_bytes(),
            ],
        )
    }
}

impl Proof for PiMulProof {
    const PARTS: usize = 5;
    const TYPE: ProofType = ProofType::Mul;
    type CommonInput = PiMulInput;
    type ProverSecret = PiMulSecret;

    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
    ) -> Result<Self> {
        let alpha = random_positive_bn(rng, &(BigNumber::one() << (ELL + EPSILON)));
        let r = random_bn_in_z_star(rng, input.pk.n())?;
        let s = Nonce(random_bn_in_z_star(rng, input.pk.n())?);

        let A = {
            let mask = modpow(&r, input.pk.n(), input.pk.nn());
            Ciphertext(
                input
                    .pk
                    .homo_mult(&alpha, &input.Y)?
                    .0
                    .modmul(&mask, input.pk.nn()),
            )
        };
        let B = input.pk.encrypt_with_randomness(&alpha, &s)?;

        let e = Self::challenge(input, &A, &B)?;

        let z = &alpha + &e * &secret.x;
        let u = r.modmul(&modpow(&secret.rho.0, &e, input.pk.n()), input.pk.n());
        let v = s
            .0
            .modmul(&modpow(&secret.rho_x.0, &e, input.pk.n()), input.pk.n());

        Ok(Self { A, B, z, u, v })
    }

    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        for component in [&self.A.0, &self.B.0, &self.z, &self.u, &self.v] {
            if component == &BigNumber::zero() {
                return verify_err!(Self::TYPE, "zero proof component");
            }
        }

        let e = Self::challenge(input, &self.A, &self.B)?;

        let eq_check_1 = {
            let mask = modpow(&self.u, input.pk.n(), input.pk.nn());
            let lhs = Ciphertext(
                input
                    .pk
                    .homo_mult(&self.z, &input.Y)?
                    .0
                    .modmul(&mask, input.pk.nn()),
            );
            let rhs = input
                .pk
                .homo_add(&self.A, &input.pk.homo_mult(&e, &input.C)?)?;
            lhs == rhs
        };
        if !eq_check_1 {
            return verify_err!(Self::TYPE, "product equality failed");
        }

        let eq_check_2 = {
            let lhs = input.pk.encrypt_unchecked(&self.z, &self.v);
            let rhs = input
                .pk
                .homo_add(&self.B, &input.pk.homo_mult(&e, &input.X)?)?;
            lhs == rhs
        };
        if !eq_check_2 {
            return verify_err!(Self::TYPE, "multiplier equality failed");
        }

        let bound = BigNumber::one() << (ELL + EPSILON);
        if self.z < -bound.clone() || self.z > bound {
            return verify_err!(Self::TYPE, "response out of range");
        }

        Ok(())
    }

    fn to_parts(&self) -> Vec<Vec<u8>> {
        vec![
            self.A.to_bytes(),
            self.B.to_bytes(),
            bn_part(&self.z),
            bn_part(&self.u),
            bn_part(&self.v),
        ]
    }

    fn from_parts(parts: &[Vec<u8>]) -> Result<Self> {
        if parts.len() != Self::PARTS {
            return Err(Error::Serialization);
        }
        Ok(Self {
            A: Ciphertext::from_bytes(&parts[0]),
            B: Ciphertext::from_bytes(&parts[1]),
            z: BigNumber::from_slice(&parts[2]),
            u: BigNumber::from_slice(&parts[3]),
            v: BigNumber::from_slice(&parts[4]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paillier::DecryptionKey;
    use crate::utils::{get_test_rng, k256_order};

    fn setup() -> Result<(PiMulProof, PiMulInput)> {
        let mut rng = get_test_rng();
        let sk = DecryptionKey::new(&mut rng)?;
        let pk = sk.encryption_key();
        let q = k256_order();

        let x = random_positive_bn(&mut rng, &q);
        let y = random_positive_bn(&mut rng, &q);
        let (X, rho_x) = pk.encrypt(&mut rng, &x)?;
        let (Y, _) = pk.encrypt(&mut rng, &y)?;
        let (C, rho) = pk.homo_mult_with_randomness(&mut rng, &x, &Y)?;

        let input = PiMulInput::new(&pk, &X, &Y, &C);
        let proof = PiMulProof::prove(&mut rng, &input, &PiMulSecret::new(&x, &rho, &rho_x))?;
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
        proof.v = &proof.v - 1;
        assert!(proof.verify(&input).is_err());
        Ok(())
    }

    #[test]
    fn proof_bytes_roundtrip() -> Result<()> {
        let (proof, input) = setup()?;
        let decoded = PiMulProof::from_bytes(&proof.to_bytes()?)?;
        decoded.verify(&input)
    }
}
