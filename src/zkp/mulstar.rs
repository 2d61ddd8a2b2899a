// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Implements the ZKP from Figure 31 of <https://eprint.iacr.org/2021/060.pdf>
//!
//! Proves knowledge of `(x, ρ)` such that `X = g^x` and
//! `D = C^x · ρ^{N0} mod N0²`, with `x` in range. The rounds use this to tie
//! the rerandomized product `Ĥᵢ = BigKᵢ^{wᵢ} · ρ^N` to the public share
//! point `Wᵢ`.

use crate::{
    errors::{Error, ProofType, Result},
    paillier::{Ciphertext, EncryptionKey, Nonce},
    parameters::{ELL, EPSILON},
    ring_pedersen::RingPedersen,
    utils::{
        bn_part, bn_to_scalar, challenge_from_parts, modpow, point_part, random_bn_in_z_star,
        random_positive_bn, CurvePoint,
    },
    zkp::Proof,
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PiMulStarProof {
    A: Ciphertext,
    B_x: CurvePoint,
    E: BigNumber,
    S: BigNumber,
    z1: BigNumber,
    z2: BigNumber,
    w: BigNumber,
}

#[derive(Clone)]
pub(crate) struct PiMulStarInput {
    setup_params: RingPedersen,
    /// The prover's Paillier key (`N_0`).
    pk: EncryptionKey,
    C: Ciphertext,
    D: Ciphertext,
    X: CurvePoint,
}

impl PiMulStarInput {
    pub(crate) fn new(
        setup_params: &RingPedersen,
        pk: &EncryptionKey,
        C: &Ciphertext,
        D: &Ciphertext,
        X: &CurvePoint,
    ) -> Self {
        Self {
            setup_params: setup_params.clone(),
            pk: pk.clone(),
            C: C.clone(),
            D: D.clone(),
            X: *X,
        }
    }
}

pub(crate) struct PiMulStarSecret {
    x: BigNumber,
    rho: Nonce,
}

impl PiMulStarSecret {
    pub(crate) fn new(x: &BigNumber, rho: &Nonce) -> Self {
        Self {
            x: x.clone(),
            rho: rho.clone(),
        }
    }
}

impl PiMulStarProof {
    fn challenge(
        input: &PiMulStarInput,
        A: &Ciphertext,
        B_x: &CurvePoint,
        E: &BigNumber,
        S: &BigNumber,
    ) -> Result<BigNumber> {
        challenge_from_parts(
            b"PiMulStarProof",
            &[
                bn_part(input.pk.n()),
                input.C.to_bytes(),
                input.D.to_bytes(),
                point_part(&input.X),
                bn_part(input.setup_params.modulus()),
                bn_part(input.setup_params.s()),
                bn_part(input.setup_params.t()),
                A.to_bytes(),
                point_part(B_x),
                bn_part(E),
                bn_part(S),
            ],
        )
    }
}

impl Proof for PiMulStarProof {
    const PARTS: usize = 7;
    const TYPE: ProofType = ProofType::MulStar;
    type CommonInput = PiMulStarInput;
    type ProverSecret = PiMulStarSecret;

    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
    ) -> Result<Self> {
        let rp = &input.setup_params;
        let alpha = random_positive_bn(rng, &(BigNumber::one() << (ELL + EPSILON)));
        let m = random_positive_bn(rng, &((BigNumber::one() << ELL) * rp.modulus()));
        let gamma = random_positive_bn(rng, &((BigNumber::one() << (ELL + EPSILON)) * rp.modulus()));
        let r = random_bn_in_z_star(rng, input.pk.n())?;

        let A = {
            let mask = modpow(&r, input.pk.n(), input.pk.nn());
            Ciphertext(
                input
                    .pk
                    .homo_mult(&alpha, &input.C)?
                    .0
                    .modmul(&mask, input.pk.nn()),
            )
        };
        let B_x = CurvePoint::GENERATOR.multiply(&bn_to_scalar(&alpha)?);
        let E = rp.commit(&alpha, &gamma);
        let S = rp.commit(&secret.x, &m);

        let e = Self::challenge(input, &A, &B_x, &E, &S)?;

        let z1 = &alpha + &e * &secret.x;
        let z2 = gamma + &e * m;
        let w = r.modmul(&modpow(&secret.rho.0, &e, input.pk.n()), input.pk.n());

        Ok(Self {
            A,
            B_x,
            E,
            S,
            z1,
            z2,
            w,
        })
    }

    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        let rp = &input.setup_params;
        for component in [&self.A.0, &self.E, &self.S, &self.z1, &self.z2, &self.w] {
            if component == &BigNumber::zero() {
                return verify_err!(Self::TYPE, "zero proof component");
            }
        }
        if self.B_x == CurvePoint::IDENTITY {
            return verify_err!(Self::TYPE, "identity proof component");
        }

        let e = Self::challenge(input, &self.A, &self.B_x, &self.E, &self.S)?;

        let eq_check_1 = {
            let mask = modpow(&self.w, input.pk.n(), input.pk.nn());
            let lhs = Ciphertext(
                input
                    .pk
                    .homo_mult(&self.z1, &input.C)?
                    .0
                    .modmul(&mask, input.pk.nn()),
            );
            let rhs = input
                .pk
                .homo_add(&self.A, &input.pk.homo_mult(&e, &input.D)?)?;
            lhs == rhs
        };
        if !eq_check_1 {
            return verify_err!(Self::TYPE, "ciphertext equality failed");
        }

        let eq_check_2 = {
            let lhs = CurvePoint::GENERATOR.multiply(&bn_to_scalar(&self.z1)?);
            let rhs = self.B_x.add(&input.X.multiply(&bn_to_scalar(&e)?));
            lhs == rhs
        };
        if !eq_check_2 {
            return verify_err!(Self::TYPE, "curve equality failed");
        }

        let eq_check_3 = {
            let lhs = rp.commit(&self.z1, &self.z2);
            let rhs = rp.combine(&self.E, &self.S, &e);
            lhs == rhs
        };
        if !eq_check_3 {
            return verify_err!(Self::TYPE, "commitment equality failed");
        }

        let bound = BigNumber::one() << (ELL + EPSILON);
        if self.z1 < -bound.clone() || self.z1 > bound {
            return verify_err!(Self::TYPE, "response out of range");
        }

        Ok(())
    }

    fn to_parts(&self) -> Vec<Vec<u8>> {
        vec![
            self.A.to_bytes(),
            point_part(&self.B_x),
            bn_part(&self.E),
            bn_part(&self.S),
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
            A: Ciphertext::from_bytes(&parts[0]),
            B_x: CurvePoint::from_bytes(&parts[1])?,
            E: BigNumber::from_slice(&parts[2]),
            S: BigNumber::from_slice(&parts[3]),
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

    fn setup() -> Result<(PiMulStarProof, PiMulStarInput)> {
        let mut rng = get_test_rng();
        let sk = DecryptionKey::new(&mut rng)?;
        let pk = sk.encryption_key();
        let setup = RingPedersen::gen(&mut rng)?;
        let q = k256_order();

        let x = random_positive_bn(&mut rng, &q);
        let X = CurvePoint::GENERATOR.multiply(&bn_to_scalar(&x)?);
        let y = random_positive_bn(&mut rng, &q);
        let (C, _) = pk.encrypt(&mut rng, &y)?;
        let (D, rho) = pk.homo_mult_with_randomness(&mut rng, &x, &C)?;

        let input = PiMulStarInput::new(&setup, &pk, &C, &D, &X);
        let proof = PiMulStarProof::prove(&mut rng, &input, &PiMulStarSecret::new(&x, &rho))?;
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
    fn proof_bytes_roundtrip() -> Result<()> {
        let (proof, input) = setup()?;
        let decoded = PiMulStarProof::from_bytes(&proof.to_bytes()?)?;
        decoded.verify(&input)
    }
}
