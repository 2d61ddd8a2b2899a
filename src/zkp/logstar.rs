// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Implements the ZKP from Figure 25 of <https://eprint.iacr.org/2021/060.pdf>
//!
//! Proves knowledge of `(x, ρ)` such that `X = G^x` and `C = Enc_{N0}(x, ρ)`
//! with `x` in range. The base `G` defaults to the curve generator but may
//! be any auxiliary point (the rounds use `Γ` when tying `Δᵢ` to `BigKᵢ`).

use crate::{
    errors::{ProofType, Result},
    paillier::{Ciphertext, EncryptionKey, Nonce},
    parameters::{ELL, EPSILON},
    ring_pedersen::RingPedersen,
    utils::{
        bn_part, bn_to_scalar, challenge_from_parts, modpow, point_part, random_positive_bn,
        CurvePoint,
    },
    zkp::Proof,
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PiLogStarProof {
    pub(crate) S: BigNumber,
    pub(crate) A: Ciphertext,
    pub(crate) Y: CurvePoint,
    pub(crate) D: BigNumber,
    pub(crate) z1: BigNumber,
    pub(crate) z2: BigNumber,
    pub(crate) z3: BigNumber,
}

#[derive(Clone)]
pub(crate) struct PiLogStarInput {
    setup_params: RingPedersen,
    /// The prover's Paillier key (`N_0` in the paper).
    pk: EncryptionKey,
    C: Ciphertext,
    X: CurvePoint,
    g: CurvePoint,
}

impl PiLogStarInput {
    pub(crate) fn new(
        setup_params: &RingPedersen,
        pk: &EncryptionKey,
        C: &Ciphertext,
        X: &CurvePoint,
    ) -> Self {
        Self::new_with_base(setup_params, pk, C, X, &CurvePoint::GENERATOR)
    }

    pub(crate) fn new_with_base(
        setup_params: &RingPedersen,
        pk: &EncryptionKey,
        C: &Ciphertext,
        X: &CurvePoint,
        g: &CurvePoint,
    ) -> Self {
        Self {
            setup_params: setup_params.clone(),
            pk: pk.clone(),
            C: C.clone(),
            X: *X,
            g: *g,
        }
    }
}

pub(crate) struct PiLogStarSecret {
    x: BigNumber,
    rho: Nonce,
}

impl PiLogStarSecret {
    pub(crate) fn new(x: &BigNumber, rho: &Nonce) -> Self {
        Self {
            x: x.clone(),
            rho: rho.clone(),
        }
    }
}

impl PiLogStarProof {
    fn challenge(
        input: &PiLogStarInput,
        S: &BigNumber,
        A: &Ciphertext,
        Y: &CurvePoint,
        D: &BigNumber,
    ) -> Result<BigNumber> {
        challenge_from_parts(
            b"PiLogStarProof",
            &[
                bn_part(input.pk.n()),
                input.C.to_bytes(),
                point_part(&input.X),
                point_part(&input.g),
                bn_part(input.setup_params.modulus()),
                bn_part(input.setup_params.s()),
                bn_part(input.setup_params.t()),
                bn_part(S),
                A.to_bytes(),
                point_part(Y),
                bn_part(D),
            ],
        )
    }
}

impl Proof for PiLogStarProof {
    const PARTS: usize = 7;
    const TYPE: ProofType = ProofType::LogStar;
    type CommonInput = PiLogStarInput;
    type ProverSecret = PiLogStarSecret;

    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
    ) -> Result<Self> {
        let rp = &input.setup_params;
        let alpha = random_positive_bn(rng, &(BigNumber::one() << (ELL + EPSILON)));
        let mu = random_positive_bn(rng, &((BigNumber::one() << ELL) * rp.modulus()));
        let gamma = random_positive_bn(rng, &((BigNumber::one() << (ELL + EPSILON)) * rp.modulus()));

        let S = rp.commit(&secret.x, &mu);
        let (A, r) = input.pk.encrypt(rng, &alpha)?;
        let Y = input.g.multiply(&bn_to_scalar(&alpha)?);
        let D = rp.commit(&alpha, &gamma);

        let e = Self::challenge(input, &S, &A, &Y, &D)?;

        let z1 = &alpha + &e * &secret.x;
        let z2 = r.0.modmul(&modpow(&secret.rho.0, &e, input.pk.n()), input.pk.n());
        let z3 = gamma + &e * mu;

        Ok(Self {
            S,
            A,
            Y,
            D,
            z1,
            z2,
            z3,
        })
    }

    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        let rp = &input.setup_params;
        for component in [&self.S, &self.A.0, &self.D, &self.z1, &self.z2, &self.z3] {
            if component == &BigNumber::zero() {
                return verify_err!(Self::TYPE, "zero proof component");
            }
        }
        if self.Y == CurvePoint::IDENTITY {
            return verify_err!(Self::TYPE, "identity proof component");
        }

        let e = Self::challenge(input, &self.S, &self.A, &self.Y, &self.D)?;

        let eq_check_1 = {
            let lhs = input.pk.encrypt_unchecked(&self.z1, &self.z2);
            let rhs = input
                .pk
                .homo_add(&self.A, &input.pk.homo_mult(&e, &input.C)?)?;
            lhs == rhs
        };
        if !eq_check_1 {
            return verify_err!(Self::TYPE, "ciphertext equality failed");
        }

        let eq_check_2 = {
            let lhs = input.g.multiply(&bn_to_scalar(&self.z1)?);
            let rhs = self.Y.add(&input.X.multiply(&bn_to_scalar(&e)?));
            lhs == rhs
        };
        if !eq_check_2 {
            return verify_err!(Self::TYPE, "curve equality failed");
        }

        let eq_check_3 = {
            let lhs = rp.commit(&self.z1, &self.z3);
            let rhs = rp.combine(&self.D, &self.S, &e);
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
            bn_part(&self.S),
            self.A.to_bytes(),
            point_part(&self.Y),
            bn_part(&self.D),
            bn_part(&self.z1),
            bn_part(&self.z2),
            bn_part(&self.z3),
        ]
    }

    fn from_parts(parts: &[Vec<u8>]) -> Result<Self> {
        if parts.len() != Self::PARTS {
            return Err(crate::errors::Error::Serialization);
        }
        Ok(Self {
            S: BigNumber::from_slice(&parts[0]),
            A: Ciphertext::from_bytes(&parts[1]),
            Y: CurvePoint::from_bytes(&parts[2])?,
            D: BigNumber::from_slice(&parts[3]),
            z1: BigNumber::from_slice(&parts[4]),
            z2: BigNumber::from_slice(&parts[5]),
            z3: BigNumber::from_slice(&parts[6]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paillier::DecryptionKey;
    use crate::utils::{get_test_rng, k256_order};
    use crate::zkp::{proof_array_from_bytes, proof_array_to_bytes};

    fn setup() -> Result<(PiLogStarProof, PiLogStarInput)> {
        let mut rng = get_test_rng();
        let sk = DecryptionKey::new(&mut rng)?;
        let pk = sk.encryption_key();
        let setup = RingPedersen::gen(&mut rng)?;

        let x = random_positive_bn(&mut rng, &k256_order());
        let X = CurvePoint::GENERATOR.multiply(&bn_to_scalar(&x)?);
        let (C, rho) = pk.encrypt(&mut rng, &x)?;

        let input = PiLogStarInput::new(&setup, &pk, &C, &X);
        let proof = PiLogStarProof::prove(&mut rng, &input, &PiLogStarSecret::new(&x, &rho))?;
        Ok((proof, input))
    }

    #[test]
    fn proof_verifies() -> Result<()> {
        let (proof, input) = setup()?;
        proof.verify(&input)
    }

    #[test]
    fn proof_with_auxiliary_base_verifies() -> Result<()> {
        let mut rng = get_test_rng();
        let sk = DecryptionKey::new(&mut rng)?;
        let pk = sk.encryption_key();
        let setup = RingPedersen::gen(&mut rng)?;

        let x = random_positive_bn(&mut rng, &k256_order());
        // G = g^x, X = G^x
        let G = CurvePoint::GENERATOR.multiply(&bn_to_scalar(&x)?);
        let X = G.multiply(&bn_to_scalar(&x)?);
        let (C, rho) = pk.encrypt(&mut rng, &x)?;

        let input = PiLogStarInput::new_with_base(&setup, &pk, &C, &X, &G);
        let proof = PiLogStarProof::prove(&mut rng, &input, &PiLogStarSecret::new(&x, &rho))?;
        proof.verify(&input)
    }

    #[test]
    fn proof_with_mutated_last_component_fails() -> Result<()> {
        let (mut proof, input) = setup()?;
        proof.z3 = &proof.z3 - 1;
        assert!(proof.verify(&input).is_err());
        Ok(())
    }

    #[test]
    fn proof_array_roundtrip() -> Result<()> {
        let (proof, input) = setup()?;
        let array = vec![Some(proof.clone()), Some(proof), None];
        let bytes = proof_array_to_bytes(&array);
        let out: Vec<Option<PiLogStarProof>> = proof_array_from_bytes(&bytes)?;
        assert_eq!(out.len(), 3);
        out[0].as_ref().unwrap().verify(&input)?;
        out[1].as_ref().unwrap().verify(&input)?;
        assert!(out[2].is_none());
        Ok(())
    }
}
