// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Implements the ZKP from Figure 15 of <https://eprint.iacr.org/2021/060.pdf>
//! and its inverse variant.
//!
//! The statement binds an affine operation on a Paillier ciphertext to a
//! curve point: the prover knows `(x, y, ρ, ρ_y)` with `X = g^x`,
//! `Y = Enc_{N1}(y, ρ_y)`, and `D = C^x · Enc_{N0}(y, ρ)`. The inverse
//! variant ([`PiAffgInvProof`]) instead proves `D = C^x · Enc_{N0}(y, ρ)⁻¹`,
//! i.e. `D` encodes `-y` while `Y` still encrypts `+y`; this is the exact
//! relation produced by the MtA responder, which subtracts its share.

use crate::{
    errors::{Error, ProofType, Result},
    paillier::{Ciphertext, EncryptionKey, Nonce},
    parameters::{ELL, ELL_PRIME, EPSILON},
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
struct AffgCore {
    A: Ciphertext,
    B_x: CurvePoint,
    B_y: Ciphertext,
    E: BigNumber,
    S: BigNumber,
    F: BigNumber,
    T: BigNumber,
    z1: BigNumber,
    z2: BigNumber,
    z3: BigNumber,
    z4: BigNumber,
    w: BigNumber,
    w_y: BigNumber,
}

/// Common input is `(g, N0, N1, C, D, Y, X)`; prover secrets are
/// `(x, y, rho, rho_y)`.
#[derive(Clone)]
pub(crate) struct PiAffgInput {
    setup_params: RingPedersen,
    /// The verifier-side Paillier key (`N_0`): the key `C` and `D` live
    /// under.
    pk0: EncryptionKey,
    /// The prover-side Paillier key (`N_1`): the key `Y` lives under.
    pk1: EncryptionKey,
    C: Ciphertext,
    D: Ciphertext,
    Y: Ciphertext,
    X: CurvePoint,
}

impl PiAffgInput {
    pub(crate) fn new(
        setup_params: &RingPedersen,
        pk0: &EncryptionKey,
        pk1: &EncryptionKey,
        C: &Ciphertext,
        D: &Ciphertext,
        Y: &Ciphertext,
        X: &CurvePoint,
    ) -> Self {
        Self {
            setup_params: setup_params.clone(),
            pk0: pk0.clone(),
            pk1: pk1.clone(),
            C: C.clone(),
            D: D.clone(),
            Y: Y.clone(),
            X: *X,
        }
    }
}

pub(crate) struct PiAffgSecret {
    x: BigNumber,
    y: BigNumber,
    rho: Nonce,
    rho_y: Nonce,
}

impl PiAffgSecret {
    pub(crate) fn new(x: &BigNumber, y: &BigNumber, rho: &Nonce, rho_y: &Nonce) -> Self {
        Self {
            x: x.clone(),
            y: y.clone(),
            rho: rho.clone(),
            rho_y: rho_y.clone(),
        }
    }
}

impl AffgCore {
    fn challenge(label: &'static [u8], input: &PiAffgInput, core: &AffgCore) -> Result<BigNumber> {
        challenge_from_parts(
            label,
            &[
                bn_part(input.pk0.n()),
                bn_part(input.pk1.n()),
                input.C.to_bytes(),
                input.D.to_bytes(),
                input.Y.to_bytes(),
                point_part(&input.X),
                bn_part(input.setup_params.modulus()),
                bn_part(input.setup_params.s()),
                bn_part(input.setup_params.t()),
                core.A.to_bytes(),
                point_part(&core.B_x),
                core.B_y.to_bytes(),
                bn_part(&core.E),
                bn_part(&core.S),
                bn_part(&core.F),
                bn_part(&core.T),
            ],
        )
    }

    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &PiAffgInput,
        secret: &PiAffgSecret,
        inverted: bool,
        label: &'static [u8],
    ) -> Result<Self> {
        let rp = &input.setup_params;
        let alpha = random_positive_bn(rng, &(BigNumber::one() << (ELL + EPSILON)));
        let beta = random_positive_bn(rng, &(BigNumber::one() << (ELL_PRIME + EPSILON)));
        let r = Nonce(random_bn_in_z_star(rng, input.pk0.n())?);
        let r_y = Nonce(random_bn_in_z_star(rng, input.pk1.n())?);
        let gamma = random_positive_bn(rng, &((BigNumber::one() << (ELL + EPSILON)) * rp.modulus()));
        let m = random_positive_bn(rng, &((BigNumber::one() << ELL) * rp.modulus()));
        let delta = random_positive_bn(rng, &((BigNumber::one() << (ELL + EPSILON)) * rp.modulus()));
        let mu = random_positive_bn(rng, &((BigNumber::one() << ELL) * rp.modulus()));

        let A = {
            let masked = input.pk0.encrypt_with_randomness(&beta, &r)?;
            let term = if inverted {
                input.pk0.homo_mult_inv(&masked)?
            } else {
                masked
            };
            input
                .pk0
                .homo_add(&input.pk0.homo_mult(&alpha, &input.C)?, &term)?
        };
        let B_x = CurvePoint::GENERATOR.multiply(&bn_to_scalar(&alpha)?);
        let B_y = input.pk1.encrypt_with_randomness(&beta, &r_y)?;
        let E = rp.commit(&alpha, &gamma);
        let S = rp.commit(&secret.x, &m);
        let F = rp.commit(&beta, &delta);
        let T = rp.commit(&secret.y, &mu);

        let mut core = Self {
            A,
            B_x,
            B_y,
            E,
            S,
            F,
            T,
            z1: BigNumber::zero(),
            z2: BigNumber::zero(),
            z3: BigNumber::zero(),
            z4: BigNumber::zero(),
            w: BigNumber::zero(),
            w_y: BigNumber::zero(),
        };
        let e = Self::challenge(label, input, &core)?;

        core.z1 = &alpha + &e * &secret.x;
        core.z2 = &beta + &e * &secret.y;
        core.z3 = gamma + &e * m;
        core.z4 = delta + &e * mu;
        core.w = r
            .0
            .modmul(&modpow(&secret.rho.0, &e, input.pk0.n()), input.pk0.n());
        core.w_y = r_y
            .0
            .modmul(&modpow(&secret.rho_y.0, &e, input.pk1.n()), input.pk1.n());

        Ok(core)
    }

    fn verify(
        &self,
        input: &PiAffgInput,
        inverted: bool,
        label: &'static [u8],
        proof_type: ProofType,
    ) -> Result<()> {
        let rp = &input.setup_params;
        for component in [
            &self.A.0, &self.B_y.0, &self.E, &self.S, &self.F, &self.T, &self.z1, &self.z2,
            &self.z3, &self.z4, &self.w, &self.w_y,
        ] {
            if component == &BigNumber::zero() {
                return verify_err!(proof_type, "zero proof component");
            }
        }
        if self.B_x == CurvePoint::IDENTITY {
            return verify_err!(proof_type, "identity proof component");
        }

        let e = Self::challenge(label, input, self)?;

        let eq_check_1 = {
            let masked = input.pk0.encrypt_unchecked(&self.z2, &self.w);
            let term = if inverted {
                input.pk0.homo_mult_inv(&masked)?
            } else {
                masked
            };
            let lhs = input
                .pk0
                .homo_add(&input.pk0.homo_mult(&self.z1, &input.C)?, &term)?;
            let rhs = input
                .pk0
                .homo_add(&self.A, &input.pk0.homo_mult(&e, &input.D)?)?;
            lhs == rhs
        };
        if !eq_check_1 {
            return verify_err!(proof_type, "affine ciphertext equality failed");
        }

        let eq_check_2 = {
            let lhs = CurvePoint::GENERATOR.multiply(&bn_to_scalar(&self.z1)?);
            let rhs = self.B_x.add(&input.X.multiply(&bn_to_scalar(&e)?));
            lhs == rhs
        };
        if !eq_check_2 {
            return verify_err!(proof_type, "curve equality failed");
        }

        let eq_check_3 = {
            let lhs = input.pk1.encrypt_unchecked(&self.z2, &self.w_y);
            let rhs = input
                .pk1
                .homo_add(&self.B_y, &input.pk1.homo_mult(&e, &input.Y)?)?;
            lhs == rhs
        };
        if !eq_check_3 {
            return verify_err!(proof_type, "Y-side ciphertext equality failed");
        }

        let eq_check_4 = {
            let lhs = rp.commit(&self.z1, &self.z3);
            let rhs = rp.combine(&self.E, &self.S, &e);
            lhs == rhs
        };
        if !eq_check_4 {
            return verify_err!(proof_type, "x-side commitment equality failed");
        }

        let eq_check_5 = {
            let lhs = rp.commit(&self.z2, &self.z4);
            let rhs = rp.combine(&self.F, &self.T, &e);
            lhs == rhs
        };
        if !eq_check_5 {
            return verify_err!(proof_type, "y-side commitment equality failed");
        }

        let bound_x = BigNumber::one() << (ELL + EPSILON);
        if self.z1 < -bound_x.clone() || self.z1 > bound_x {
            return verify_err!(proof_type, "x response out of range");
        }
        let bound_y = BigNumber::one() << (ELL_PRIME + EPSILON);
        if self.z2 < -bound_y.clone() || self.z2 > bound_y {
            return verify_err!(proof_type, "y response out of range");
        }

        Ok(())
    }

    fn to_parts(&self) -> Vec<Vec<u8>> {
        vec![
            self.A.to_bytes(),
            point_part(&self.B_x),
            self.B_y.to_bytes(),
            bn_part(&self.E),
            bn_part(&self.S),
            bn_part(&self.F),
            bn_part(&self.T),
            bn_part(&self.z1),
            bn_part(&self.z2),
            bn_part(&self.z3),
            bn_part(&self.z4),
            bn_part(&self.w),
            bn_part(&self.w_y),
        ]
    }

    fn from_parts(parts: &[Vec<u8>]) -> Result<Self> {
        if parts.len() != 13 {
            return Err(Error::Serialization);
        }
        Ok(Self {
            A: Ciphertext::from_bytes(&parts[0]),
            B_x: CurvePoint::from_bytes(&parts[1])?,
            B_y: Ciphertext::from_bytes(&parts[2]),
            E: BigNumber::from_slice(&parts[3]),
            S: BigNumber::from_slice(&parts[4]),
            F: BigNumber::from_slice(&parts[5]),
            T: BigNumber::from_slice(&parts[6]),
            z1: BigNumber::from_slice(&parts[7]),
            z2: BigNumber::from_slice(&parts[8]),
            z3: BigNumber::from_slice(&parts[9]),
            z4: BigNumber::from_slice(&parts[10]),
            w: BigNumber::from_slice(&parts[11]),
            w_y: BigNumber::from_slice(&parts[12]),
        })
    }
}

/// The plain affine-operation proof: `D = C^x · Enc_{N0}(y, ρ)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PiAffgProof(AffgCore);

impl Proof for PiAffgProof {
    const PARTS: usize = 13;
    const TYPE: ProofType = ProofType::AffG;
    type CommonInput = PiAffgInput;
    type ProverSecret = PiAffgSecret;

    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
    ) -> Result<Self> {
        Ok(Self(AffgCore::prove(
            rng,
            input,
            secret,
            false,
            b"PiAffgProof",
        )?))
    }

    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        self.0.verify(input, false, b"PiAffgProof", Self::TYPE)
    }

    fn to_parts(&self) -> Vec<Vec<u8>> {
        self.0.to_parts()
    }

    fn from_parts(parts: &[Vec<u8>]) -> Result<Self> {
        Ok(Self(AffgCore::from_parts(parts)?))
    }
}

/// The inverse variant: `D = C^x · Enc_{N0}(y, ρ)⁻¹` while `Y` encrypts
/// `+y`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PiAffgInvProof(AffgCore);

impl Proof for PiAffgInvProof {
    const PARTS: usize = 13;
    const TYPE: ProofType = ProofType::AffGInv;
    type CommonInput = PiAffgInput;
    type ProverSecret = PiAffgSecret;

    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
    ) -> Result<Self> {
        Ok(Self(AffgCore::prove(
            rng,
            input,
            secret,
            true,
            b"PiAffgInvProof",
        )?))
    }

    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        self.0.verify(input, true, b"PiAffgInvProof", Self::TYPE)
    }

    fn to_parts(&self) -> Vec<Vec<u8>> {
        self.0.to_parts()
    }

    fn from_parts(parts: &[Vec<u8>]) -> Result<Self> {
        Ok(Self(AffgCore::from_parts(parts)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paillier::DecryptionKey;
    use crate::utils::{get_test_rng, k256_order};
    use crate::zkp::{proof_array_from_bytes, proof_array_to_bytes};
    use rand::{CryptoRng, RngCore};

    struct TestData {
        input: PiAffgInput,
        secret: PiAffgSecret,
    }

    fn generate_affg_data<R: RngCore + CryptoRng>(rng: &mut R, inverted: bool) -> Result<TestData> {
        let sk0 = DecryptionKey::new(rng)?;
        let pk0 = sk0.encryption_key();
        let sk1 = DecryptionKey::new(rng)?;
        let pk1 = sk1.encryption_key();
        let setup = RingPedersen::gen(rng)?;
        let q = k256_order();

        let x = random_positive_bn(rng, &q);
        let y = random_positive_bn(rng, &q);
        let c = random_positive_bn(rng, &q);

        let X = CurvePoint::GENERATOR.multiply(&bn_to_scalar(&x)?);
        let (C, _) = pk0.encrypt(rng, &c)?;
        let (Y, rho_y) = pk1.encrypt(rng, &y)?;

        let (enc_y, rho) = pk0.encrypt(rng, &y)?;
        let term = if inverted {
            pk0.homo_mult_inv(&enc_y)?
        } else {
            enc_y
        };
        let D = pk0.homo_add(&pk0.homo_mult(&x, &C)?, &term)?;

        Ok(TestData {
            input: PiAffgInput::new(&setup, &pk0, &pk1, &C, &D, &Y, &X),
            secret: PiAffgSecret::new(&x, &y, &rho, &rho_y),
        })
    }

    #[test]
    fn affg_proof_verifies() -> Result<()> {
        let mut rng = get_test_rng();
        let data = generate_affg_data(&mut rng, false)?;
        let proof = PiAffgProof::prove(&mut rng, &data.input, &data.secret)?;
        proof.verify(&data.input)
    }

    #[test]
    fn affg_inv_proof_verifies() -> Result<()> {
        let mut rng = get_test_rng();
        let data = generate_affg_data(&mut rng, true)?;
        let proof = PiAffgInvProof::prove(&mut rng, &data.input, &data.secret)?;
        proof.verify(&data.input)
    }

    #[test]
    fn affg_variants_are_not_interchangeable() -> Result<()> {
        let mut rng = get_test_rng();
        let data = generate_affg_data(&mut rng, false)?;
        let proof = PiAffgProof::prove(&mut rng, &data.input, &data.secret)?;
        let as_inv = PiAffgInvProof::from_parts(&proof.to_parts())?;
        assert!(as_inv.verify(&data.input).is_err());
        Ok(())
    }

    #[test]
    fn affg_proof_with_mutated_last_component_fails() -> Result<()> {
        let mut rng = get_test_rng();
        let data = generate_affg_data(&mut rng, false)?;
        let mut proof = PiAffgProof::prove(&mut rng, &data.input, &data.secret)?;
        proof.0.w_y = &proof.0.w_y - 1;
        assert!(proof.verify(&data.input).is_err());
        Ok(())
    }

    #[test]
    fn affg_inv_proof_array_roundtrip() -> Result<()> {
        let mut rng = get_test_rng();
        let data = generate_affg_data(&mut rng, true)?;
        let proof = PiAffgInvProof::prove(&mut rng, &data.input, &data.secret)?;
        let array = vec![Some(proof.clone()), None, Some(proof)];
        let out: Vec<Option<PiAffgInvProof>> = proof_array_from_bytes(&proof_array_to_bytes(&array))?;
        out[0].as_ref().unwrap().verify(&data.input)?;
        assert!(out[1].is_none());
        out[2].as_ref().unwrap().verify(&data.input)?;
        Ok(())
    }
}
