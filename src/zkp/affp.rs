// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Implements the ZKP from Figure 26 of <https://eprint.iacr.org/2021/060.pdf>:
//! the affine-operation proof where the multiplier itself is only available
//! as a Paillier ciphertext.
//!
//! The prover knows `(x, y, ρ, ρ_x, ρ_y)` such that `X = Enc_{N1}(x, ρ_x)`,
//! `Y = Enc_{N1}(y, ρ_y)` and `D = C^x · Enc_{N0}(y, ρ)`. This is the proof
//! the MtA responder uses when its input arrived encrypted under its own key
//! rather than committed as a curve point.

use crate::{
    errors::{Error, ProofType, Result},
    paillier::{Ciphertext, EncryptionKey, Nonce},
    parameters::{ELL, ELL_PRIME, EPSILON},
    ring_pedersen::RingPedersen,
    utils::{bn_part, challenge_from_parts, modpow, random_bn_in_z_star, random_positive_bn},
    zkp::Proof,
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PiAffpProof {
    A: Ciphertext,
    B_x: Ciphertext,
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
    w_x: BigNumber,
    w_y: BigNumber,
}

#[derive(Clone)]
pub(crate) struct PiAffpInput {
    setup_params: RingPedersen,
    /// `N_0`: the key `C` and `D` live under.
    pk0: EncryptionKey,
    /// `N_1`: the key `X` and `Y` live under.
    pk1: EncryptionKey,
    C: Ciphertext,
    D: Ciphertext,
    X: Ciphertext,
    Y: Ciphertext,
}

impl PiAffpInput {
    pub(crate) fn new(
        setup_params: &RingPedersen,
        pk0: &EncryptionKey,
        pk1: &EncryptionKey,
        C: &Ciphertext,
        D: &Ciphertext,
        X: &Ciphertext,
        Y: &Ciphertext,
    ) -> Self {
        Self {
            setup_params: setup_params.clone(),
            pk0: pk0.clone(),
            pk1: pk1.clone(),
            C: C.clone(),
            D: D.clone(),
            X: X.clone(),
            Y: Y.clone(),
        }
    }
}

pub(crate) struct PiAffpSecret {
    x: BigNumber,
    y: BigNumber,
    rho: Nonce,
    rho_x: Nonce,
    rho_y: Nonce,
}

impl PiAffpSecret {
    pub(crate) fn new(
        x: &BigNumber,
        y: &BigNumber,
        rho: &Nonce,
        rho_x: &Nonce,
        rho_y: &Nonce,
    ) -> Self {
        Self {
            x: x.clone(),
            y: y.clone(),
            rho: rho.clone(),
            rho_x: rho_x.clone(),
            rho_y: rho_y.clone(),
        }
    }
}

impl PiAffpProof {
    fn challenge(
        input: &PiAffpInput,
        A: &Ciphertext,
        B_x: &Ciphertext,
        B_y: &Ciphertext,
        E: &BigNumber,
        S: &BigNumber,
        F: &BigNumber,
        T: &BigNumber,
    ) -> Result<BigNumber> {
        challenge_from_parts(
            b"PiAffpProof",
            &[
                bn_part(input.pk0.n()),
                bn_part(input.pk1.n()),
                input.C.to_bytes(),
                input.D.to_bytes(),
                input.X.to_bytes(),
                input.Y.to_bytes(),
                bn_part(input.setup_params.modulus()),
                bn_part(input.setup_params.s()),
                bn_part(input.setup_params.t()),
                A.to_bytes(),
                B_x.to_bytes(),
                B_y.to_bytes(),
                bn_part(E),
                bn_part(S),
                bn_part(F),
                bn_part(T),
            ],
        )
    }
}

impl Proof for PiAffpProof {
    const PARTS: usize = 14;
    const TYPE: ProofType = ProofType::AffP;
    type CommonInput = PiAffpInput;
    type ProverSecret = PiAffpSecret;

    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
    ) -> Result<Self> {
        let rp = &input.setup_params;
        let alpha = random_positive_bn(rng, &(BigNumber::one() << (ELL + EPSILON)));
        let beta = random_positive_bn(rng, &(BigNumber::one() << (ELL_PRIME + EPSILON)));
        let r = Nonce(random_bn_in_z_star(rng, input.pk0.n())?);
        let r_x = Nonce(random_bn_in_z_star(rng, input.pk1.n())?);
        let r_y = Nonce(random_bn_in_z_star(rng, input.pk1.n())?);
        let gamma = random_positive_bn(rng, &((BigNumber::one() << (ELL + EPSILON)) * rp.modulus()));
        let m = random_positive_bn(rng, &((BigNumber::one() << ELL) * rp.modulus()));
        let delta = random_positive_bn(rng, &((BigNumber::one() << (ELL + EPSILON)) * rp.modulus()));
        let mu = random_positive_bn(rng, &((BigNumber::one() << ELL) * rp.modulus()));

        let A = {
            let masked = input.pk0.encrypt_with_randomness(&beta, &r)?;
            input
                .pk0
                .homo_add(&input.pk0.homo_mult(&alpha, &input.C)?, &masked)?
        };
        let B_x = input.pk1.encrypt_with_randomness(&alpha, &r_x)?;
        let B_y = input.pk1.encrypt_with_randomness(&beta, &r_y)?;
        let E = rp.commit(&alpha, &gamma);
        let S = rp.commit(&secret.x, &m);
        let F = rp.commit(&beta, &delta);
        let T = rp.commit(&secret.y, &mu);

        let e = Self::challenge(input, &A, &B_x, &B_y, &E, &S, &F, &T)?;

        let z1 = &alpha + &e * &secret.x;
        let z2 = &beta + &e * &secret.y;
        let z3 = gamma + &e * m;
        let z4 = delta + &e * mu;
        let w = r
            .0
            .modmul(&modpow(&secret.rho.0, &e, input.pk0.n()), input.pk0.n());
        let w_x = r_x
            .0
            .modmul(&modpow(&secret.rho_x.0, &e, input.pk1.n()), input.pk1.n());
        let w_y = r_y
            .0
            .modmul(&modpow(&secret.rho_y.0, &e, input.pk1.n()), input.pk1.n());

        Ok(Self {
            A,
            B_x,
            B_y,
            E,
            S,
            F,
            T,
            z1,
            z2,
            z3,
            z4,
            w,
            w_x,
            w_y,
        })
    }

    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        let rp = &input.setup_params;
        for component in [
            &self.A.0, &self.B_x.0, &self.B_y.0, &self.E, &self.S, &self.F, &self.T, &self.z1,
            &self.z2, &self.z3, &self.z4, &self.w, &self.w_x, &self.w_y,
        ] {
            if component == &BigNumber::zero() {
                return verify_err!(Self::TYPE, "zero proof component");
            }
        }

        let e = Self::challenge(
            input, &self.A, &self.B_x, &self.B_y, &self.E, &self.S, &self.F, &self.T,
        )?;

        let eq_check_1 = {
            let masked = input.pk0.encrypt_unchecked(&self.z2, &self.w);
            let lhs = input
                .pk0
                .homo_add(&input.pk0.homo_mult(&self.z1, &input.C)?, &masked)?;
            let rhs = input
                .pk0
                .homo_add(&self.A, &input.pk0.homo_mult(&e, &input.D)?)?;
            lhs == rhs
        };
        if !eq_check_1 {
            return verify_err!(Self::TYPE, "affine ciphertext equality failed");
        }

        let eq_check_2 = {
            let lhs = input.pk1.encrypt_unchecked(&self.z1, &self.w_x);
            let rhs = input
                .pk1
                .homo_add(&self.B_x, &input.pk1.homo_mult(&e, &input.X)?)?;
            lhs == rhs
        };
        if !eq_check_2 {
            return verify_err!(Self::TYPE, "X-side ciphertext equality failed");
        }

        let eq_check_3 = {
            let lhs = input.pk1.encrypt_unchecked(&self.z2, &self.w_y);
            let rhs = input
                .pk1
                .homo_add(&self.B_y, &input.pk1.homo_mult(&e, &input.Y)?)?;
            lhs == rhs
        };
        if !eq_check_3 {
            return verify_err!(Self::TYPE, "Y-side ciphertext equality failed");
        }

        let eq_check_4 = {
            let lhs = rp.commit(&self.z1, &self.z3);
            let rhs = rp.combine(&self.E, &self.S, &e);
            lhs == rhs
        };
        if !eq_check_4 {
            return verify_err!(Self::TYPE, "x-side commitment equality failed");
        }

        let eq_check_5 = {
            let lhs = rp.commit(&self.z2, &self.z4);
            let rhs = rp.combine(&self.F, &self.T, &e);
            lhs == rhs
        };
        if !eq_check_5 {
            return verify_err!(Self::TYPE, "y-side commitment equality failed");
        }

        let bound_x = BigNumber::one() << (ELL + EPSILON);
        if self.z1 < -bound_x.clone() || self.z1 > bound_x {
            return verify_err!(Self::TYPE, "x response out of range");
        }
        let bound_y = BigNumber::one() << (ELL_PRIME + EPSILON);
        if self.z2 < -bound_y.clone() || self.z2 > bound_y {
            return verify_err!(Self::TYPE, "y response out of range");
        }

        Ok(())
    }

    fn to_parts(&self) -> Vec<Vec<u8>> {
        vec![
            self.A.to_bytes(),
            self.B_x.to_bytes(),
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
            bn_part(&self.w_x),
            bn_part(&self.w_y),
        ]
    }

    fn from_parts(parts: &[Vec<u8>]) -> Result<Self> {
        if parts.len() != Self::PARTS {
            return Err(Error::Serialization);
        }
        Ok(Self {
            A: Ciphertext::from_bytes(&parts[0]),
            B_x: Ciphertext::from_bytes(&parts[1]),
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
            w_x: BigNumber::from_slice(&parts[12]),
            w_y: BigNumber::from_slice(&parts[13]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paillier::DecryptionKey;
    use crate::utils::{get_test_rng, k256_order};

    fn setup() -> Result<(PiAffpProof, PiAffpInput)> {
        let mut rng = get_test_rng();
        let sk0 = DecryptionKey::new(&mut rng)?;
        let pk0 = sk0.encryption_key();
        let sk1 = DecryptionKey::new(&mut rng)?;
        let pk1 = sk1.encryption_key();
        let setup = RingPedersen::gen(&mut rng)?;
        let q = k256_order();

        let x = random_positive_bn(&mut rng, &q);
        let y = random_positive_bn(&mut rng, &q);
        let c = random_positive_bn(&mut rng, &q);

        let (C, _) = pk0.encrypt(&mut rng, &c)?;
        let (X, rho_x) = pk1.encrypt(&mut rng, &x)?;
        let (Y, rho_y) = pk1.encrypt(&mut rng, &y)?;
        let (enc_y, rho) = pk0.encrypt(&mut rng, &y)?;
        let D = pk0.homo_add(&pk0.homo_mult(&x, &C)?, &enc_y)?;

        let input = PiAffpInput::new(&setup, &pk0, &pk1, &C, &D, &X, &Y);
        let proof = PiAffpProof::prove(
            &mut rng,
            &input,
            &PiAffpSecret::new(&x, &y, &rho, &rho_x, &rho_y),
        )?;
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
        proof.w_y = &proof.w_y - 1;
        assert!(proof.verify(&input).is_err());
        Ok(())
    }

    #[test]
    fn proof_bytes_roundtrip() -> Result<()> {
        let (proof, input) = setup()?;
        let decoded = PiAffpProof::from_bytes(&proof.to_bytes()?)?;
        decoded.verify(&input)
    }
}
