// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Implements the ZKP from Figure 14 of <https://eprint.iacr.org/2021/060.pdf>
//!
//! Proves that the plaintext of a Paillier ciphertext `K` lies within the
//! range `[-2^{ELL+EPSILON}, 2^{ELL+EPSILON}]`.

use crate::{
    errors::{ProofType, Result},
    paillier::{Ciphertext, EncryptionKey, Nonce},
    parameters::{ELL, EPSILON},
    ring_pedersen::RingPedersen,
    utils::{bn_part, challenge_from_parts, modpow, random_positive_bn},
    zkp::Proof,
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PiEncProof {
    /// Ring-Pedersen commitment to the witness.
    pub(crate) S: BigNumber,
    /// Paillier commitment to the masking value.
    pub(crate) A: Ciphertext,
    /// Ring-Pedersen commitment to the masking value.
    pub(crate) C: BigNumber,
    pub(crate) z1: BigNumber,
    pub(crate) z2: BigNumber,
    pub(crate) z3: BigNumber,
}

#[derive(Clone)]
pub(crate) struct PiEncInput {
    /// The verifier's ring-Pedersen parameters.
    setup_params: RingPedersen,
    /// This corresponds to `N_0` in the paper: the prover's Paillier key.
    pk: EncryptionKey,
    K: Ciphertext,
}

impl PiEncInput {
    pub(crate) fn new(setup_params: &RingPedersen, pk: &EncryptionKey, K: &Ciphertext) -> Self {
        Self {
            setup_params: setup_params.clone(),
            pk: pk.clone(),
            K: K.clone(),
        }
    }
}

pub(crate) struct PiEncSecret {
    k: BigNumber,
    rho: Nonce,
}

impl PiEncSecret {
    pub(crate) fn new(k: &BigNumber, rho: &Nonce) -> Self {
        Self {
            k: k.clone(),
            rho: rho.clone(),
        }
    }
}

impl PiEncProof {
    fn challenge(input: &PiEncInput, S: &BigNumber, A: &Ciphertext, C: &BigNumber) -> Result<BigNumber> {
        challenge_from_parts(
            b"PiEncProof",
            &[
                bn_part(input.pk.n()),
                A.to_bytes(),
                input.K.to_bytes(),
                bn_part(input.setup_params.modulus()),
                bn_part(input.setup_params.s()),
                bn_part(input.setup_params.t()),
                bn_part(S),
                bn_part(C),
            ],
        )
    }
}

impl Proof for PiEncProof {
    const PARTS: usize = 6;
    const TYPE: ProofType = ProofType::Enc;
    type CommonInput = PiEncInput;
    type ProverSecret = PiEncSecret;

    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
    ) -> Result<Self> {
        let rp = &input.setup_params;
        // Sample alpha from [0, 2^{ELL + EPSILON})
        let alpha = random_positive_bn(rng, &(BigNumber::one() << (ELL + EPSILON)));
        let mu = random_positive_bn(rng, &((BigNumber::one() << ELL) * rp.modulus()));
        let gamma = random_positive_bn(rng, &((BigNumber::one() << (ELL + EPSILON)) * rp.modulus()));

        let S = rp.commit(&secret.k, &mu);
        let (A, r) = input.pk.encrypt(rng, &alpha)?;
        let C = rp.commit(&alpha, &gamma);

        let e = Self::challenge(input, &S, &A, &C)?;

        let z1 = &alpha + &e * &secret.k;
        let z2 = r.0.modmul(&modpow(&secret.rho.0, &e, input.pk.n()), input.pk.n());
        let z3 = gamma + &e * mu;

        Ok(Self { S, A, C, z1, z2, z3 })
    }

    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        let rp = &input.setup_params;
        for (component, name) in [
            (&self.S, "S"),
            (&self.A.0, "A"),
            (&self.C, "C"),
            (&self.z1, "z1"),
            (&self.z2, "z2"),
            (&self.z3, "z3"),
        ] {
            if component == &BigNumber::zero() {
                let _ = name;
                return verify_err!(Self::TYPE, "zero proof component");
            }
        }

        let e = Self::challenge(input, &self.S, &self.A, &self.C)?;

        let eq_check_1 = {
            let lhs = input.pk.encrypt_unchecked(&self.z1, &self.z2);
            let rhs = input
                .pk
                .homo_add(&self.A, &input.pk.homo_mult(&e, &input.K)?)?;
            lhs == rhs
        };
        if !eq_check_1 {
            return verify_err!(Self::TYPE, "ciphertext equality failed");
        }

        let eq_check_2 = {
            let lhs = rp.commit(&self.z1, &self.z3);
            let rhs = rp.combine(&self.C, &self.S, &e);
            lhs == rhs
        };
        if !eq_check_2 {
            return verify_err!(Self::TYPE, "commitment equality failed");
        }

        // Range check
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
            bn_part(&self.C),
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
            C: BigNumber::from_slice(&parts[2]),
            z1: BigNumber::from_slice(&parts[3]),
            z2: BigNumber::from_slice(&parts[4]),
            z3: BigNumber::from_slice(&parts[5]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paillier::DecryptionKey;
    use crate::utils::{get_test_rng, k256_order};

    fn proof_for_witness(k: &BigNumber) -> Result<(PiEncProof, PiEncInput)> {
        let mut rng = get_test_rng();
        let sk = DecryptionKey::new(&mut rng)?;
        let pk = sk.encryption_key();
        let setup = RingPedersen::gen(&mut rng)?;

        let (K, rho) = pk.encrypt(&mut rng, k)?;

        let input = PiEncInput::new(&setup, &pk, &K);
        let proof = PiEncProof::prove(&mut rng, &input, &PiEncSecret::new(k, &rho))?;
        Ok((proof, input))
    }

    fn small_witness() -> BigNumber {
        random_positive_bn(&mut get_test_rng(), &k256_order())
    }

    #[test]
    fn proof_verifies_for_small_witness() -> Result<()> {
        let (proof, input) = proof_for_witness(&small_witness())?;
        proof.verify(&input)
    }

    #[test]
    fn proof_fails_for_oversized_witness() -> Result<()> {
        // A witness past 2^{ELL+EPSILON} cannot satisfy the range check.
        let k = (BigNumber::one() << (ELL + EPSILON + 1))
            + random_positive_bn(&mut get_test_rng(), &(BigNumber::one() << (ELL + EPSILON)));
        let (proof, input) = proof_for_witness(&k)?;
        assert!(proof.verify(&input).is_err());
        Ok(())
    }

    #[test]
    fn proof_with_mutated_last_component_fails() -> Result<()> {
        let (mut proof, input) = proof_for_witness(&small_witness())?;
        proof.z3 = &proof.z3 - 1;
        assert!(proof.verify(&input).is_err());
        Ok(())
    }

    #[test]
    fn proof_bytes_roundtrip() -> Result<()> {
        let (proof, input) = proof_for_witness(&small_witness())?;
        let bytes = proof.to_bytes()?;
        let decoded = PiEncProof::from_bytes(&bytes)?;
        decoded.verify(&input)?;
        assert_eq!(bytes, decoded.to_bytes()?);
        Ok(())
    }
}
