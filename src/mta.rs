// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The accountable multiplicative-to-additive (MtA) share protocol.
//!
//! Alice holds `a ∈ [0, q)` encrypted under her Paillier key; Bob holds `b`.
//! After one round trip Alice learns `α` and Bob keeps `β` with
//! `α + β ≡ a·b (mod q)`, and every step is accompanied by proofs that any
//! party in the session can check against its own ring-Pedersen parameters
//! (the slot a prover aims at itself is `None`).
//!
//! Three responder variants exist, distinguished by how Bob's input is
//! committed: as a bare scalar (`bob_responds_g`), additionally as a curve
//! point (`bob_responds_dl`), or itself Paillier-encrypted under Bob's key
//! (`bob_responds_p`).

use crate::{
    errors::Result,
    paillier::{Ciphertext, DecryptionKey, EncryptionKey, Nonce},
    ring_pedersen::RingPedersen,
    utils::{bn_to_scalar, k256_order, CurvePoint},
    zkp::{
        affg::{PiAffgInput, PiAffgInvProof, PiAffgSecret},
        affp::{PiAffpInput, PiAffpProof, PiAffpSecret},
        dec::{PiDecInput, PiDecProof, PiDecSecret},
        enc::{PiEncInput, PiEncProof, PiEncSecret},
        Proof,
    },
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};

/// Alice's opening move: commit to `a` under her own key and produce one
/// range proof per verifier parameter set.
pub(crate) fn alice_init<R: RngCore + CryptoRng>(
    rng: &mut R,
    pk_a: &EncryptionKey,
    a: &BigNumber,
    rho_a: &Nonce,
    rp_verifiers: &[Option<RingPedersen>],
) -> Result<(Ciphertext, Vec<Option<PiEncProof>>)> {
    let c_a = pk_a.encrypt_with_randomness(a, rho_a)?;
    let secret = PiEncSecret::new(a, rho_a);
    let proofs = rp_verifiers
        .iter()
        .map(|rp| {
            rp.as_ref()
                .map(|rp| PiEncProof::prove(rng, &PiEncInput::new(rp, pk_a, &c_a), &secret))
                .transpose()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((c_a, proofs))
}

/// Bob-side check of Alice's range proof against Bob's own parameters.
/// No ciphertext of Alice's may be used before this passes.
pub(crate) fn bob_verify(
    proof: &PiEncProof,
    pk_a: &EncryptionKey,
    c_a: &Ciphertext,
    rp_bob: &RingPedersen,
) -> Result<()> {
    proof.verify(&PiEncInput::new(rp_bob, pk_a, c_a))
}

/// Everything Bob hands back in the scalar (`G`) variant.
pub(crate) struct BobResponseG {
    pub(crate) beta: BigNumber,
    pub(crate) c_alpha: Ciphertext,
    pub(crate) c_beta: Ciphertext,
    pub(crate) proofs: Vec<Option<PiAffgInvProof>>,
}

/// The `DL` variant adds the additive-inverse encryption and the Dec proofs
/// that make `β`'s reduction publicly checkable.
pub(crate) struct BobResponseDL {
    pub(crate) beta: BigNumber,
    pub(crate) c_alpha: Ciphertext,
    pub(crate) c_beta: Ciphertext,
    pub(crate) c_beta_prm: Ciphertext,
    pub(crate) proofs: Vec<Option<PiAffgInvProof>>,
    pub(crate) dec_proofs: Vec<Option<PiDecProof>>,
}

/// The `P` variant proves the affine relation against Bob's own ciphertext
/// of `b` instead of a curve point.
pub(crate) struct BobResponseP {
    pub(crate) beta: BigNumber,
    pub(crate) c_alpha: Ciphertext,
    pub(crate) c_beta: Ciphertext,
    pub(crate) c_beta_prm: Ciphertext,
    pub(crate) proofs: Vec<Option<PiAffpProof>>,
    pub(crate) dec_proofs: Vec<Option<PiDecProof>>,
}

/// Bob's response when his input `b` is a bare scalar.
///
/// Computes `cAlpha = cA^b · Enc_{pkA}(β, ρ')⁻¹` and `cBeta = Enc_{pkB}(β)`,
/// with one AffG-Inv proof per verifier parameter set.
pub(crate) fn bob_responds_g<R: RngCore + CryptoRng>(
    rng: &mut R,
    pk_a: &EncryptionKey,
    sk_b: &DecryptionKey,
    alice_proof: &PiEncProof,
    b: &BigNumber,
    c_a: &Ciphertext,
    rp_verifiers: &[Option<RingPedersen>],
    rp_bob: &RingPedersen,
) -> Result<BobResponseG> {
    bob_verify(alice_proof, pk_a, c_a, rp_bob)?;
    let pk_b = sk_b.encryption_key();
    let q = k256_order();

    let beta = crate::utils::random_positive_bn(rng, &q);
    let (masked_beta, rho_prm) = pk_a.encrypt(rng, &beta)?;
    let c_alpha = pk_a.homo_add(
        &pk_a.homo_mult(b, c_a)?,
        &pk_a.homo_mult_inv(&masked_beta)?,
    )?;
    let (c_beta, rho_beta) = pk_b.encrypt(rng, &beta)?;

    let big_b = CurvePoint::GENERATOR.multiply(&bn_to_scalar(b)?);
    let secret = PiAffgSecret::new(b, &beta, &rho_prm, &rho_beta);
    let proofs = rp_verifiers
        .iter()
        .map(|rp| {
            rp.as_ref()
                .map(|rp| {
                    let input =
                        PiAffgInput::new(rp, pk_a, &pk_b, c_a, &c_alpha, &c_beta, &big_b);
                    PiAffgInvProof::prove(rng, &input, &secret)
                })
                .transpose()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(BobResponseG {
        beta,
        c_alpha,
        c_beta,
        proofs,
    })
}

/// Per-verifier Dec proofs that `cBeta ⊕ cBetaPrm` decrypts to `0 mod q`.
fn beta_reduction_proofs<R: RngCore + CryptoRng>(
    rng: &mut R,
    pk_b: &EncryptionKey,
    c_beta: &Ciphertext,
    rho_beta: &Nonce,
    c_beta_prm: &Ciphertext,
    rho_beta_prm: &Nonce,
    beta: &BigNumber,
    beta_prm: &BigNumber,
    rp_verifiers: &[Option<RingPedersen>],
) -> Result<(Ciphertext, Vec<Option<PiDecProof>>)> {
    let q = k256_order();
    let c_sum = pk_b.homo_add(c_beta, c_beta_prm)?;
    // The plaintext of the sum is the integer β + β', which is 0 or q; its
    // randomness is the product of the two nonces.
    let y = beta + beta_prm;
    let rho = Nonce(rho_beta.0.modmul(&rho_beta_prm.0, pk_b.n()));
    let secret = PiDecSecret::new(&y, &rho);
    let dec_proofs = rp_verifiers
        .iter()
        .map(|rp| {
            rp.as_ref()
                .map(|rp| {
                    let input = PiDecInput::new(rp, &q, pk_b, &c_sum, &BigNumber::zero());
                    PiDecProof::prove(rng, &input, &secret)
                })
                .transpose()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((c_sum, dec_proofs))
}

/// Bob's response when his input is also committed as a curve point
/// `B = b·G`. In addition to the `G` variant's outputs, Bob publishes
/// `cBetaPrm = Enc_{pkB}(-β mod q)` and proves that `cBeta ⊕ cBetaPrm`
/// decrypts to `0 mod q`.
pub(crate) fn bob_responds_dl<R: RngCore + CryptoRng>(
    rng: &mut R,
    pk_a: &EncryptionKey,
    sk_b: &DecryptionKey,
    alice_proof: &PiEncProof,
    b: &BigNumber,
    c_a: &Ciphertext,
    rp_verifiers: &[Option<RingPedersen>],
    rp_bob: &RingPedersen,
    big_b: &CurvePoint,
) -> Result<BobResponseDL> {
    bob_verify(alice_proof, pk_a, c_a, rp_bob)?;
    let pk_b = sk_b.encryption_key();
    let q = k256_order();

    let beta = crate::utils::random_positive_bn(rng, &q);
    let beta_prm = (&q - &beta) % &q;
    let (masked_beta, rho_prm) = pk_a.encrypt(rng, &beta)?;
    let c_alpha = pk_a.homo_add(
        &pk_a.homo_mult(b, c_a)?,
        &pk_a.homo_mult_inv(&masked_beta)?,
    )?;
    let (c_beta, rho_beta) = pk_b.encrypt(rng, &beta)?;
    let (c_beta_prm, rho_beta_prm) = pk_b.encrypt(rng, &beta_prm)?;

    let secret = PiAffgSecret::new(b, &beta, &rho_prm, &rho_beta);
    let proofs = rp_verifiers
        .iter()
        .map(|rp| {
            rp.as_ref()
                .map(|rp| {
                    let input = PiAffgInput::new(rp, pk_a, &pk_b, c_a, &c_alpha, &c_beta, big_b);
                    PiAffgInvProof::prove(rng, &input, &secret)
                })
                .transpose()
        })
        .collect::<Result<Vec<_>>>()?;

    let (_, dec_proofs) = beta_reduction_proofs(
        rng,
        &pk_b,
        &c_beta,
        &rho_beta,
        &c_beta_prm,
        &rho_beta_prm,
        &beta,
        &beta_prm,
        rp_verifiers,
    )?;

    Ok(BobResponseDL {
        beta,
        c_alpha,
        c_beta,
        c_beta_prm,
        proofs,
        dec_proofs,
    })
}

/// Bob's response when his input arrives Paillier-encrypted under his own
/// key as `cB`. Bob recovers `(b, ρ_b)` with a full decryption and proves
/// the affine relation `cAlpha = cA^b ⊕ Enc_{pkA}(β')` with AffP, where
/// `β' = -β mod q` also appears as `cBetaPrm = Enc_{pkB}(β')`.
pub(crate) fn bob_responds_p<R: RngCore + CryptoRng>(
    rng: &mut R,
    pk_a: &EncryptionKey,
    sk_b: &DecryptionKey,
    alice_proof: &PiEncProof,
    c_b: &Ciphertext,
    c_a: &Ciphertext,
    rp_verifiers: &[Option<RingPedersen>],
    rp_bob: &RingPedersen,
) -> Result<BobResponseP> {
    bob_verify(alice_proof, pk_a, c_a, rp_bob)?;
    let pk_b = sk_b.encryption_key();
    let q = k256_order();

    let (b, rho_b) = sk_b.decrypt_full(c_b)?;

    let beta = crate::utils::random_positive_bn(rng, &q);
    let beta_prm = (&q - &beta) % &q;
    let (masked_beta_prm, rho_d) = pk_a.encrypt(rng, &beta_prm)?;
    let c_alpha = pk_a.homo_add(&pk_a.homo_mult(&b, c_a)?, &masked_beta_prm)?;
    let (c_beta, rho_beta) = pk_b.encrypt(rng, &beta)?;
    let (c_beta_prm, rho_beta_prm) = pk_b.encrypt(rng, &beta_prm)?;

    let secret = PiAffpSecret::new(&b, &beta_prm, &rho_d, &rho_b, &rho_beta_prm);
    let proofs = rp_verifiers
        .iter()
        .map(|rp| {
            rp.as_ref()
                .map(|rp| {
                    let input = PiAffpInput::new(rp, pk_a, &pk_b, c_a, &c_alpha, c_b, &c_beta_prm);
                    PiAffpProof::prove(rng, &input, &secret)
                })
                .transpose()
        })
        .collect::<Result<Vec<_>>>()?;

    let (_, dec_proofs) = beta_reduction_proofs(
        rng,
        &pk_b,
        &c_beta,
        &rho_beta,
        &c_beta_prm,
        &rho_beta_prm,
        &beta,
        &beta_prm,
        rp_verifiers,
    )?;

    Ok(BobResponseP {
        beta,
        c_alpha,
        c_beta,
        c_beta_prm,
        proofs,
        dec_proofs,
    })
}

/// Verify Bob's `DL`/`P`-variant claim that `cBeta ⊕ cBetaPrm` decrypts to
/// `0 mod q` under `pk_b`.
pub(crate) fn dec_proof_verify(
    proof: &PiDecProof,
    pk_b: &EncryptionKey,
    c_beta: &Ciphertext,
    c_beta_prm: &Ciphertext,
    rp: &RingPedersen,
) -> Result<()> {
    let q = k256_order();
    let c_sum = pk_b.homo_add(c_beta, c_beta_prm)?;
    proof.verify(&PiDecInput::new(rp, &q, pk_b, &c_sum, &BigNumber::zero()))
}

/// Alice's finalizer for the `G` variant: verify Bob's proof against her
/// own parameters, then (and only then) decrypt `cAlpha`.
pub(crate) fn alice_end_g(
    sk_a: &DecryptionKey,
    pk_b: &EncryptionKey,
    proof: &PiAffgInvProof,
    c_a: &Ciphertext,
    c_alpha: &Ciphertext,
    c_beta: &Ciphertext,
    big_b: &CurvePoint,
    rp_a: &RingPedersen,
) -> Result<BigNumber> {
    let pk_a = sk_a.encryption_key();
    let input = PiAffgInput::new(rp_a, &pk_a, pk_b, c_a, c_alpha, c_beta, big_b);
    proof.verify(&input)?;
    Ok(sk_a.decrypt(c_alpha)? % k256_order())
}

/// Alice's finalizer for the `DL` variant: both the AffG-Inv proof and the
/// Dec proof must pass before `cAlpha` is decrypted.
pub(crate) fn alice_end_dl(
    sk_a: &DecryptionKey,
    pk_b: &EncryptionKey,
    proof: &PiAffgInvProof,
    dec_proof: &PiDecProof,
    c_a: &Ciphertext,
    c_alpha: &Ciphertext,
    c_beta: &Ciphertext,
    c_beta_prm: &Ciphertext,
    big_b: &CurvePoint,
    rp_a: &RingPedersen,
) -> Result<BigNumber> {
    dec_proof_verify(dec_proof, pk_b, c_beta, c_beta_prm, rp_a)?;
    alice_end_g(sk_a, pk_b, proof, c_a, c_alpha, c_beta, big_b, rp_a)
}

/// Alice's finalizer for the `P` variant.
pub(crate) fn alice_end_p(
    sk_a: &DecryptionKey,
    pk_b: &EncryptionKey,
    proof: &PiAffpProof,
    dec_proof: &PiDecProof,
    c_a: &Ciphertext,
    c_alpha: &Ciphertext,
    c_beta: &Ciphertext,
    c_beta_prm: &Ciphertext,
    c_b: &Ciphertext,
    rp_a: &RingPedersen,
) -> Result<BigNumber> {
    let pk_a = sk_a.encryption_key();
    dec_proof_verify(dec_proof, pk_b, c_beta, c_beta_prm, rp_a)?;
    let input = PiAffpInput::new(rp_a, &pk_a, pk_b, c_a, c_alpha, c_b, c_beta_prm);
    proof.verify(&input)?;
    Ok(sk_a.decrypt(c_alpha)? % k256_order())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{get_test_rng, is_additive_inverse, is_congruent, random_positive_bn};

    struct Party {
        sk: DecryptionKey,
        pk: EncryptionKey,
        rp: RingPedersen,
    }

    fn party(rng: &mut (impl RngCore + CryptoRng)) -> Party {
        let sk = DecryptionKey::new(rng).unwrap();
        let pk = sk.encryption_key();
        let rp_sk = DecryptionKey::new(rng).unwrap();
        let rp = RingPedersen::extract(&rp_sk, rng).unwrap();
        Party { sk, pk, rp }
    }

    /// Verifier slots as the rounds use them: one per session member, with
    /// the slot for Bob himself absent.
    fn verifier_slots(alice: &Party, bob: &Party) -> Vec<Option<RingPedersen>> {
        vec![Some(alice.rp.clone()), None, Some(bob.rp.clone())]
    }

    #[test]
    fn mta_g_produces_additive_shares() -> Result<()> {
        let mut rng = get_test_rng();
        let alice = party(&mut rng);
        let bob = party(&mut rng);
        let q = k256_order();

        let a = random_positive_bn(&mut rng, &q);
        let b = random_positive_bn(&mut rng, &q);
        let rho_a = Nonce(crate::utils::random_bn_in_z_star(&mut rng, alice.pk.n())?);

        let rp_vs = verifier_slots(&alice, &bob);
        let (c_a, proofs_a) = alice_init(&mut rng, &alice.pk, &a, &rho_a, &rp_vs)?;
        assert!(proofs_a[0].is_some());
        assert!(proofs_a[1].is_none());

        // Every populated slot verifies under its own parameters.
        for (proof, rp) in proofs_a.iter().zip(rp_vs.iter()) {
            if let (Some(proof), Some(rp)) = (proof, rp) {
                bob_verify(proof, &alice.pk, &c_a, rp)?;
            }
        }

        let response = bob_responds_g(
            &mut rng,
            &alice.pk,
            &bob.sk,
            proofs_a[2].as_ref().unwrap(),
            &b,
            &c_a,
            &rp_vs,
            &bob.rp,
        )?;

        let big_b = CurvePoint::GENERATOR.multiply(&bn_to_scalar(&b)?);
        let alpha = alice_end_g(
            &alice.sk,
            &bob.pk,
            response.proofs[0].as_ref().unwrap(),
            &c_a,
            &response.c_alpha,
            &response.c_beta,
            &big_b,
            &alice.rp,
        )?;

        // alpha + beta == a * b mod q
        let lhs = (&alpha + &response.beta) % &q;
        let rhs = a.modmul(&b, &q);
        assert_eq!(lhs, rhs);
        Ok(())
    }

    #[test]
    fn mta_dl_produces_additive_shares() -> Result<()> {
        let mut rng = get_test_rng();
        let alice = party(&mut rng);
        let bob = party(&mut rng);
        let q = k256_order();

        let a = random_positive_bn(&mut rng, &q);
        let b = random_positive_bn(&mut rng, &q);
        let big_b = CurvePoint::GENERATOR.multiply(&bn_to_scalar(&b)?);
        let rho_a = Nonce(crate::utils::random_bn_in_z_star(&mut rng, alice.pk.n())?);

        let rp_vs = verifier_slots(&alice, &bob);
        let (c_a, proofs_a) = alice_init(&mut rng, &alice.pk, &a, &rho_a, &rp_vs)?;

        let response = bob_responds_dl(
            &mut rng,
            &alice.pk,
            &bob.sk,
            proofs_a[2].as_ref().unwrap(),
            &b,
            &c_a,
            &rp_vs,
            &bob.rp,
            &big_b,
        )?;

        // beta and the published beta' really are additive inverses mod q.
        let beta_prm = bob.sk.decrypt(&response.c_beta_prm)?;
        assert!(is_additive_inverse(&response.beta, &beta_prm, &q));

        for (dec_proof, rp) in response.dec_proofs.iter().zip(rp_vs.iter()) {
            if let (Some(dec_proof), Some(rp)) = (dec_proof, rp) {
                dec_proof_verify(dec_proof, &bob.pk, &response.c_beta, &response.c_beta_prm, rp)?;
            }
        }

        let alpha = alice_end_dl(
            &alice.sk,
            &bob.pk,
            response.proofs[0].as_ref().unwrap(),
            response.dec_proofs[0].as_ref().unwrap(),
            &c_a,
            &response.c_alpha,
            &response.c_beta,
            &response.c_beta_prm,
            &big_b,
            &alice.rp,
        )?;

        let lhs = (&alpha + &response.beta) % &q;
        let rhs = a.modmul(&b, &q);
        assert_eq!(lhs, rhs);
        Ok(())
    }

    #[test]
    fn mta_p_produces_additive_shares() -> Result<()> {
        let mut rng = get_test_rng();
        let alice = party(&mut rng);
        let bob = party(&mut rng);
        let q = k256_order();

        let a = random_positive_bn(&mut rng, &q);
        let b = random_positive_bn(&mut rng, &q);
        let rho_a = Nonce(crate::utils::random_bn_in_z_star(&mut rng, alice.pk.n())?);
        let (c_b, _) = bob.pk.encrypt(&mut rng, &b)?;

        let rp_vs = verifier_slots(&alice, &bob);
        let (c_a, proofs_a) = alice_init(&mut rng, &alice.pk, &a, &rho_a, &rp_vs)?;

        let response = bob_responds_p(
            &mut rng,
            &alice.pk,
            &bob.sk,
            proofs_a[2].as_ref().unwrap(),
            &c_b,
            &c_a,
            &rp_vs,
            &bob.rp,
        )?;

        let alpha = alice_end_p(
            &alice.sk,
            &bob.pk,
            response.proofs[0].as_ref().unwrap(),
            response.dec_proofs[0].as_ref().unwrap(),
            &c_a,
            &response.c_alpha,
            &response.c_beta,
            &response.c_beta_prm,
            &c_b,
            &alice.rp,
        )?;

        let lhs = (&alpha + &response.beta) % &q;
        let rhs = a.modmul(&b, &q);
        assert_eq!(lhs, rhs);
        Ok(())
    }

    #[test]
    fn dec_proof_for_trivial_identity() -> Result<()> {
        let mut rng = get_test_rng();
        let bob = party(&mut rng);
        let alice = party(&mut rng);
        let q = k256_order();

        // cBeta + cBetaPrm encrypts the integer q, which is 0 mod q.
        let beta_prm = random_positive_bn(&mut rng, &q);
        let beta = (&q - &beta_prm) % &q;
        assert!(is_congruent(
            &BigNumber::zero(),
            &((&beta + &beta_prm) % &q),
            &q
        ));

        let (c_beta, rho_beta) = bob.pk.encrypt(&mut rng, &beta)?;
        let (c_beta_prm, rho_beta_prm) = bob.pk.encrypt(&mut rng, &beta_prm)?;
        let c_zero = bob.pk.homo_add(&c_beta, &c_beta_prm)?;

        let (d_zero, rho) = bob.sk.decrypt_full(&c_zero)?;
        assert_eq!(d_zero, q);
        assert!(is_congruent(&d_zero, &BigNumber::zero(), &q));
        assert_eq!(rho.0, rho_beta.0.modmul(&rho_beta_prm.0, bob.pk.n()));

        let input = PiDecInput::new(&alice.rp, &q, &bob.pk, &c_zero, &BigNumber::zero());
        let proof = PiDecProof::prove(&mut rng, &input, &PiDecSecret::new(&q, &rho))?;
        proof.verify(&input)
    }

    #[test]
    fn bob_rejects_bad_alice_proof() -> Result<()> {
        let mut rng = get_test_rng();
        let alice = party(&mut rng);
        let bob = party(&mut rng);
        let q = k256_order();

        let a = random_positive_bn(&mut rng, &q);
        let b = random_positive_bn(&mut rng, &q);
        let rho_a = Nonce(crate::utils::random_bn_in_z_star(&mut rng, alice.pk.n())?);

        let rp_vs = verifier_slots(&alice, &bob);
        let (c_a, proofs_a) = alice_init(&mut rng, &alice.pk, &a, &rho_a, &rp_vs)?;

        // A proof targeted at Alice's parameters must not pass under Bob's.
        let wrong_target = proofs_a[0].as_ref().unwrap();
        assert!(bob_responds_g(
            &mut rng,
            &alice.pk,
            &bob.sk,
            wrong_target,
            &b,
            &c_a,
            &rp_vs,
            &bob.rp,
        )
        .is_err());
        Ok(())
    }
}
