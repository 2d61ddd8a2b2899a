// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A party's long-lived key material: its Shamir share of the signing key,
//! the public share points of the whole committee, and the Paillier and
//! ring-Pedersen parameters of every member.
//!
//! Key generation itself is out of scope for this crate; the trusted-dealer
//! generator below produces fixtures with the same shape that a distributed
//! keygen would, and [`reshare`] moves an existing key to a fresh committee
//! without changing the joint public key.

use crate::{
    errors::{Error, Result},
    paillier::{DecryptionKey, EncryptionKey},
    protocol::ParticipantIdentifier,
    ring_pedersen::RingPedersen,
    utils::{bn_to_scalar, scalar_to_bn, CurvePoint},
};
use k256::Scalar;
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

/// The secret portion of a key share.
#[derive(Clone, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct KeySharePrivate {
    x: BigNumber,
}

impl KeySharePrivate {
    pub(crate) fn x(&self) -> &BigNumber {
        &self.x
    }
}

impl std::fmt::Debug for KeySharePrivate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySharePrivate")
            .field("x", &"[redacted]")
            .finish()
    }
}

/// Everything one party stores between key generation and signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyShare {
    participant: ParticipantIdentifier,
    threshold: usize,
    private: KeySharePrivate,
    /// `BigX_j = x_j · G` for every committee member, in committee order.
    public_shares: Vec<CurvePoint>,
    /// The joint public key `Y`.
    public_key: CurvePoint,
    paillier_sk: DecryptionKey,
    /// Every member's Paillier encryption key, in committee order.
    paillier_pks: Vec<EncryptionKey>,
    /// Every member's ring-Pedersen parameters, in committee order.
    ring_pedersen: Vec<RingPedersen>,
    /// The committee, in committee order.
    participants: Vec<ParticipantIdentifier>,
}

impl KeyShare {
    pub fn participant(&self) -> ParticipantIdentifier {
        self.participant
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// The joint public key `Y`.
    pub fn public_key(&self) -> CurvePoint {
        self.public_key
    }

    pub fn participants(&self) -> &[ParticipantIdentifier] {
        &self.participants
    }

    pub(crate) fn private(&self) -> &KeySharePrivate {
        &self.private
    }

    pub(crate) fn paillier_sk(&self) -> &DecryptionKey {
        &self.paillier_sk
    }

    pub(crate) fn paillier_pk(&self, committee_index: usize) -> Result<&EncryptionKey> {
        self.paillier_pks
            .get(committee_index)
            .ok_or(Error::InternalInvariantFailed)
    }

    pub(crate) fn ring_pedersen(&self, committee_index: usize) -> Result<&RingPedersen> {
        self.ring_pedersen
            .get(committee_index)
            .ok_or(Error::InternalInvariantFailed)
    }

    pub(crate) fn public_share(&self, committee_index: usize) -> Result<&CurvePoint> {
        self.public_shares
            .get(committee_index)
            .ok_or(Error::InternalInvariantFailed)
    }

    pub(crate) fn committee_position(&self, id: &ParticipantIdentifier) -> Result<usize> {
        self.participants
            .iter()
            .position(|p| p == id)
            .ok_or_else(|| Error::InvalidArgument("participant is not in the committee".into()))
    }
}

/// The Shamir evaluation coordinate of committee member `index`.
fn share_coordinate(index: usize) -> Scalar {
    Scalar::from((index + 1) as u64)
}

/// Evaluate a polynomial (lowest coefficient first) at `point`.
fn eval_poly(coeffs: &[Scalar], point: &Scalar) -> Scalar {
    let mut acc = Scalar::ZERO;
    for coeff in coeffs.iter().rev() {
        acc = acc * point + coeff;
    }
    acc
}

/// The Lagrange coefficient at zero for committee member `index`, over the
/// quorum given by `quorum_indices`.
pub(crate) fn lagrange_coefficient_at_zero(
    quorum_indices: &[usize],
    index: usize,
) -> Result<Scalar> {
    let x_j = share_coordinate(index);
    let mut num = Scalar::ONE;
    let mut den = Scalar::ONE;
    for &m in quorum_indices {
        if m == index {
            continue;
        }
        let x_m = share_coordinate(m);
        num *= x_m;
        den *= x_m - x_j;
    }
    let den_inv = Option::<Scalar>::from(den.invert()).ok_or(Error::CouldNotInvertScalar)?;
    Ok(num * den_inv)
}

fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    use k256::elliptic_curve::Field;
    Scalar::random(rng)
}

/// Generate per-party Paillier and ring-Pedersen parameters.
fn auxiliary_setup<R: RngCore + CryptoRng>(
    rng: &mut R,
    count: usize,
) -> Result<(Vec<DecryptionKey>, Vec<EncryptionKey>, Vec<RingPedersen>)> {
    let mut sks = Vec::with_capacity(count);
    let mut pks = Vec::with_capacity(count);
    let mut rps = Vec::with_capacity(count);
    for _ in 0..count {
        let sk = DecryptionKey::new(rng)?;
        pks.push(sk.encryption_key());
        sks.push(sk);
        let rp_sk = DecryptionKey::new(rng)?;
        rps.push(RingPedersen::extract(&rp_sk, rng)?);
    }
    Ok((sks, pks, rps))
}

fn assemble_shares(
    participants: Vec<ParticipantIdentifier>,
    threshold: usize,
    shares: &[Scalar],
    public_key: CurvePoint,
    sks: Vec<DecryptionKey>,
    pks: Vec<EncryptionKey>,
    rps: Vec<RingPedersen>,
) -> Vec<KeyShare> {
    let public_shares: Vec<CurvePoint> = shares
        .iter()
        .map(|x| CurvePoint::GENERATOR.multiply(x))
        .collect();

    sks.into_iter()
        .enumerate()
        .map(|(i, paillier_sk)| KeyShare {
            participant: participants[i],
            threshold,
            private: KeySharePrivate {
                x: scalar_to_bn(&shares[i]),
            },
            public_shares: public_shares.clone(),
            public_key,
            paillier_sk,
            paillier_pks: pks.clone(),
            ring_pedersen: rps.clone(),
            participants: participants.clone(),
        })
        .collect()
}

/// Deal a fresh `(n, t)` Shamir sharing of a random signing key, together
/// with per-party Paillier and ring-Pedersen parameters.
///
/// Any `t + 1` of the resulting shares suffice to sign. This is a trusted
/// single-process generator: it exists to bootstrap tests and fixtures, not
/// to replace a distributed keygen.
pub fn dealer_keygen<R: RngCore + CryptoRng>(
    rng: &mut R,
    count: usize,
    threshold: usize,
) -> Result<Vec<KeyShare>> {
    if count < 2 || threshold + 1 > count {
        return arg_err!("invalid committee shape");
    }

    let participants: Vec<ParticipantIdentifier> = (0..count)
        .map(|i| ParticipantIdentifier::new(i, rng))
        .collect();

    // f(0) is the signing key; each party gets f(i + 1).
    let coeffs: Vec<Scalar> = (0..=threshold).map(|_| random_scalar(rng)).collect();
    let shares: Vec<Scalar> = (0..count)
        .map(|i| eval_poly(&coeffs, &share_coordinate(i)))
        .collect();
    let public_key = CurvePoint::GENERATOR.multiply(&coeffs[0]);

    let (sks, pks, rps) = auxiliary_setup(rng, count)?;
    Ok(assemble_shares(
        participants,
        threshold,
        &shares,
        public_key,
        sks,
        pks,
        rps,
    ))
}

/// Reshare an existing key from a quorum of the old committee to a fresh
/// committee of `new_count` members with threshold `new_threshold`. The
/// joint public key is preserved; all per-party auxiliary parameters are
/// regenerated.
///
/// Like [`dealer_keygen`], this runs the resharing arithmetic in a single
/// trusted process and stands in for the distributed resharing protocol.
pub fn reshare<R: RngCore + CryptoRng>(
    rng: &mut R,
    old_shares: &[&KeyShare],
    new_count: usize,
    new_threshold: usize,
) -> Result<Vec<KeyShare>> {
    if old_shares.is_empty() {
        return arg_err!("resharing requires at least one old share");
    }
    let old_threshold = old_shares[0].threshold;
    if old_shares.len() < old_threshold + 1 {
        return arg_err!("not enough old shares to reconstruct the key");
    }
    if new_count < 2 || new_threshold + 1 > new_count {
        return arg_err!("invalid committee shape");
    }

    let quorum_indices: Vec<usize> = old_shares
        .iter()
        .map(|share| share.committee_position(&share.participant))
        .collect::<Result<_>>()?;

    // Convert the quorum's Shamir shares to an additive sharing, then have
    // each old member deal a sub-sharing of its summand to the new
    // committee.
    let mut new_share_scalars = vec![Scalar::ZERO; new_count];
    let mut reconstructed_public = CurvePoint::IDENTITY;
    for (share, &index) in old_shares.iter().zip(quorum_indices.iter()) {
        let lambda = lagrange_coefficient_at_zero(&quorum_indices, index)?;
        let additive = bn_to_scalar(share.private.x())? * lambda;
        reconstructed_public =
            reconstructed_public.add(&CurvePoint::GENERATOR.multiply(&additive));

        let mut coeffs: Vec<Scalar> = (0..=new_threshold).map(|_| random_scalar(rng)).collect();
        coeffs[0] = additive;
        for (j, acc) in new_share_scalars.iter_mut().enumerate() {
            *acc += eval_poly(&coeffs, &share_coordinate(j));
        }
    }

    if reconstructed_public != old_shares[0].public_key {
        return Err(Error::InternalInvariantFailed);
    }

    let participants: Vec<ParticipantIdentifier> = (0..new_count)
        .map(|i| ParticipantIdentifier::new(i, rng))
        .collect();
    let (sks, pks, rps) = auxiliary_setup(rng, new_count)?;
    Ok(assemble_shares(
        participants,
        new_threshold,
        &new_share_scalars,
        old_shares[0].public_key,
        sks,
        pks,
        rps,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::get_test_rng;

    /// Reconstruct the secret key from a quorum via Lagrange interpolation.
    fn reconstruct(shares: &[&KeyShare]) -> Scalar {
        let indices: Vec<usize> = shares
            .iter()
            .map(|s| s.committee_position(&s.participant).unwrap())
            .collect();
        shares
            .iter()
            .zip(indices.iter())
            .map(|(s, &i)| {
                bn_to_scalar(s.private.x()).unwrap()
                    * lagrange_coefficient_at_zero(&indices, i).unwrap()
            })
            .fold(Scalar::ZERO, |acc, x| acc + x)
    }

    #[test]
    fn dealer_keygen_is_consistent() -> Result<()> {
        let mut rng = get_test_rng();
        let shares = dealer_keygen(&mut rng, 3, 2)?;
        assert_eq!(shares.len(), 3);

        for share in &shares {
            // BigX_i = x_i · G
            let i = share.committee_position(&share.participant)?;
            let expected = CurvePoint::GENERATOR.multiply(&bn_to_scalar(share.private.x())?);
            assert_eq!(share.public_share(i)?, &expected);
            assert_eq!(share.public_key(), shares[0].public_key());
        }

        // The full quorum reconstructs the key behind Y.
        let quorum: Vec<&KeyShare> = shares.iter().collect();
        let secret = reconstruct(&quorum);
        assert_eq!(
            CurvePoint::GENERATOR.multiply(&secret),
            shares[0].public_key()
        );
        Ok(())
    }

    #[test]
    fn lagrange_coefficients_sum_shares_to_secret() -> Result<()> {
        let mut rng = get_test_rng();
        let shares = dealer_keygen(&mut rng, 4, 2)?;

        // Two different quorums of size t+1 = 3 agree on the secret.
        let q1: Vec<&KeyShare> = shares[..3].iter().collect();
        let q2: Vec<&KeyShare> = shares[1..].iter().collect();
        assert_eq!(reconstruct(&q1), reconstruct(&q2));
        Ok(())
    }

    #[test]
    fn reshare_preserves_public_key() -> Result<()> {
        let mut rng = get_test_rng();
        let old = dealer_keygen(&mut rng, 3, 2)?;
        let old_refs: Vec<&KeyShare> = old.iter().collect();
        let new = reshare(&mut rng, &old_refs, 3, 2)?;

        assert_eq!(new.len(), 3);
        assert_eq!(new[0].public_key(), old[0].public_key());

        let new_refs: Vec<&KeyShare> = new.iter().collect();
        let secret = reconstruct(&new_refs);
        assert_eq!(CurvePoint::GENERATOR.multiply(&secret), old[0].public_key());

        // The new committee has fresh identities.
        assert_ne!(new[0].participants(), old[0].participants());
        Ok(())
    }

    #[test]
    fn reshare_rejects_undersized_quorum() -> Result<()> {
        let mut rng = get_test_rng();
        let old = dealer_keygen(&mut rng, 3, 2)?;
        let too_few: Vec<&KeyShare> = old[..2].iter().collect();
        assert!(reshare(&mut rng, &too_few, 3, 2).is_err());
        Ok(())
    }
}
