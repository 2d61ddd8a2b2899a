// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The distributed signing protocol: a six-round state machine that drives
//! each party from its stored key share to a valid `(r, s)` pair.
//!
//! Rounds form an owning chain (`Round1 → ... → Finalization`); each round
//! consumes its predecessor and takes ownership of the shared scratch area.
//! [`session::SignSession`] wraps the current round and is the public entry
//! point.

pub(crate) mod finalization;
pub(crate) mod messages;
pub(crate) mod round_five;
pub(crate) mod round_four;
pub(crate) mod round_one;
pub(crate) mod round_three;
pub(crate) mod round_two;
pub(crate) mod session;
pub(crate) mod temp;

pub use session::SignSession;

use crate::{
    errors::{Error, Result},
    keyshare::{lagrange_coefficient_at_zero, KeyShare},
    paillier::{Ciphertext, DecryptionKey, EncryptionKey},
    protocol::{Identifier, Parameters, ParticipantIdentifier, PeerContext},
    ring_pedersen::RingPedersen,
    utils::{bn_to_scalar, scalar_to_bn, CurvePoint},
};
use k256::elliptic_curve::IsHigh;
use k256::Scalar;
use serde::{Deserialize, Serialize};
use temp::SignTemp;

/// Immutable per-session data shared by every round: the quorum, this
/// party's key material reindexed into session order, and the message to
/// sign.
#[derive(Debug, Clone)]
pub(crate) struct SignContext {
    params: Parameters,
    session: Identifier,
    /// This party's session-local index.
    i: usize,
    /// The message digest being signed, as a scalar.
    m: Scalar,
    /// The raw message bytes (may be empty when signing a bare scalar).
    message: Vec<u8>,
    paillier_sk: DecryptionKey,
    /// Quorum members' Paillier keys, in session order.
    paillier_pks: Vec<EncryptionKey>,
    /// Quorum members' ring-Pedersen parameters, in session order.
    ring_pedersen: Vec<RingPedersen>,
    /// The joint public key `Y`.
    public_key: CurvePoint,
    /// `W_j = λ_j · BigX_j` for each quorum member, in session order.
    big_w: Vec<CurvePoint>,
}

impl SignContext {
    pub(crate) fn new(
        key_share: &KeyShare,
        quorum: &[ParticipantIdentifier],
        session: Identifier,
        m: Scalar,
        message: Vec<u8>,
    ) -> Result<(Self, Box<SignTemp>)> {
        let peers = PeerContext::new(quorum.to_vec())?;
        let params = Parameters::new(peers, key_share.participant(), key_share.threshold())?;
        let i = params.self_index();
        let count = params.count();

        // Map the session ordering onto committee positions so the Shamir
        // shares can be converted to an additive sharing over this quorum.
        let committee_indices: Vec<usize> = params
            .peers()
            .participants()
            .iter()
            .map(|id| key_share.committee_position(id))
            .collect::<Result<_>>()?;

        let mut paillier_pks = Vec::with_capacity(count);
        let mut ring_pedersen = Vec::with_capacity(count);
        let mut big_w = Vec::with_capacity(count);
        for &committee_index in committee_indices.iter() {
            paillier_pks.push(key_share.paillier_pk(committee_index)?.clone());
            ring_pedersen.push(key_share.ring_pedersen(committee_index)?.clone());
            let lambda = lagrange_coefficient_at_zero(&committee_indices, committee_index)?;
            big_w.push(key_share.public_share(committee_index)?.multiply(&lambda));
        }

        let lambda_i = lagrange_coefficient_at_zero(&committee_indices, committee_indices[i])?;
        let w = scalar_to_bn(&(bn_to_scalar(key_share.private().x())? * lambda_i));

        let ctx = Self {
            params,
            session,
            i,
            m,
            message,
            paillier_sk: key_share.paillier_sk().clone(),
            paillier_pks,
            ring_pedersen,
            public_key: key_share.public_key(),
            big_w,
        };
        let temp = Box::new(SignTemp::new(count, w));
        Ok((ctx, temp))
    }

    pub(crate) fn count(&self) -> usize {
        self.params.count()
    }

    pub(crate) fn self_index(&self) -> usize {
        self.i
    }

    pub(crate) fn session(&self) -> Identifier {
        self.session
    }

    pub(crate) fn self_id(&self) -> ParticipantIdentifier {
        self.params.self_id()
    }

    pub(crate) fn peer_id(&self, j: usize) -> ParticipantIdentifier {
        self.params.peers().participants()[j]
    }

    pub(crate) fn position(&self, id: &ParticipantIdentifier) -> Option<usize> {
        self.params.peers().position(id)
    }

    pub(crate) fn m(&self) -> &Scalar {
        &self.m
    }

    pub(crate) fn message(&self) -> &[u8] {
        &self.message
    }

    pub(crate) fn paillier_sk(&self) -> &DecryptionKey {
        &self.paillier_sk
    }

    pub(crate) fn pk(&self, j: usize) -> &EncryptionKey {
        &self.paillier_pks[j]
    }

    pub(crate) fn rp(&self, j: usize) -> &RingPedersen {
        &self.ring_pedersen[j]
    }

    pub(crate) fn public_key(&self) -> &CurvePoint {
        &self.public_key
    }

    pub(crate) fn big_w(&self, j: usize) -> &CurvePoint {
        &self.big_w[j]
    }

    /// Verifier parameter slots for per-peer proof vectors: one entry per
    /// quorum member, with this party's own slot absent.
    pub(crate) fn rp_slots(&self) -> Vec<Option<RingPedersen>> {
        self.ring_pedersen
            .iter()
            .enumerate()
            .map(|(j, rp)| (j != self.i).then(|| rp.clone()))
            .collect()
    }
}

/// Fan out one worker per peer and join before returning. Results come back
/// indexed by peer; the first failure (in peer order) poisons the round.
/// Failures travel through a bounded channel, one slot per worker.
pub(crate) fn for_each_peer<T, F>(count: usize, self_index: usize, f: F) -> Result<Vec<Option<T>>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Sync,
{
    let mut collected: Vec<(usize, Result<T>)> = std::thread::scope(|scope| {
        let (tx, rx) = std::sync::mpsc::sync_channel(count);
        for j in (0..count).filter(|&j| j != self_index) {
            let tx = tx.clone();
            let f = &f;
            scope.spawn(move || {
                // The channel has one slot per worker, so this cannot block.
                let _ = tx.send((j, f(j)));
            });
        }
        drop(tx);
        rx.iter().collect()
    });
    collected.sort_by_key(|(j, _)| *j);

    let mut results: Vec<Option<T>> = (0..count).map(|_| None).collect();
    for (j, result) in collected {
        results[j] = Some(result?);
    }
    Ok(results)
}

/// The publicly recomputable ciphertext under party `j`'s Paillier key
/// whose plaintext is (an integer congruent to) `δ_j`:
/// `H_j ⊕ ⊕_{l≠j} (D_{l→j} ⊕ F_{j→l})`.
pub(crate) fn delta_ciphertext(
    ctx: &SignContext,
    temp: &SignTemp,
    j: usize,
    big_h: &Ciphertext,
) -> Result<Ciphertext> {
    let pk = ctx.pk(j);
    let mut acc = big_h.clone();
    for l in (0..ctx.count()).filter(|&l| l != j) {
        let to_j = temp
            .round_two_msg1(l, j)
            .ok_or(Error::InternalInvariantFailed)?;
        let from_j = temp
            .round_two_msg1(j, l)
            .ok_or(Error::InternalInvariantFailed)?;
        acc = pk.homo_add(&acc, &to_j.big_d)?;
        acc = pk.homo_add(&acc, &from_j.big_f)?;
    }
    Ok(acc)
}

/// As [`delta_ciphertext`], but over the σ-side (`D̂`/`F̂`) matrices.
pub(crate) fn sigma_ciphertext(
    ctx: &SignContext,
    temp: &SignTemp,
    j: usize,
    big_h_hat: &Ciphertext,
) -> Result<Ciphertext> {
    let pk = ctx.pk(j);
    let mut acc = big_h_hat.clone();
    for l in (0..ctx.count()).filter(|&l| l != j) {
        let to_j = temp
            .round_two_msg1(l, j)
            .ok_or(Error::InternalInvariantFailed)?;
        let from_j = temp
            .round_two_msg1(j, l)
            .ok_or(Error::InternalInvariantFailed)?;
        acc = pk.homo_add(&acc, &to_j.big_d_hat)?;
        acc = pk.homo_add(&acc, &from_j.big_f_hat)?;
    }
    Ok(acc)
}

/// The publicly recomputable ciphertext under party `j`'s key whose
/// plaintext is congruent to `s_j = m·k_j + r·σ_j`:
/// `BigK_j^m ⊕ C_σj^r`.
pub(crate) fn s_share_ciphertext(
    ctx: &SignContext,
    j: usize,
    big_k: &Ciphertext,
    c_sigma: &Ciphertext,
    r: &Scalar,
) -> Result<Ciphertext> {
    let pk = ctx.pk(j);
    let m = scalar_to_bn(ctx.m());
    let r = scalar_to_bn(r);
    pk.homo_add(&pk.homo_mult(&m, big_k)?, &pk.homo_mult(&r, c_sigma)?)
}

/// Final output of a signing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureData {
    r: Scalar,
    s: Scalar,
    /// Recovery id: bit 0 is the parity of `R.y`, toggled by low-s
    /// normalization.
    recovery_id: u8,
    /// The signed digest, as a scalar.
    m: Scalar,
    /// The raw message bytes (may be empty when signing a bare scalar).
    message: Vec<u8>,
}

impl SignatureData {
    pub(crate) fn new(r: Scalar, s: Scalar, recovery_id: u8, m: Scalar, message: Vec<u8>) -> Self {
        Self {
            r,
            s,
            recovery_id,
            m,
            message,
        }
    }

    pub fn r(&self) -> &Scalar {
        &self.r
    }

    pub fn s(&self) -> &Scalar {
        &self.s
    }

    pub fn recovery_id(&self) -> u8 {
        self.recovery_id
    }

    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// The signature in `k256` form.
    pub fn signature(&self) -> Result<k256::ecdsa::Signature> {
        k256::ecdsa::Signature::from_scalars(self.r, self.s)
            .map_err(|_| Error::SignatureVerificationFailed)
    }

    /// Check the ECDSA verification equation against `public_key` directly
    /// on scalars, without re-hashing the message.
    pub fn verify(&self, public_key: &CurvePoint) -> Result<()> {
        if self.r == Scalar::ZERO || self.s == Scalar::ZERO {
            return Err(Error::SignatureVerificationFailed);
        }
        let s_inv = Option::<Scalar>::from(self.s.invert())
            .ok_or(Error::SignatureVerificationFailed)?;
        let u1 = self.m * s_inv;
        let u2 = self.r * s_inv;
        let big_r = CurvePoint::GENERATOR
            .multiply(&u1)
            .add(&public_key.multiply(&u2));
        if big_r == CurvePoint::IDENTITY {
            return Err(Error::SignatureVerificationFailed);
        }
        if big_r.x_projection()? != self.r {
            return Err(Error::SignatureVerificationFailed);
        }
        Ok(())
    }

    /// True if `s` is in the lower half of the scalar range.
    pub fn is_low_s(&self) -> bool {
        !bool::from(self.s.is_high())
    }
}
