// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Round four: verify the δ-share proofs, reconstruct `δ`, check it against
//! `ΣΔⱼ`, derive `R` and `r`, compute the signature share, and publish the
//! accountability material that lets every peer recheck this party's δ
//! share against public ciphertexts.

use crate::{
    errors::{Error, Result},
    protocol::{Message, MessageType},
    sign::{
        delta_ciphertext, for_each_peer,
        messages::{Round3Bcast, Round4Bcast},
        round_five::Round5,
        temp::SignTemp,
        SignContext,
    },
    utils::{bn_to_scalar, k256_order, scalar_to_bn, CurvePoint},
    zkp::{
        dec::{PiDecInput, PiDecProof, PiDecSecret},
        logstar::{PiLogStarInput, PiLogStarProof},
        mul::{PiMulInput, PiMulProof, PiMulSecret},
        proof_array_from_bytes, proof_array_to_bytes, Proof,
    },
};
use k256::Scalar;
use tracing::instrument;

pub(crate) struct Round4 {
    pub(crate) ctx: SignContext,
    pub(crate) temp: Box<SignTemp>,
    started: bool,
}

impl Round4 {
    pub(crate) fn new(ctx: SignContext, temp: Box<SignTemp>) -> Self {
        Self {
            ctx,
            temp,
            started: false,
        }
    }

    #[instrument(skip_all, err(Debug))]
    pub(crate) fn start(&mut self) -> Result<Vec<Message>> {
        if self.started {
            return Err(Error::RoundAlreadyStarted { round: 4 });
        }
        self.started = true;

        let i = self.ctx.self_index();
        let big_gamma = self
            .temp
            .big_gamma
            .ok_or(Error::InternalInvariantFailed)?;

        let ctx = &self.ctx;
        let temp = &self.temp;
        for_each_peer(ctx.count(), i, |j| -> Result<()> {
            let from = ctx.peer_id(j);
            let bcast: &Round3Bcast = temp.round_three[j]
                .as_ref()
                .ok_or(Error::InternalInvariantFailed)?;
            let big_k_j = temp.big_k[j]
                .as_ref()
                .ok_or(Error::InternalInvariantFailed)?;

            let proofs: Vec<Option<PiLogStarProof>> =
                proof_array_from_bytes(&bcast.psi_double_prime)?;
            let psi = proofs
                .into_iter()
                .nth(i)
                .flatten()
                .ok_or(Error::ProofRejected {
                    round: 4,
                    proof: PiLogStarProof::TYPE,
                    from,
                })?;
            psi.verify(&PiLogStarInput::new_with_base(
                ctx.rp(i),
                ctx.pk(j),
                big_k_j,
                &bcast.big_delta,
                &big_gamma,
            ))
            .map_err(|e| e.attribute(4, from))
        })?;

        // δ = Σδ_j must match ΣΔ_j on the curve; a mismatch means some
        // party lied about its share and the Dec proofs will name it.
        let mut delta = Scalar::ZERO;
        let mut big_delta_sum = CurvePoint::IDENTITY;
        for j in 0..self.ctx.count() {
            let (delta_j, big_delta_j) = if j == i {
                (
                    self.temp.delta_share.ok_or(Error::InternalInvariantFailed)?,
                    self.temp.big_delta.ok_or(Error::InternalInvariantFailed)?,
                )
            } else {
                let bcast = self.temp.round_three[j]
                    .as_ref()
                    .ok_or(Error::InternalInvariantFailed)?;
                (bcast.delta, bcast.big_delta)
            };
            delta += delta_j;
            big_delta_sum = big_delta_sum.add(&big_delta_j);
        }
        if CurvePoint::GENERATOR.multiply(&delta) != big_delta_sum {
            return Err(Error::ProtocolAborted {
                cause: "delta consistency check failed".into(),
                from: None,
            });
        }
        self.temp.delta = Some(delta);

        let delta_inv =
            Option::<Scalar>::from(delta.invert()).ok_or(Error::CouldNotInvertScalar)?;
        let big_r = big_gamma.multiply(&delta_inv);
        let r = big_r.x_projection()?;
        self.temp.big_r = Some(big_r);
        self.temp.r = Some(r);

        // s_i = m·k + r·σ mod q.
        let k_scalar = bn_to_scalar(&self.temp.k)?;
        let sigma_scalar = bn_to_scalar(&self.temp.sigma)?;
        let s_share = *self.ctx.m() * k_scalar + r * sigma_scalar;
        self.temp.s_share = Some(s_share);

        // Make our δ share publicly checkable: H = Enc(kγ) with a Mul
        // proof, and Dec proofs over the combined ciphertext.
        let mut rng = rand::rngs::OsRng;
        let big_k_i = self.temp.big_k[i]
            .as_ref()
            .ok_or(Error::InternalInvariantFailed)?
            .clone();
        let big_g_i = self.temp.big_g[i]
            .as_ref()
            .ok_or(Error::InternalInvariantFailed)?
            .clone();
        let pk = self.ctx.pk(i).clone();
        let (big_h, rho_h) = pk.homo_mult_with_randomness(&mut rng, &self.temp.k, &big_g_i)?;
        let mul_proof = PiMulProof::prove(
            &mut rng,
            &PiMulInput::new(&pk, &big_k_i, &big_g_i, &big_h),
            &PiMulSecret::new(&self.temp.k, &rho_h, &self.temp.rho),
        )?;

        let c_delta = delta_ciphertext(&self.ctx, &self.temp, i, &big_h)?;
        let (y, rho_y) = self
            .ctx
            .paillier_sk()
            .decrypt_full(&c_delta)
            .map_err(|e| e.attribute(4, self.ctx.self_id()))?;
        let delta_share = self.temp.delta_share.ok_or(Error::InternalInvariantFailed)?;
        let q = k256_order();
        if &y % &q != scalar_to_bn(&delta_share) {
            return Err(Error::InternalInvariantFailed);
        }

        let dec_secret = PiDecSecret::new(&y, &rho_y);
        let x = scalar_to_bn(&delta_share);
        let mut dec_slots: Vec<Option<PiDecProof>> =
            (0..self.ctx.count()).map(|_| None).collect();
        for j in (0..self.ctx.count()).filter(|&j| j != i) {
            let input = PiDecInput::new(self.ctx.rp(j), &q, &pk, &c_delta, &x);
            dec_slots[j] = Some(PiDecProof::prove(&mut rng, &input, &dec_secret)?);
        }

        let bcast = Round4Bcast {
            r,
            big_h,
            mul_proof,
            dec_delta: proof_array_to_bytes(&dec_slots),
        };
        let message = bcast.to_message(self.ctx.session(), self.ctx.self_id())?;
        self.temp.round_four[i] = Some(bcast);
        Ok(vec![message])
    }

    pub(crate) fn can_accept(&self, message: &Message) -> bool {
        message.message_type() == MessageType::SignRoundFour && message.is_broadcast()
    }

    pub(crate) fn accept(&mut self, message: &Message) -> Result<()> {
        let from = message.from();
        let j = self
            .ctx
            .position(&from)
            .filter(|_| self.can_accept(message) && from != self.ctx.self_id())
            .ok_or(Error::UnexpectedMessage { round: 4, from })?;
        self.temp.round_four[j] = Some(Round4Bcast::try_from(message)?);
        Ok(())
    }

    pub(crate) fn update(&self) -> bool {
        self.temp.round_four.iter().all(Option::is_some)
    }

    pub(crate) fn next(self) -> Round5 {
        Round5::new(self.ctx, self.temp)
    }
}
