// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Round three: verify the round-two proofs, recover the MtA outputs
//! `α`/`α̂` as the Alice side, and broadcast the δ share together with
//! `Δ = k·Γ` and the log* proof tying it to `BigK`.

use crate::{
    errors::{Error, Result},
    mta,
    protocol::{Message, MessageType},
    sign::{
        for_each_peer,
        messages::{Round2Msg1, Round2Msg2, Round3Bcast},
        round_four::Round4,
        temp::SignTemp,
        SignContext,
    },
    utils::{bn_to_scalar, k256_order, CurvePoint},
    zkp::{
        affg::PiAffgInvProof,
        logstar::{PiLogStarInput, PiLogStarProof, PiLogStarSecret},
        proof_array_from_bytes, proof_array_to_bytes, Proof,
    },
};
use libpaillier::unknown_order::BigNumber;
use tracing::instrument;

/// Per-peer output of the parallel section.
struct AliceOutput {
    alpha: BigNumber,
    alpha_hat: BigNumber,
}

pub(crate) struct Round3 {
    pub(crate) ctx: SignContext,
    pub(crate) temp: Box<SignTemp>,
    started: bool,
}

impl Round3 {
    pub(crate) fn new(ctx: SignContext, temp: Box<SignTemp>) -> Self {
        Self {
            ctx,
            temp,
            started: false,
        }
    }

    /// Pick this party's slot out of a peer's proof vector.
    fn own_slot<P: Proof>(
        &self,
        parts: &[Vec<u8>],
        round: u8,
        from_index: usize,
    ) -> Result<P> {
        let from = self.ctx.peer_id(from_index);
        let proofs: Vec<Option<P>> = proof_array_from_bytes(parts)?;
        if proofs.len() != self.ctx.count() {
            return Err(Error::UnexpectedMessage { round, from });
        }
        proofs
            .into_iter()
            .nth(self.ctx.self_index())
            .flatten()
            .ok_or(Error::ProofRejected {
                round,
                proof: P::TYPE,
                from,
            })
    }

    #[instrument(skip_all, err(Debug))]
    pub(crate) fn start(&mut self) -> Result<Vec<Message>> {
        if self.started {
            return Err(Error::RoundAlreadyStarted { round: 3 });
        }
        self.started = true;

        let i = self.ctx.self_index();
        let order = k256_order();

        // Γ = ΣΓ_j over the whole quorum.
        let mut big_gamma = CurvePoint::IDENTITY;
        for j in 0..self.ctx.count() {
            let gamma_j = if j == i {
                self.temp
                    .big_gamma_share
                    .ok_or(Error::InternalInvariantFailed)?
            } else {
                self.temp.round_two_msg2[j]
                    .as_ref()
                    .ok_or(Error::InternalInvariantFailed)?
                    .big_gamma
            };
            big_gamma = big_gamma.add(&gamma_j);
        }
        self.temp.big_gamma = Some(big_gamma);

        let ctx = &self.ctx;
        let temp = &self.temp;
        let outputs = for_each_peer(ctx.count(), i, |j| -> Result<AliceOutput> {
            let from = ctx.peer_id(j);
            let msg2: &Round2Msg2 = temp.round_two_msg2[j]
                .as_ref()
                .ok_or(Error::InternalInvariantFailed)?;
            let msg1: &Round2Msg1 = temp
                .round_two_msg1(j, i)
                .ok_or(Error::InternalInvariantFailed)?;
            let big_g_j = temp.big_g[j]
                .as_ref()
                .ok_or(Error::InternalInvariantFailed)?;
            let big_k_i = temp.big_k[i]
                .as_ref()
                .ok_or(Error::InternalInvariantFailed)?;

            // Γ_j really is the discrete log hidden in BigG_j.
            let psi_prime: PiLogStarProof = self.own_slot(&msg2.psi_prime, 3, j)?;
            psi_prime
                .verify(&PiLogStarInput::new(
                    ctx.rp(i),
                    ctx.pk(j),
                    big_g_j,
                    &msg2.big_gamma,
                ))
                .map_err(|e| e.attribute(3, from))?;

            // Both affine responses verify before anything is decrypted;
            // alice_end_g rejects, then decrypts.
            let psi: PiAffgInvProof = self.own_slot(&msg1.psi, 3, j)?;
            let alpha = mta::alice_end_g(
                ctx.paillier_sk(),
                ctx.pk(j),
                &psi,
                big_k_i,
                &msg1.big_d,
                &msg1.big_f,
                &msg2.big_gamma,
                ctx.rp(i),
            )
            .map_err(|e| e.attribute(3, from))?;

            let psi_hat: PiAffgInvProof = self.own_slot(&msg1.psi_hat, 3, j)?;
            let alpha_hat = mta::alice_end_g(
                ctx.paillier_sk(),
                ctx.pk(j),
                &psi_hat,
                big_k_i,
                &msg1.big_d_hat,
                &msg1.big_f_hat,
                ctx.big_w(j),
                ctx.rp(i),
            )
            .map_err(|e| e.attribute(3, from))?;

            Ok(AliceOutput { alpha, alpha_hat })
        })?;

        // δ_i = γk + Σ(α + β) and σ_i = wk + Σ(α̂ + β̂), all mod q.
        let mut delta = self.temp.gamma.modmul(&self.temp.k, &order);
        let mut sigma = self.temp.w.modmul(&self.temp.k, &order);
        for (j, output) in outputs.into_iter().enumerate() {
            let Some(output) = output else { continue };
            delta = delta
                .modadd(&output.alpha, &order)
                .modadd(&self.temp.beta[j], &order);
            sigma = sigma
                .modadd(&output.alpha_hat, &order)
                .modadd(&self.temp.beta_hat[j], &order);
            self.temp.alpha[j] = output.alpha;
            self.temp.alpha_hat[j] = output.alpha_hat;
        }
        let delta_scalar = bn_to_scalar(&delta)?;
        self.temp.delta_share = Some(delta_scalar);
        self.temp.sigma = sigma;

        let big_delta = big_gamma.multiply(&bn_to_scalar(&self.temp.k)?);
        self.temp.big_delta = Some(big_delta);

        // Tie Δ_i to BigK_i under every peer's parameters, with Γ as the
        // auxiliary base.
        let big_k_i = self.temp.big_k[i]
            .as_ref()
            .ok_or(Error::InternalInvariantFailed)?
            .clone();
        let mut psi_slots: Vec<Option<PiLogStarProof>> =
            (0..self.ctx.count()).map(|_| None).collect();
        let mut rng = rand::rngs::OsRng;
        for j in (0..self.ctx.count()).filter(|&j| j != i) {
            let input = PiLogStarInput::new_with_base(
                self.ctx.rp(j),
                self.ctx.pk(i),
                &big_k_i,
                &big_delta,
                &big_gamma,
            );
            psi_slots[j] = Some(PiLogStarProof::prove(
                &mut rng,
                &input,
                &PiLogStarSecret::new(&self.temp.k, &self.temp.rho),
            )?);
        }

        let bcast = Round3Bcast {
            delta: delta_scalar,
            big_delta,
            psi_double_prime: proof_array_to_bytes(&psi_slots),
        };
        let message = bcast.to_message(self.ctx.session(), self.ctx.self_id())?;
        self.temp.round_three[i] = Some(bcast);
        Ok(vec![message])
    }

    pub(crate) fn can_accept(&self, message: &Message) -> bool {
        message.message_type() == MessageType::SignRoundThree && message.is_broadcast()
    }

    pub(crate) fn accept(&mut self, message: &Message) -> Result<()> {
        let from = message.from();
        let j = self
            .ctx
            .position(&from)
            .filter(|_| self.can_accept(message) && from != self.ctx.self_id())
            .ok_or(Error::UnexpectedMessage { round: 3, from })?;
        self.temp.round_three[j] = Some(Round3Bcast::try_from(message)?);
        Ok(())
    }

    pub(crate) fn update(&self) -> bool {
        self.temp.round_three.iter().all(Option::is_some)
    }

    pub(crate) fn next(self) -> Round4 {
        Round4::new(self.ctx, self.temp)
    }
}
