// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Round two: verify every peer's round-one range proof, then respond to
//! each peer's `BigK` as the MtA responder, once with `γ` (the δ side) and
//! once with `w` (the σ side), and prove that `Γᵢ = γᵢ·G` matches `BigGᵢ`.
//!
//! No peer ciphertext is consumed before its range proof has been checked
//! against this party's own parameters; the per-peer work runs on one
//! worker per peer and the round aborts on the first failure.

use crate::{
    errors::{Error, ProofType, Result},
    mta::{self, BobResponseG},
    protocol::{Message, MessageType},
    sign::{
        for_each_peer,
        messages::{Round1Bcast, Round2Msg1, Round2Msg2},
        round_three::Round3,
        temp::SignTemp,
        SignContext,
    },
    utils::{bn_to_scalar, CurvePoint},
    zkp::{
        enc::PiEncProof,
        logstar::{PiLogStarInput, PiLogStarProof, PiLogStarSecret},
        proof_array_from_bytes, proof_array_to_bytes, Proof,
    },
};
use tracing::instrument;

/// Per-peer output of the parallel section.
struct PeerResponse {
    delta_side: BobResponseG,
    sigma_side: BobResponseG,
    psi_prime: PiLogStarProof,
}

pub(crate) struct Round2 {
    pub(crate) ctx: SignContext,
    pub(crate) temp: Box<SignTemp>,
    started: bool,
}

impl Round2 {
    pub(crate) fn new(ctx: SignContext, temp: Box<SignTemp>) -> Self {
        Self {
            ctx,
            temp,
            started: false,
        }
    }

    /// Pull the round-one ciphertexts out of the stored broadcasts. Proofs
    /// are checked separately; nothing here is trusted yet.
    fn unpack_round_one(&mut self) -> Result<()> {
        for j in 0..self.ctx.count() {
            if j == self.ctx.self_index() {
                continue;
            }
            let bcast = self.temp.round_one[j]
                .as_ref()
                .ok_or(Error::InternalInvariantFailed)?;
            self.temp.big_k[j] = Some(bcast.big_k.clone());
            self.temp.big_g[j] = Some(bcast.big_g.clone());
        }
        Ok(())
    }

    /// The Enc proof peer `j` aimed at this party's parameters.
    fn alice_proof(&self, j: usize) -> Result<PiEncProof> {
        let bcast: &Round1Bcast = self.temp.round_one[j]
            .as_ref()
            .ok_or(Error::InternalInvariantFailed)?;
        let proofs: Vec<Option<PiEncProof>> = proof_array_from_bytes(&bcast.psi)?;
        if proofs.len() != self.ctx.count() {
            return Err(Error::UnexpectedMessage {
                round: 2,
                from: self.ctx.peer_id(j),
            });
        }
        proofs
            .into_iter()
            .nth(self.ctx.self_index())
            .flatten()
            .ok_or(Error::ProofRejected {
                round: 2,
                proof: ProofType::Enc,
                from: self.ctx.peer_id(j),
            })
    }

    #[instrument(skip_all, err(Debug))]
    pub(crate) fn start(&mut self) -> Result<Vec<Message>> {
        if self.started {
            return Err(Error::RoundAlreadyStarted { round: 2 });
        }
        self.started = true;

        let i = self.ctx.self_index();
        self.unpack_round_one()?;

        let big_gamma_share = CurvePoint::GENERATOR.multiply(&bn_to_scalar(&self.temp.gamma)?);
        self.temp.big_gamma_share = Some(big_gamma_share);

        // Recover the randomness of our own BigG; it is the log* witness.
        let own_big_g = self.temp.big_g[i]
            .as_ref()
            .ok_or(Error::InternalInvariantFailed)?
            .clone();
        let (_, nu) = self
            .ctx
            .paillier_sk()
            .decrypt_full(&own_big_g)
            .map_err(|e| e.attribute(2, self.ctx.self_id()))?;

        let ctx = &self.ctx;
        let temp = &self.temp;
        let rp_slots = ctx.rp_slots();
        let responses = for_each_peer(ctx.count(), i, |j| -> Result<PeerResponse> {
            let mut rng = rand::rngs::OsRng;
            let from = ctx.peer_id(j);
            let alice_proof = self.alice_proof(j)?;
            let big_k_j = temp.big_k[j]
                .as_ref()
                .ok_or(Error::InternalInvariantFailed)?;

            // Respond to Alice j's BigK with our gamma (δ side) and with
            // our additive key share (σ side). Each call verifies Alice's
            // proof before touching the ciphertext.
            let delta_side = mta::bob_responds_g(
                &mut rng,
                ctx.pk(j),
                ctx.paillier_sk(),
                &alice_proof,
                &temp.gamma,
                big_k_j,
                &rp_slots,
                ctx.rp(i),
            )
            .map_err(|e| e.attribute(2, from))?;
            let sigma_side = mta::bob_responds_g(
                &mut rng,
                ctx.pk(j),
                ctx.paillier_sk(),
                &alice_proof,
                &temp.w,
                big_k_j,
                &rp_slots,
                ctx.rp(i),
            )
            .map_err(|e| e.attribute(2, from))?;

            let psi_prime = PiLogStarProof::prove(
                &mut rng,
                &PiLogStarInput::new(ctx.rp(j), ctx.pk(i), &own_big_g, &big_gamma_share),
                &PiLogStarSecret::new(&temp.gamma, &nu),
            )?;

            Ok(PeerResponse {
                delta_side,
                sigma_side,
                psi_prime,
            })
        })?;

        let mut messages = Vec::with_capacity(ctx.count());
        let mut psi_prime_slots: Vec<Option<PiLogStarProof>> =
            (0..self.ctx.count()).map(|_| None).collect();
        for (j, response) in responses.into_iter().enumerate() {
            let Some(response) = response else { continue };
            psi_prime_slots[j] = Some(response.psi_prime);

            let msg1 = Round2Msg1 {
                to: self.ctx.peer_id(j),
                big_d: response.delta_side.c_alpha,
                big_d_hat: response.sigma_side.c_alpha,
                big_f: response.delta_side.c_beta,
                big_f_hat: response.sigma_side.c_beta,
                psi: proof_array_to_bytes(&response.delta_side.proofs),
                psi_hat: proof_array_to_bytes(&response.sigma_side.proofs),
            };
            self.temp.beta[j] = response.delta_side.beta;
            self.temp.beta_hat[j] = response.sigma_side.beta;
            messages.push(msg1.to_message(self.ctx.session(), self.ctx.self_id())?);
            self.temp.round_two_msg1[i][j] = Some(msg1);
        }

        let msg2 = Round2Msg2 {
            big_gamma: big_gamma_share,
            psi_prime: proof_array_to_bytes(&psi_prime_slots),
        };
        messages.push(msg2.to_message(self.ctx.session(), self.ctx.self_id())?);
        self.temp.round_two_msg2[i] = Some(msg2);

        Ok(messages)
    }

    pub(crate) fn can_accept(&self, message: &Message) -> bool {
        matches!(
            message.message_type(),
            MessageType::SignRoundTwoMsg1 | MessageType::SignRoundTwoMsg2
        ) && message.is_broadcast()
    }

    pub(crate) fn accept(&mut self, message: &Message) -> Result<()> {
        let from = message.from();
        let j = self
            .ctx
            .position(&from)
            .filter(|_| self.can_accept(message) && from != self.ctx.self_id())
            .ok_or(Error::UnexpectedMessage { round: 2, from })?;
        match message.message_type() {
            MessageType::SignRoundTwoMsg1 => {
                let msg1 = Round2Msg1::try_from(message)?;
                let to = self
                    .ctx
                    .position(&msg1.to)
                    .ok_or(Error::UnexpectedMessage { round: 2, from })?;
                self.temp.round_two_msg1[j][to] = Some(msg1);
            }
            MessageType::SignRoundTwoMsg2 => {
                self.temp.round_two_msg2[j] = Some(Round2Msg2::try_from(message)?);
            }
            _ => return Err(Error::UnexpectedMessage { round: 2, from }),
        }
        Ok(())
    }

    pub(crate) fn update(&self) -> bool {
        let count = self.ctx.count();
        (0..count).all(|j| {
            self.temp.round_two_msg2[j].is_some()
                && (0..count)
                    .filter(|&l| l != j)
                    .all(|l| self.temp.round_two_msg1(j, l).is_some())
        })
    }

    pub(crate) fn next(self) -> Round3 {
        Round3::new(self.ctx, self.temp)
    }
}
