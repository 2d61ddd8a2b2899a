// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Round five: check that every peer derived the same `r` and that every δ
//! share matches its publicly recomputable ciphertext, then publish this
//! party's signature share with the σ-side accountability material.

use crate::{
    errors::{Error, Result},
    protocol::{Message, MessageType},
    sign::{
        delta_ciphertext, for_each_peer,
        messages::{Round4Bcast, Round5Bcast},
        finalization::Finalization,
        s_share_ciphertext, sigma_ciphertext,
        temp::SignTemp,
        SignContext,
    },
    utils::{k256_order, scalar_to_bn},
    zkp::{
        dec::{PiDecInput, PiDecProof, PiDecSecret},
        mul::PiMulInput,
        mulstar::{PiMulStarInput, PiMulStarProof, PiMulStarSecret},
        proof_array_from_bytes, proof_array_to_bytes, Proof,
    },
};
use tracing::instrument;

pub(crate) struct Round5 {
    pub(crate) ctx: SignContext,
    pub(crate) temp: Box<SignTemp>,
    started: bool,
}

impl Round5 {
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
            return Err(Error::RoundAlreadyStarted { round: 5 });
        }
        self.started = true;

        let i = self.ctx.self_index();
        let r = self.temp.r.ok_or(Error::InternalInvariantFailed)?;
        let q = k256_order();

        let ctx = &self.ctx;
        let temp = &self.temp;
        for_each_peer(ctx.count(), i, |j| -> Result<()> {
            let from = ctx.peer_id(j);
            let bcast: &Round4Bcast = temp.round_four[j]
                .as_ref()
                .ok_or(Error::InternalInvariantFailed)?;

            if bcast.r != r {
                return Err(Error::ProtocolAborted {
                    cause: "inconsistent signature r value".into(),
                    from: Some(from),
                });
            }

            let big_k_j = temp.big_k[j]
                .as_ref()
                .ok_or(Error::InternalInvariantFailed)?;
            let big_g_j = temp.big_g[j]
                .as_ref()
                .ok_or(Error::InternalInvariantFailed)?;

            // H_j really multiplies the plaintexts of BigK_j and BigG_j.
            bcast
                .mul_proof
                .verify(&PiMulInput::new(
                    ctx.pk(j),
                    big_k_j,
                    big_g_j,
                    &bcast.big_h,
                ))
                .map_err(|e| e.attribute(5, from))?;

            // The broadcast δ_j is the decryption of a ciphertext anyone
            // can assemble from the round-two matrices.
            let delta_j = temp.round_three[j]
                .as_ref()
                .ok_or(Error::InternalInvariantFailed)?
                .delta;
            let c_delta_j = delta_ciphertext(ctx, temp, j, &bcast.big_h)?;
            let dec_proofs: Vec<Option<PiDecProof>> = proof_array_from_bytes(&bcast.dec_delta)?;
            let dec = dec_proofs
                .into_iter()
                .nth(i)
                .flatten()
                .ok_or(Error::ProofRejected {
                    round: 5,
                    proof: PiDecProof::TYPE,
                    from,
                })?;
            dec.verify(&PiDecInput::new(
                ctx.rp(i),
                &k256_order(),
                ctx.pk(j),
                &c_delta_j,
                &scalar_to_bn(&delta_j),
            ))
            .map_err(|e| e.attribute(5, from))
        })?;

        // σ-side accountability for our own signature share.
        let mut rng = rand::rngs::OsRng;
        let big_k_i = self.temp.big_k[i]
            .as_ref()
            .ok_or(Error::InternalInvariantFailed)?
            .clone();
        let pk = self.ctx.pk(i).clone();
        let (big_h_hat, rho_hat) =
            pk.homo_mult_with_randomness(&mut rng, &self.temp.w, &big_k_i)?;

        let mulstar_secret = PiMulStarSecret::new(&self.temp.w, &rho_hat);
        let mut mulstar_slots: Vec<Option<PiMulStarProof>> =
            (0..self.ctx.count()).map(|_| None).collect();
        for j in (0..self.ctx.count()).filter(|&j| j != i) {
            let input = PiMulStarInput::new(
                self.ctx.rp(j),
                &pk,
                &big_k_i,
                &big_h_hat,
                self.ctx.big_w(i),
            );
            mulstar_slots[j] = Some(PiMulStarProof::prove(&mut rng, &input, &mulstar_secret)?);
        }

        let c_sigma = sigma_ciphertext(&self.ctx, &self.temp, i, &big_h_hat)?;
        let c_s = s_share_ciphertext(&self.ctx, i, &big_k_i, &c_sigma, &r)?;
        let (y, rho_y) = self
            .ctx
            .paillier_sk()
            .decrypt_full(&c_s)
            .map_err(|e| e.attribute(5, self.ctx.self_id()))?;
        let s_share = self.temp.s_share.ok_or(Error::InternalInvariantFailed)?;
        if &y % &q != scalar_to_bn(&s_share) {
            return Err(Error::InternalInvariantFailed);
        }

        let dec_secret = PiDecSecret::new(&y, &rho_y);
        let x = scalar_to_bn(&s_share);
        let mut dec_slots: Vec<Option<PiDecProof>> =
            (0..self.ctx.count()).map(|_| None).collect();
        for j in (0..self.ctx.count()).filter(|&j| j != i) {
            let input = PiDecInput::new(self.ctx.rp(j), &q, &pk, &c_s, &x);
            dec_slots[j] = Some(PiDecProof::prove(&mut rng, &input, &dec_secret)?);
        }

        let bcast = Round5Bcast {
            s_share,
            big_h_hat,
            mul_star: proof_array_to_bytes(&mulstar_slots),
            dec_s: proof_array_to_bytes(&dec_slots),
        };
        let message = bcast.to_message(self.ctx.session(), self.ctx.self_id())?;
        self.temp.round_five[i] = Some(bcast);
        Ok(vec![message])
    }

    pub(crate) fn can_accept(&self, message: &Message) -> bool {
        message.message_type() == MessageType::SignRoundFive && message.is_broadcast()
    }

    pub(crate) fn accept(&mut self, message: &Message) -> Result<()> {
        let from = message.from();
        let j = self
            .ctx
            .position(&from)
            .filter(|_| self.can_accept(message) && from != self.ctx.self_id())
            .ok_or(Error::UnexpectedMessage { round: 5, from })?;
        self.temp.round_five[j] = Some(Round5Bcast::try_from(message)?);
        Ok(())
    }

    pub(crate) fn update(&self) -> bool {
        self.temp.round_five.iter().all(Option::is_some)
    }

    pub(crate) fn next(self) -> Finalization {
        Finalization::new(self.ctx, self.temp)
    }
}
