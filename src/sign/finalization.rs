// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Finalization: verify every peer's signature-share accountability
//! material, assemble `s = Σsⱼ`, normalize to low-s form, and check the
//! final `(r, s)` pair under the joint public key before emitting it.

use crate::{
    errors::{Error, Result},
    protocol::{Message, MessageType},
    sign::{
        for_each_peer,
        messages::{FinalizationAck, Round5Bcast},
        s_share_ciphertext, sigma_ciphertext,
        temp::SignTemp,
        SignContext, SignatureData,
    },
    utils::{k256_order, scalar_to_bn},
    zkp::{
        dec::{PiDecInput, PiDecProof},
        mulstar::{PiMulStarInput, PiMulStarProof},
        proof_array_from_bytes, Proof,
    },
};
use k256::elliptic_curve::IsHigh;
use tracing::{error, instrument};

pub(crate) struct Finalization {
    pub(crate) ctx: SignContext,
    pub(crate) temp: Box<SignTemp>,
    started: bool,
    signature: Option<SignatureData>,
}

impl Finalization {
    pub(crate) fn new(ctx: SignContext, temp: Box<SignTemp>) -> Self {
        Self {
            ctx,
            temp,
            started: false,
            signature: None,
        }
    }

    #[instrument(skip_all, err(Debug))]
    pub(crate) fn start(&mut self) -> Result<Vec<Message>> {
        if self.started {
            return Err(Error::RoundAlreadyStarted { round: 6 });
        }
        self.started = true;

        let i = self.ctx.self_index();
        let r = self.temp.r.ok_or(Error::InternalInvariantFailed)?;
        let q = k256_order();

        let ctx = &self.ctx;
        let temp = &self.temp;
        for_each_peer(ctx.count(), i, |j| -> Result<()> {
            let from = ctx.peer_id(j);
            let bcast: &Round5Bcast = temp.round_five[j]
                .as_ref()
                .ok_or(Error::InternalInvariantFailed)?;
            let big_k_j = temp.big_k[j]
                .as_ref()
                .ok_or(Error::InternalInvariantFailed)?;

            // Ĥ_j is BigK_j raised to the discrete log of W_j.
            let mulstar_proofs: Vec<Option<PiMulStarProof>> =
                proof_array_from_bytes(&bcast.mul_star)?;
            let mulstar = mulstar_proofs
                .into_iter()
                .nth(i)
                .flatten()
                .ok_or(Error::ProofRejected {
                    round: 6,
                    proof: PiMulStarProof::TYPE,
                    from,
                })?;
            mulstar
                .verify(&PiMulStarInput::new(
                    ctx.rp(i),
                    ctx.pk(j),
                    big_k_j,
                    &bcast.big_h_hat,
                    ctx.big_w(j),
                ))
                .map_err(|e| e.attribute(6, from))?;

            // s_j is the decryption of m·BigK_j + r·C_σj.
            let c_sigma_j = sigma_ciphertext(ctx, temp, j, &bcast.big_h_hat)?;
            let c_s_j = s_share_ciphertext(ctx, j, big_k_j, &c_sigma_j, &r)?;
            let dec_proofs: Vec<Option<PiDecProof>> = proof_array_from_bytes(&bcast.dec_s)?;
            let dec = dec_proofs
                .into_iter()
                .nth(i)
                .flatten()
                .ok_or(Error::ProofRejected {
                    round: 6,
                    proof: PiDecProof::TYPE,
                    from,
                })?;
            dec.verify(&PiDecInput::new(
                ctx.rp(i),
                &q,
                ctx.pk(j),
                &c_s_j,
                &scalar_to_bn(&bcast.s_share),
            ))
            .map_err(|e| e.attribute(6, from))
        })?;

        let mut s = self.temp.s_share.ok_or(Error::InternalInvariantFailed)?;
        for j in (0..self.ctx.count()).filter(|&j| j != i) {
            s += self.temp.round_five[j]
                .as_ref()
                .ok_or(Error::InternalInvariantFailed)?
                .s_share;
        }

        let big_r = self.temp.big_r.ok_or(Error::InternalInvariantFailed)?;
        let mut recovery_id = u8::from(big_r.y_is_odd());
        if bool::from(s.is_high()) {
            s = s.negate();
            recovery_id ^= 1;
        }

        let signature = SignatureData::new(
            r,
            s,
            recovery_id,
            *self.ctx.m(),
            self.ctx.message().to_vec(),
        );
        if let Err(e) = signature.verify(self.ctx.public_key()) {
            error!("aggregate signature failed to verify under the joint public key");
            return Err(e);
        }
        self.signature = Some(signature);
        self.temp.finalization_acks[i] = true;

        let ack = FinalizationAck {};
        Ok(vec![ack.to_message(self.ctx.session(), self.ctx.self_id())?])
    }

    pub(crate) fn can_accept(&self, message: &Message) -> bool {
        message.message_type() == MessageType::Finalization && message.is_broadcast()
    }

    pub(crate) fn accept(&mut self, message: &Message) -> Result<()> {
        let from = message.from();
        let j = self
            .ctx
            .position(&from)
            .filter(|_| self.can_accept(message) && from != self.ctx.self_id())
            .ok_or(Error::UnexpectedMessage { round: 6, from })?;
        let _ack = FinalizationAck::try_from(message)?;
        self.temp.finalization_acks[j] = true;
        Ok(())
    }

    pub(crate) fn update(&self) -> bool {
        self.temp.finalization_acks.iter().all(|&done| done)
    }

    pub(crate) fn signature(&self) -> Option<&SignatureData> {
        self.signature.as_ref()
    }

    pub(crate) fn into_signature(self) -> Result<SignatureData> {
        self.signature.ok_or(Error::InternalInvariantFailed)
    }
}
