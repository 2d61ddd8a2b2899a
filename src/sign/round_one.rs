// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Round one: sample the nonce shares `k` and `γ`, commit to them under
//! this party's Paillier key, and broadcast range proofs for `BigK` so that
//! every peer can later consume it as the MtA initiator ciphertext.

use crate::{
    errors::{Error, Result},
    mta,
    protocol::{Message, MessageType},
    sign::{messages::Round1Bcast, round_two::Round2, temp::SignTemp, SignContext},
    utils::{k256_order, random_positive_bn},
    zkp::proof_array_to_bytes,
};
use tracing::instrument;

pub(crate) struct Round1 {
    pub(crate) ctx: SignContext,
    pub(crate) temp: Box<SignTemp>,
    started: bool,
}

impl Round1 {
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
            return Err(Error::RoundAlreadyStarted { round: 1 });
        }
        self.started = true;

        let mut rng = rand::rngs::OsRng;
        let i = self.ctx.self_index();
        let order = k256_order();

        // Sample k <- F_q and gamma <- F_q.
        let k = random_positive_bn(&mut rng, &order);
        let gamma = random_positive_bn(&mut rng, &order);

        let pk = self.ctx.pk(i).clone();
        let (big_g, _) = pk.encrypt(&mut rng, &gamma)?;

        // BigK doubles as the MtA initiator ciphertext; alice_init encrypts
        // it and proves the plaintext small under every peer's parameters.
        let (big_k, rho) = pk.encrypt(&mut rng, &k)?;
        let (c_a, psi) = mta::alice_init(&mut rng, &pk, &k, &rho, &self.ctx.rp_slots())?;
        debug_assert_eq!(c_a, big_k);

        self.temp.k = k;
        self.temp.gamma = gamma;
        self.temp.rho = rho;
        self.temp.big_k[i] = Some(big_k.clone());
        self.temp.big_g[i] = Some(big_g.clone());

        let bcast = Round1Bcast {
            big_k,
            big_g,
            psi: proof_array_to_bytes(&psi),
        };
        let message = bcast.to_message(self.ctx.session(), self.ctx.self_id())?;
        self.temp.round_one[i] = Some(bcast);
        Ok(vec![message])
    }

    pub(crate) fn can_accept(&self, message: &Message) -> bool {
        message.message_type() == MessageType::SignRoundOne && message.is_broadcast()
    }

    pub(crate) fn accept(&mut self, message: &Message) -> Result<()> {
        let from = message.from();
        let j = self
            .ctx
            .position(&from)
            .filter(|_| self.can_accept(message) && from != self.ctx.self_id())
            .ok_or(Error::UnexpectedMessage { round: 1, from })?;
        let bcast = Round1Bcast::try_from(message)?;
        self.temp.round_one[j] = Some(bcast);
        Ok(())
    }

    pub(crate) fn update(&self) -> bool {
        self.temp.round_one.iter().all(Option::is_some)
    }

    pub(crate) fn next(self) -> Round2 {
        Round2::new(self.ctx, self.temp)
    }
}
