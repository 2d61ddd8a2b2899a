// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The public driver for one party's signing session.
//!
//! The session holds the current round of the owning chain and exposes the
//! poll-style interface: [`SignSession::start`] runs round one,
//! [`SignSession::accept_message`] feeds incoming messages through each
//! round's acceptance gate, and [`SignSession::try_advance`] moves to the
//! next round once all expected messages have arrived, returning that
//! round's outbound messages. Any error is a terminal abort; a fresh
//! session with fresh randomness is required afterwards.

use crate::{
    errors::{Error, Result},
    keyshare::KeyShare,
    protocol::{Identifier, Message, ParticipantIdentifier},
    sign::{
        finalization::Finalization, round_five::Round5, round_four::Round4, round_one::Round1,
        round_three::Round3, round_two::Round2, SignContext, SignatureData,
    },
    utils::{bn_to_scalar, k256_order},
};
use k256::Scalar;
use libpaillier::unknown_order::BigNumber;
use sha2::{Digest, Sha256};

enum Stage {
    One(Round1),
    Two(Round2),
    Three(Round3),
    Four(Round4),
    Five(Round5),
    Finalization(Finalization),
    Done(SignatureData),
}

impl Stage {
    fn round_number(&self) -> u8 {
        match self {
            Stage::One(_) => 1,
            Stage::Two(_) => 2,
            Stage::Three(_) => 3,
            Stage::Four(_) => 4,
            Stage::Five(_) => 5,
            Stage::Finalization(_) | Stage::Done(_) => 6,
        }
    }
}

/// One party's view of a signing session.
pub struct SignSession {
    session: Identifier,
    self_id: ParticipantIdentifier,
    stage: Option<Stage>,
}

impl SignSession {
    /// Create a session that signs the SHA-256 digest of `message`, using
    /// the quorum named by `quorum` (which must contain this party and at
    /// least `threshold + 1` members of the key's committee).
    pub fn new(
        key_share: &KeyShare,
        quorum: &[ParticipantIdentifier],
        session: Identifier,
        message: &[u8],
    ) -> Result<Self> {
        let digest = Sha256::digest(message);
        let m = bn_to_scalar(&(BigNumber::from_slice(digest.as_slice()) % k256_order()))?;
        Self::new_prehashed(key_share, quorum, session, m, message.to_vec())
    }

    /// Create a session for a caller-provided message scalar. `message` may
    /// be empty when there are no raw bytes behind the scalar.
    pub fn new_prehashed(
        key_share: &KeyShare,
        quorum: &[ParticipantIdentifier],
        session: Identifier,
        m: Scalar,
        message: Vec<u8>,
    ) -> Result<Self> {
        let (ctx, temp) = SignContext::new(key_share, quorum, session, m, message)?;
        let self_id = ctx.self_id();
        Ok(Self {
            session,
            self_id,
            stage: Some(Stage::One(Round1::new(ctx, temp))),
        })
    }

    /// This party's identifier.
    pub fn self_id(&self) -> ParticipantIdentifier {
        self.self_id
    }

    /// Start round one, producing this party's opening broadcasts.
    pub fn start(&mut self) -> Result<Vec<Message>> {
        match self.stage.as_mut() {
            Some(Stage::One(round)) => round.start(),
            Some(stage) => Err(Error::RoundAlreadyStarted {
                round: stage.round_number(),
            }),
            None => Err(Error::InternalInvariantFailed),
        }
    }

    /// Feed one incoming message through the current round's acceptance
    /// gate.
    pub fn accept_message(&mut self, message: &Message) -> Result<()> {
        let stage = self.stage.as_mut().ok_or(Error::InternalInvariantFailed)?;
        if message.session() != self.session {
            return Err(Error::UnexpectedMessage {
                round: stage.round_number(),
                from: message.from(),
            });
        }
        match stage {
            Stage::One(round) => round.accept(message),
            Stage::Two(round) => round.accept(message),
            Stage::Three(round) => round.accept(message),
            Stage::Four(round) => round.accept(message),
            Stage::Five(round) => round.accept(message),
            Stage::Finalization(round) => round.accept(message),
            Stage::Done(_) => Err(Error::UnexpectedMessage {
                round: 6,
                from: message.from(),
            }),
        }
    }

    /// If the current round has everything it needs, consume it, start its
    /// successor, and return the successor's outbound messages. Returns an
    /// empty vector while messages are still outstanding (the poll point)
    /// and once the session is complete.
    pub fn try_advance(&mut self) -> Result<Vec<Message>> {
        let stage = self.stage.take().ok_or(Error::InternalInvariantFailed)?;
        match stage {
            Stage::One(round) => {
                if !round.update() {
                    self.stage = Some(Stage::One(round));
                    return Ok(vec![]);
                }
                let mut next = round.next();
                let result = next.start();
                self.stage = Some(Stage::Two(next));
                result
            }
            Stage::Two(round) => {
                if !round.update() {
                    self.stage = Some(Stage::Two(round));
                    return Ok(vec![]);
                }
                let mut next = round.next();
                let result = next.start();
                self.stage = Some(Stage::Three(next));
                result
            }
            Stage::Three(round) => {
                if !round.update() {
                    self.stage = Some(Stage::Three(round));
                    return Ok(vec![]);
                }
                let mut next = round.next();
                let result = next.start();
                self.stage = Some(Stage::Four(next));
                result
            }
            Stage::Four(round) => {
                if !round.update() {
                    self.stage = Some(Stage::Four(round));
                    return Ok(vec![]);
                }
                let mut next = round.next();
                let result = next.start();
                self.stage = Some(Stage::Five(next));
                result
            }
            Stage::Five(round) => {
                if !round.update() {
                    self.stage = Some(Stage::Five(round));
                    return Ok(vec![]);
                }
                let mut next = round.next();
                let result = next.start();
                self.stage = Some(Stage::Finalization(next));
                result
            }
            Stage::Finalization(round) => {
                if !round.update() {
                    self.stage = Some(Stage::Finalization(round));
                    return Ok(vec![]);
                }
                let signature = round.into_signature()?;
                self.stage = Some(Stage::Done(signature));
                Ok(vec![])
            }
            Stage::Done(signature) => {
                self.stage = Some(Stage::Done(signature));
                Ok(vec![])
            }
        }
    }

    /// True once the finalization acknowledgments are all in.
    pub fn is_complete(&self) -> bool {
        matches!(self.stage, Some(Stage::Done(_)))
    }

    /// The signature, available from the moment finalization verified it.
    pub fn signature(&self) -> Option<&SignatureData> {
        match self.stage.as_ref()? {
            Stage::Finalization(round) => round.signature(),
            Stage::Done(signature) => Some(signature),
            _ => None,
        }
    }
}
