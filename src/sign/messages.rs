// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The round payloads of the signing protocol.
//!
//! Big-integer fields ride the envelope via serde; per-peer proof vectors
//! travel in their canonical multi-part form (`Vec<Vec<u8>>`, empty slices
//! for absent entries) and are decoded at verification sites. `TryFrom`
//! implementations check only that the payload parses; semantic
//! verification happens in the rounds.

use crate::{
    errors::{Error, Result},
    paillier::Ciphertext,
    protocol::{Identifier, Message, MessageType, ParticipantIdentifier},
    utils::CurvePoint,
    zkp::mul::PiMulProof,
};
use k256::Scalar;
use serde::{Deserialize, Serialize};

/// Round 1 broadcast: the encrypted nonce shares and one range proof per
/// peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Round1Bcast {
    pub(crate) big_k: Ciphertext,
    pub(crate) big_g: Ciphertext,
    /// Enc proofs for `big_k`, one slot per quorum member (own slot empty).
    pub(crate) psi: Vec<Vec<u8>>,
}

/// Round 2, per-Alice affine response. Addressed to `to` but visible to the
/// whole quorum: the accountability checks of rounds 4 and 5 recompute
/// per-party ciphertexts from the full `D`/`F` matrices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Round2Msg1 {
    pub(crate) to: ParticipantIdentifier,
    /// `D`: the δ-side affine response under `to`'s Paillier key.
    pub(crate) big_d: Ciphertext,
    /// `D̂`: the σ-side affine response under `to`'s Paillier key.
    pub(crate) big_d_hat: Ciphertext,
    /// `F`: the δ-side β commitment under the sender's Paillier key.
    pub(crate) big_f: Ciphertext,
    /// `F̂`: the σ-side β commitment under the sender's Paillier key.
    pub(crate) big_f_hat: Ciphertext,
    /// AffG-Inv proofs for the δ side, one slot per quorum member.
    pub(crate) psi: Vec<Vec<u8>>,
    /// AffG-Inv proofs for the σ side, one slot per quorum member.
    pub(crate) psi_hat: Vec<Vec<u8>>,
}

/// Round 2 broadcast: the Γ point and the log* proofs tying it to `BigG`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Round2Msg2 {
    pub(crate) big_gamma: CurvePoint,
    /// LogStar proofs, one slot per quorum member.
    pub(crate) psi_prime: Vec<Vec<u8>>,
}

/// Round 3 broadcast: the δ share, the `Δ = k·Γ` point, and the log*
/// proofs tying them to `BigK`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Round3Bcast {
    pub(crate) delta: Scalar,
    pub(crate) big_delta: CurvePoint,
    /// LogStar proofs with auxiliary base Γ, one slot per quorum member.
    pub(crate) psi_double_prime: Vec<Vec<u8>>,
}

/// Round 4 broadcast: this party's view of `r`, plus the material that
/// makes its δ share publicly checkable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Round4Bcast {
    pub(crate) r: Scalar,
    /// `H = BigG^k · ρ^N`: an encryption of `k·γ` under the sender's key.
    pub(crate) big_h: Ciphertext,
    /// Ties `big_h` to `BigK`; needs no ring-Pedersen parameters, so one
    /// copy serves every verifier.
    pub(crate) mul_proof: PiMulProof,
    /// Dec proofs for the δ share, one slot per quorum member.
    pub(crate) dec_delta: Vec<Vec<u8>>,
}

/// Round 5 broadcast: the signature share and its accountability material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Round5Bcast {
    pub(crate) s_share: Scalar,
    /// `Ĥ = BigK^w · ρ^N`: an encryption of `w·k` under the sender's key.
    pub(crate) big_h_hat: Ciphertext,
    /// MulStar proofs tying `big_h_hat` to `W`, one slot per quorum member.
    pub(crate) mul_star: Vec<Vec<u8>>,
    /// Dec proofs for the signature share, one slot per quorum member.
    pub(crate) dec_s: Vec<Vec<u8>>,
}

/// Finalization acknowledgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FinalizationAck {}

macro_rules! impl_payload {
    ($type:ty, $message_type:expr) => {
        impl $type {
            pub(crate) fn to_message(
                &self,
                session: Identifier,
                from: ParticipantIdentifier,
            ) -> Result<Message> {
                Ok(Message::new_broadcast(
                    $message_type,
                    session,
                    from,
                    &serialize!(self)?,
                ))
            }
        }

        impl TryFrom<&Message> for $type {
            type Error = Error;

            fn try_from(message: &Message) -> Result<Self> {
                message.check_type($message_type)?;
                deserialize!(message.unverified_bytes())
            }
        }
    };
}

impl_payload!(Round1Bcast, MessageType::SignRoundOne);
impl_payload!(Round2Msg1, MessageType::SignRoundTwoMsg1);
impl_payload!(Round2Msg2, MessageType::SignRoundTwoMsg2);
impl_payload!(Round3Bcast, MessageType::SignRoundThree);
impl_payload!(Round4Bcast, MessageType::SignRoundFour);
impl_payload!(Round5Bcast, MessageType::SignRoundFive);
impl_payload!(FinalizationAck, MessageType::Finalization);
