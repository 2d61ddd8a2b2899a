// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Per-session scratch for one party. Owned by the active round and moved
//! along the round chain; session secrets are zeroized when the session
//! ends.

use crate::paillier::{Ciphertext, Nonce};
use crate::sign::messages::{Round1Bcast, Round2Msg1, Round2Msg2, Round3Bcast, Round4Bcast, Round5Bcast};
use crate::utils::CurvePoint;
use k256::Scalar;
use libpaillier::unknown_order::BigNumber;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct SignTemp {
    /// The nonce share `k`.
    pub(crate) k: BigNumber,
    /// The randomizer share `γ`.
    pub(crate) gamma: BigNumber,
    /// Randomness of `BigK = Enc(k)`.
    pub(crate) rho: Nonce,
    /// The additive signing share `w = λ·x`.
    pub(crate) w: BigNumber,
    /// δ-side MtA outputs, indexed by peer.
    pub(crate) beta: Vec<BigNumber>,
    pub(crate) alpha: Vec<BigNumber>,
    /// σ-side MtA outputs, indexed by peer.
    pub(crate) beta_hat: Vec<BigNumber>,
    pub(crate) alpha_hat: Vec<BigNumber>,
    /// The σ share `w·k + Σ(α̂ + β̂) mod q`.
    pub(crate) sigma: BigNumber,

    // Public round state. Everything below is either broadcast or derivable
    // from broadcasts, so it is skipped by zeroization.
    #[zeroize(skip)]
    pub(crate) big_k: Vec<Option<Ciphertext>>,
    #[zeroize(skip)]
    pub(crate) big_g: Vec<Option<Ciphertext>>,
    /// Own `Γᵢ = γᵢ·G`.
    #[zeroize(skip)]
    pub(crate) big_gamma_share: Option<CurvePoint>,
    /// `Γ = ΣΓⱼ`.
    #[zeroize(skip)]
    pub(crate) big_gamma: Option<CurvePoint>,
    /// Own `Δᵢ = kᵢ·Γ`.
    #[zeroize(skip)]
    pub(crate) big_delta: Option<CurvePoint>,
    /// Own δ share (broadcast in round 3).
    #[zeroize(skip)]
    pub(crate) delta_share: Option<Scalar>,
    /// `δ = Σδⱼ`.
    #[zeroize(skip)]
    pub(crate) delta: Option<Scalar>,
    /// `R = δ⁻¹·Γ` and `r = R.x`.
    #[zeroize(skip)]
    pub(crate) big_r: Option<CurvePoint>,
    #[zeroize(skip)]
    pub(crate) r: Option<Scalar>,
    /// Own signature share (broadcast in round 5).
    #[zeroize(skip)]
    pub(crate) s_share: Option<Scalar>,

    // Message stores, indexed by sender (and recipient for the round-two
    // matrix). Own entries are filled in at send time.
    #[zeroize(skip)]
    pub(crate) round_one: Vec<Option<Round1Bcast>>,
    #[zeroize(skip)]
    pub(crate) round_two_msg1: Vec<Vec<Option<Round2Msg1>>>,
    #[zeroize(skip)]
    pub(crate) round_two_msg2: Vec<Option<Round2Msg2>>,
    #[zeroize(skip)]
    pub(crate) round_three: Vec<Option<Round3Bcast>>,
    #[zeroize(skip)]
    pub(crate) round_four: Vec<Option<Round4Bcast>>,
    #[zeroize(skip)]
    pub(crate) round_five: Vec<Option<Round5Bcast>>,
    #[zeroize(skip)]
    pub(crate) finalization_acks: Vec<bool>,
}

impl SignTemp {
    pub(crate) fn new(count: usize, w: BigNumber) -> Self {
        Self {
            k: BigNumber::zero(),
            gamma: BigNumber::zero(),
            rho: Nonce(BigNumber::zero()),
            w,
            beta: vec![BigNumber::zero(); count],
            alpha: vec![BigNumber::zero(); count],
            beta_hat: vec![BigNumber::zero(); count],
            alpha_hat: vec![BigNumber::zero(); count],
            sigma: BigNumber::zero(),
            big_k: vec![None; count],
            big_g: vec![None; count],
            big_gamma_share: None,
            big_gamma: None,
            big_delta: None,
            delta_share: None,
            delta: None,
            big_r: None,
            r: None,
            s_share: None,
            round_one: vec![None; count],
            round_two_msg1: vec![vec![None; count]; count],
            round_two_msg2: vec![None; count],
            round_three: vec![None; count],
            round_four: vec![None; count],
            round_five: vec![None; count],
            finalization_acks: vec![false; count],
        }
    }

    /// The round-two affine response sent by `from` to `to`, if present.
    pub(crate) fn round_two_msg1(&self, from: usize, to: usize) -> Option<&Round2Msg1> {
        self.round_two_msg1.get(from)?.get(to)?.as_ref()
    }
}

impl std::fmt::Debug for SignTemp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignTemp")
            .field("k", &"[redacted]")
            .field("gamma", &"[redacted]")
            .field("w", &"[redacted]")
            .field("sigma", &"[redacted]")
            .field("delta_share", &self.delta_share)
            .field("r", &self.r)
            .field("s_share", &self.s_share)
            .finish()
    }
}
