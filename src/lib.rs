// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Threshold ECDSA signing in the style of CGG+21 over secp256k1.
//!
//! `n` participants hold Shamir shares of a signing key; any `t + 1` of
//! them can run a [`sign::SignSession`] to produce a standard ECDSA
//! signature under the joint public key, while no coalition of `t` or fewer
//! learns anything about the key. The multiplicative-to-additive share
//! conversion at the protocol's core is *accountable*: every ciphertext a
//! party contributes is accompanied by zero-knowledge range proofs
//! checkable under each verifier's own ring-Pedersen parameters, so a
//! deviating party is identified rather than merely suspected.
//!
//! Key generation, refresh and the transport layer are out of scope; see
//! [`keyshare`] for the fixture generator and resharing helper that stand
//! in for them.

#![allow(non_snake_case)]

#[macro_use]
pub mod errors;

pub mod keyshare;
pub mod protocol;
pub mod sign;

pub(crate) mod mta;
pub(crate) mod paillier;
pub(crate) mod parameters;
pub(crate) mod ring_pedersen;
pub(crate) mod serialization;
pub(crate) mod utils;
pub(crate) mod zkp;

#[cfg(test)]
mod tests;

pub use errors::{Error, ProofType, Result};
pub use keyshare::{dealer_keygen, reshare, KeyShare};
pub use paillier::PaillierError;
pub use protocol::{Identifier, Message, ParticipantIdentifier, PeerContext};
pub use sign::{SignSession, SignatureData};
pub use utils::CurvePoint;
