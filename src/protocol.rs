// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Participant identities, session parameters, and the wire envelope that
//! carries round payloads between parties.

use crate::errors::{Error, Result};
use rand::{CryptoRng, Rng, RngCore};
use serde::{Deserialize, Serialize};

/// An identifier for one participant in a protocol run: a position in the
/// committee plus unique key bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantIdentifier {
    index: usize,
    key: u64,
}

impl ParticipantIdentifier {
    pub(crate) fn new<R: RngCore + CryptoRng>(index: usize, rng: &mut R) -> Self {
        Self {
            index,
            key: rng.gen(),
        }
    }

    /// The participant's position in the committee ordering.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl std::fmt::Display for ParticipantIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Participant({}, {})",
            self.index,
            hex::encode(&self.key.to_be_bytes()[..4])
        )
    }
}

/// The ordered set of participants taking part in one signing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerContext {
    participants: Vec<ParticipantIdentifier>,
}

impl PeerContext {
    /// Build a peer context from an unordered set of identifiers. The
    /// identifiers are sorted so that every party derives the same indexing.
    pub fn new(mut participants: Vec<ParticipantIdentifier>) -> Result<Self> {
        participants.sort();
        participants.dedup();
        if participants.len() < 2 {
            return arg_err!("a session requires at least two participants");
        }
        Ok(Self { participants })
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn participants(&self) -> &[ParticipantIdentifier] {
        &self.participants
    }

    /// The session-local index of `id`, if it is a member.
    pub(crate) fn position(&self, id: &ParticipantIdentifier) -> Option<usize> {
        self.participants.iter().position(|p| p == id)
    }
}

/// Immutable parameters of one signing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameters {
    peers: PeerContext,
    self_id: ParticipantIdentifier,
    threshold: usize,
}

impl Parameters {
    pub fn new(
        peers: PeerContext,
        self_id: ParticipantIdentifier,
        threshold: usize,
    ) -> Result<Self> {
        if peers.position(&self_id).is_none() {
            return arg_err!("self identifier is not part of the peer context");
        }
        if peers.len() < threshold + 1 {
            return arg_err!("quorum is smaller than threshold + 1");
        }
        Ok(Self {
            peers,
            self_id,
            threshold,
        })
    }

    pub fn peers(&self) -> &PeerContext {
        &self.peers
    }

    pub fn self_id(&self) -> ParticipantIdentifier {
        self.self_id
    }

    pub fn count(&self) -> usize {
        self.peers.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// The session-local index of this party.
    pub(crate) fn self_index(&self) -> usize {
        // Checked at construction.
        self.peers.position(&self.self_id).unwrap_or(0)
    }
}

/// A generic identifier for a protocol session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier(u128);

impl Identifier {
    /// Produces a random [`Identifier`].
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(rng.gen::<u128>())
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Id({})", hex::encode(&self.0.to_be_bytes()[..4]))
    }
}

/// An enum consisting of all message types exchanged in a signing session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// First round: encrypted nonce shares plus range proofs.
    SignRoundOne,
    /// Second round, per-Alice affine responses (visible to all parties).
    SignRoundTwoMsg1,
    /// Second round broadcast: the Γ point and log* proofs.
    SignRoundTwoMsg2,
    /// Third round: δ shares and their consistency proofs.
    SignRoundThree,
    /// Fourth round: the r value and the δ accountability material.
    SignRoundFour,
    /// Fifth round: signature shares and their accountability material.
    SignRoundFive,
    /// Finalization acknowledgment.
    Finalization,
}

/// A message that can be posted to (and read from) the channel between
/// participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    message_type: MessageType,
    /// The signing session this message belongs to.
    session: Identifier,
    from: ParticipantIdentifier,
    /// `None` for broadcast messages.
    to: Option<ParticipantIdentifier>,
    /// The raw bytes for the message, which need to be verified before use.
    /// This is a private member of the struct, so that consumers must go
    /// through a typed, verifying accessor to extract the payload.
    unverified_bytes: Vec<u8>,
}

impl Message {
    pub(crate) fn new_broadcast(
        message_type: MessageType,
        session: Identifier,
        from: ParticipantIdentifier,
        unverified_bytes: &[u8],
    ) -> Self {
        Self {
            message_type,
            session,
            from,
            to: None,
            unverified_bytes: unverified_bytes.to_vec(),
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn session(&self) -> Identifier {
        self.session
    }

    pub fn from(&self) -> ParticipantIdentifier {
        self.from
    }

    pub fn to(&self) -> Option<ParticipantIdentifier> {
        self.to
    }

    pub fn is_broadcast(&self) -> bool {
        self.to.is_none()
    }

    pub(crate) fn check_type(&self, expected: MessageType) -> Result<()> {
        if self.message_type != expected {
            return Err(Error::Serialization);
        }
        Ok(())
    }

    pub(crate) fn unverified_bytes(&self) -> &[u8] {
        &self.unverified_bytes
    }

    /// Replace the payload, keeping the envelope. Test-only, for modeling
    /// tampered messages.
    #[cfg(test)]
    pub(crate) fn with_payload(&self, unverified_bytes: Vec<u8>) -> Self {
        Self {
            unverified_bytes,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::get_test_rng;

    #[test]
    fn peer_context_sorts_and_dedups() -> Result<()> {
        let mut rng = get_test_rng();
        let a = ParticipantIdentifier::new(0, &mut rng);
        let b = ParticipantIdentifier::new(1, &mut rng);
        let c = ParticipantIdentifier::new(2, &mut rng);
        let peers = PeerContext::new(vec![c, a, b, a])?;
        assert_eq!(peers.len(), 3);
        assert_eq!(peers.participants(), &[a, b, c]);
        assert_eq!(peers.position(&b), Some(1));
        Ok(())
    }

    #[test]
    fn parameters_reject_foreign_self_id() {
        let mut rng = get_test_rng();
        let a = ParticipantIdentifier::new(0, &mut rng);
        let b = ParticipantIdentifier::new(1, &mut rng);
        let outsider = ParticipantIdentifier::new(2, &mut rng);
        let peers = PeerContext::new(vec![a, b]).unwrap();
        assert!(Parameters::new(peers, outsider, 1).is_err());
    }
}
