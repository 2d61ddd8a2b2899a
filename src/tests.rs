// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! End-to-end tests: a full quorum signing over an in-process message
//! channel, resharing to a fresh committee, and abort behavior on tampered
//! round-one material.

use crate::{
    errors::{Error, ProofType},
    keyshare::{dealer_keygen, reshare, KeyShare},
    protocol::{Identifier, Message, ParticipantIdentifier},
    sign::{messages::Round1Bcast, SignSession, SignatureData},
    utils::get_test_rng,
    zkp::enc::PiEncProof,
    zkp::Proof,
};
use k256::ecdsa::signature::DigestVerifier;
use k256::Scalar;
use sha2::{Digest, Sha256};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn make_sessions(shares: &[KeyShare], session_id: Identifier, message: &[u8]) -> Vec<SignSession> {
    let quorum: Vec<ParticipantIdentifier> =
        shares.iter().map(|share| share.participant()).collect();
    shares
        .iter()
        .map(|share| SignSession::new(share, &quorum, session_id, message).unwrap())
        .collect()
}

/// Deliver every message to every session except the sender's.
fn deliver_all(messages: &[Message], sessions: &mut [SignSession]) {
    for message in messages {
        for session in sessions.iter_mut() {
            if session.self_id() == message.from() {
                continue;
            }
            session.accept_message(message).unwrap();
        }
    }
}

/// Drive all sessions to completion in lockstep and return their outputs.
fn run_to_completion(sessions: &mut [SignSession]) -> Vec<SignatureData> {
    let mut outbound: Vec<Message> = vec![];
    for session in sessions.iter_mut() {
        outbound.extend(session.start().unwrap());
    }

    // Six rounds plus slack; each iteration delivers one round's messages
    // and advances everyone.
    for _ in 0..10 {
        deliver_all(&outbound, sessions);
        outbound = sessions
            .iter_mut()
            .flat_map(|session| session.try_advance().unwrap())
            .collect();
        if sessions.iter().all(|session| session.is_complete()) {
            break;
        }
    }

    sessions
        .iter()
        .map(|session| {
            assert!(session.is_complete());
            session.signature().unwrap().clone()
        })
        .collect()
}

#[test]
fn threshold_ecdsa_end_to_end() {
    init_tracing();
    let mut rng = get_test_rng();
    let shares = dealer_keygen(&mut rng, 3, 2).unwrap();
    let message = b"bla bla";

    let session_id = Identifier::random(&mut rng);
    let mut sessions = make_sessions(&shares, session_id, message);
    let signatures = run_to_completion(&mut sessions);

    // All three parties emit the same signature.
    for signature in &signatures[1..] {
        assert_eq!(signature.r(), signatures[0].r());
        assert_eq!(signature.s(), signatures[0].s());
        assert_eq!(signature.recovery_id(), signatures[0].recovery_id());
    }
    assert!(signatures[0].is_low_s());

    // The signature verifies under the joint public key with standard
    // ECDSA verification.
    let verifying_key = k256::ecdsa::VerifyingKey::from_encoded_point(
        &shares[0].public_key().0.to_affine().into(),
    )
    .unwrap();
    let signature = signatures[0].signature().unwrap();
    assert!(verifying_key
        .verify_digest(Sha256::new().chain_update(message), &signature)
        .is_ok());
}

#[test]
fn reshare_then_sign() {
    init_tracing();
    let mut rng = get_test_rng();
    let old_shares = dealer_keygen(&mut rng, 3, 2).unwrap();
    let public_key = old_shares[0].public_key();

    let old_refs: Vec<&KeyShare> = old_shares.iter().collect();
    let new_shares = reshare(&mut rng, &old_refs, 3, 2).unwrap();
    assert_eq!(new_shares[0].public_key(), public_key);

    // Sign the bare scalar m = 42 with the new committee.
    let m = Scalar::from(42u64);
    let quorum: Vec<ParticipantIdentifier> =
        new_shares.iter().map(|share| share.participant()).collect();
    let session_id = Identifier::random(&mut rng);
    let mut sessions: Vec<SignSession> = new_shares
        .iter()
        .map(|share| {
            SignSession::new_prehashed(share, &quorum, session_id, m, vec![]).unwrap()
        })
        .collect();
    let signatures = run_to_completion(&mut sessions);

    for signature in &signatures[1..] {
        assert_eq!(signature.r(), signatures[0].r());
        assert_eq!(signature.s(), signatures[0].s());
    }
    // The signature verifies under the pre-resharing public key.
    assert!(signatures[0].verify(&public_key).is_ok());
}

#[test]
fn tampered_round_one_proof_aborts_round_two() {
    init_tracing();
    let mut rng = get_test_rng();
    let shares = dealer_keygen(&mut rng, 3, 2).unwrap();
    let session_id = Identifier::random(&mut rng);
    let mut sessions = make_sessions(&shares, session_id, b"bla bla");

    let mut outbound: Vec<Message> = vec![];
    for session in sessions.iter_mut() {
        outbound.extend(session.start().unwrap());
    }

    // Party 0 replaces the first component of each of its Enc proofs with
    // zero before its broadcast goes out.
    let bad_party = sessions[0].self_id();
    let tampered: Vec<Message> = outbound
        .iter()
        .map(|message| {
            if message.from() != bad_party {
                return message.clone();
            }
            let mut bcast = Round1Bcast::try_from(message).unwrap();
            for chunk in bcast.psi.chunks_mut(PiEncProof::PARTS) {
                if chunk.iter().all(|part| part.is_empty()) {
                    continue;
                }
                chunk[0] = vec![0u8];
            }
            message.with_payload(bincode::serialize(&bcast).unwrap())
        })
        .collect();

    deliver_all(&tampered, &mut sessions);

    // Every honest party rejects the Enc proof in round two and produces
    // no further messages.
    for session in sessions.iter_mut().skip(1) {
        let result = session.try_advance();
        assert_eq!(
            result.unwrap_err(),
            Error::ProofRejected {
                round: 2,
                proof: ProofType::Enc,
                from: bad_party,
            }
        );
    }
}
