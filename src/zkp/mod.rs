// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The zero-knowledge proofs of CGG+21 Appendix C used by the signing
//! protocol, together with the canonical multi-part byte serialization that
//! lets a prover ship one vector of peer-indexed proofs with the entry for
//! itself absent.

pub(crate) mod affg;
pub(crate) mod affp;
pub(crate) mod dec;
pub(crate) mod enc;
pub(crate) mod logstar;
pub(crate) mod mul;
pub(crate) mod mulstar;

use crate::errors::{Error, ProofType, Result};
use crate::serialization::{read_length_prefixed, write_length_prefixed};
use rand::{CryptoRng, RngCore};

/// A non-interactive zero-knowledge proof.
///
/// Every proof fixes the number of big-integer (or curve point) components
/// it is made of (`PARTS`) and serializes as exactly that many big-endian
/// byte strings, which is what makes the nil-preserving array codec below
/// possible.
pub(crate) trait Proof: Sized {
    /// Number of byte-string components in the canonical serialization.
    const PARTS: usize;
    /// Which proof system this is, for error attribution.
    const TYPE: ProofType;

    type CommonInput;
    type ProverSecret;

    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
    ) -> Result<Self>;

    /// Total verification: rejects zero components, out-of-range responses,
    /// and any recomputed equality or challenge mismatch.
    fn verify(&self, input: &Self::CommonInput) -> Result<()>;

    /// The proof as `PARTS` big-endian byte strings.
    fn to_parts(&self) -> Vec<Vec<u8>>;

    fn from_parts(parts: &[Vec<u8>]) -> Result<Self>;

    /// Canonical single-buffer serialization: each part length-prefixed.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = vec![];
        for part in self.to_parts() {
            write_length_prefixed(&mut out, &part)?;
        }
        Ok(out)
    }

    fn from_bytes(input: &[u8]) -> Result<Self> {
        let mut parts = Vec::with_capacity(Self::PARTS);
        let mut rest = input;
        for _ in 0..Self::PARTS {
            let (part, remainder) = read_length_prefixed(rest)?;
            parts.push(part.to_vec());
            rest = remainder;
        }
        if !rest.is_empty() {
            return Err(Error::Serialization);
        }
        Self::from_parts(&parts)
    }
}

/// Serialize a vector of optional proofs as `N × PARTS` byte slices, where
/// an absent proof contributes `PARTS` empty slices. This is the on-the-wire
/// form of the per-peer proof vectors (the slot a prover aims at itself is
/// `None`).
pub(crate) fn proof_array_to_bytes<P: Proof>(proofs: &[Option<P>]) -> Vec<Vec<u8>> {
    let mut out = Vec::with_capacity(proofs.len() * P::PARTS);
    for proof in proofs {
        match proof {
            None => out.extend(std::iter::repeat(vec![]).take(P::PARTS)),
            Some(p) => out.extend(p.to_parts()),
        }
    }
    out
}

/// Inverse of [`proof_array_to_bytes`]. Runs of `PARTS` empty slices decode
/// to absent proofs.
pub(crate) fn proof_array_from_bytes<P: Proof>(bzs: &[Vec<u8>]) -> Result<Vec<Option<P>>> {
    if bzs.len() % P::PARTS != 0 {
        return Err(Error::Serialization);
    }
    bzs.chunks(P::PARTS)
        .map(|chunk| {
            if chunk.iter().all(|part| part.is_empty()) {
                Ok(None)
            } else {
                P::from_parts(chunk).map(Some)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paillier::DecryptionKey;
    use crate::ring_pedersen::RingPedersen;
    use crate::utils::{get_test_rng, k256_order, random_positive_bn};
    use crate::zkp::enc::{PiEncInput, PiEncProof, PiEncSecret};

    #[test]
    fn proof_array_roundtrip_preserves_nil_entries() -> Result<()> {
        let mut rng = get_test_rng();
        let sk = DecryptionKey::new(&mut rng)?;
        let pk = sk.encryption_key();
        let setup = RingPedersen::gen(&mut rng)?;

        let k = random_positive_bn(&mut rng, &k256_order());
        let (ciphertext, nonce) = pk.encrypt(&mut rng, &k)?;
        let input = PiEncInput::new(&setup, &pk, &ciphertext);
        let proof = PiEncProof::prove(&mut rng, &input, &PiEncSecret::new(&k, &nonce))?;

        let array = vec![Some(proof.clone()), None, Some(proof), None];
        let bytes = proof_array_to_bytes(&array);
        assert_eq!(bytes.len(), array.len() * PiEncProof::PARTS);

        let decoded: Vec<Option<PiEncProof>> = proof_array_from_bytes(&bytes)?;
        assert_eq!(decoded.len(), array.len());
        assert!(decoded[0].is_some());
        assert!(decoded[1].is_none());
        assert!(decoded[2].is_some());
        assert!(decoded[3].is_none());
        decoded[0].as_ref().unwrap().verify(&input)?;
        decoded[2].as_ref().unwrap().verify(&input)?;
        Ok(())
    }

    #[test]
    fn proof_array_rejects_ragged_input() {
        let bzs = vec![vec![1u8]; PiEncProof::PARTS + 1];
        assert!(proof_array_from_bytes::<PiEncProof>(&bzs).is_err());
    }
}
