// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A list of error types which are produced during an execution of the
//! protocol.

use thiserror::Error;

use crate::{paillier::PaillierError, protocol::ParticipantIdentifier};

/// The default Result type used in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The proof systems used by the signing protocol. Carried inside
/// [`Error::ProofRejected`] so that callers can tell which verification
/// failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ProofType {
    Enc,
    AffG,
    AffGInv,
    AffP,
    LogStar,
    MulStar,
    Mul,
    Dec,
    PaillierKey,
}

impl std::fmt::Display for ProofType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Self::Enc => "enc",
            Self::AffG => "aff-g",
            Self::AffGInv => "aff-g-inv",
            Self::AffP => "aff-p",
            Self::LogStar => "log*",
            Self::MulStar => "mul*",
            Self::Mul => "mul",
            Self::Dec => "dec",
            Self::PaillierKey => "paillier-key",
        };
        write!(f, "{name}")
    }
}

/// Represents an error produced while running the protocol or manipulating
/// its cryptographic data.
#[derive(Clone, Eq, PartialEq, Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    #[error("round {round} was already started")]
    RoundAlreadyStarted { round: u8 },
    #[error("round {round} cannot accept message from {from}")]
    UnexpectedMessage {
        round: u8,
        from: ParticipantIdentifier,
    },
    #[error("round {round} rejected a {proof} proof from {from}")]
    ProofRejected {
        round: u8,
        proof: ProofType,
        from: ParticipantIdentifier,
    },
    #[error("round {round} failed to decrypt a ciphertext associated with {from}")]
    DecryptionFailed {
        round: u8,
        from: ParticipantIdentifier,
    },
    #[error("the aggregate signature did not verify under the joint public key")]
    SignatureVerificationFailed,
    #[error("protocol aborted: {cause}")]
    ProtocolAborted {
        cause: String,
        from: Option<ParticipantIdentifier>,
    },

    #[error("serialization error")]
    Serialization,
    #[error("failed to verify {0} proof: {1}")]
    FailedToVerifyProof(ProofType, &'static str),
    #[error("paillier error: `{0}`")]
    Paillier(#[from] PaillierError),
    #[error("failed to convert BigNumber to k256::Scalar")]
    CouldNotConvertToScalar,
    #[error("could not invert a scalar")]
    CouldNotInvertScalar,
    #[error("could not invert a BigNumber")]
    CouldNotInvertBigNumber,
    #[error("reached the maximum allowed number of retries")]
    RetryFailed,
    #[error("represents some code assumption that was checked at runtime but failed to be true")]
    InternalInvariantFailed,
    #[error("function call contained invalid arguments: `{0}`")]
    InvalidArgument(String),
}

impl Error {
    /// Attribute a verification failure to the peer whose message was being
    /// checked. Errors that carry no peer context pass through unchanged.
    pub(crate) fn attribute(self, round: u8, from: ParticipantIdentifier) -> Self {
        match self {
            Error::FailedToVerifyProof(proof, _) => Error::ProofRejected { round, proof, from },
            Error::Paillier(PaillierError::InvalidCiphertext)
            | Error::Paillier(PaillierError::DecryptionFailed) => {
                Error::DecryptionFailed { round, from }
            }
            other => other,
        }
    }
}

macro_rules! serialize {
    ($x:expr) => {{
        bincode::serialize($x).or(Err(crate::errors::Error::Serialization))
    }};
}

macro_rules! deserialize {
    ($x:expr) => {{
        bincode::deserialize($x).or(Err(crate::errors::Error::Serialization))
    }};
}

macro_rules! verify_err {
    ($t:expr, $x:expr) => {{
        Err(crate::errors::Error::FailedToVerifyProof($t, $x))
    }};
}

macro_rules! arg_err {
    ($x:expr) => {{
        Err(crate::errors::Error::InvalidArgument(String::from($x)))
    }};
}
