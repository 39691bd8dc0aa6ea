use displaydoc::Display;

use subroutines::{PcsError, TransportError};

/// Errors of the distributed PLONK backend.
///
/// Setup and prove errors are fatal for the invocation and surface on
/// every rank that hits them; verification errors indicate a bad proof,
/// not a broken system, and are recoverable by the caller.
#[derive(Debug, Display)]
pub enum GpianoError {
    /// invalid configuration: {0}
    Configuration(String),
    /// srs has {0} elements, need at least {1}
    SrsTooSmall(usize, usize),
    /// curve is not supported by this backend
    UnsupportedCurve,
    /// invalid witness: {0}
    InvalidWitness(String),
    /// prover aborted: {0}
    ProverAborted(String),
    /// key or proof belongs to a different circuit: {0}
    ProtocolMismatch(String),
    /// proof rejected: {0}
    Rejected(VerificationError),
    /// transport failure: {0}
    Transport(TransportError),
    /// commitment scheme failure: {0}
    Pcs(PcsError),
    /// serialization failure: {0}
    Serialization(ark_serialize::SerializationError),
    /// io failure: {0}
    Io(ark_std::io::Error),
}

/// What the verifier saw fail. Carried inside
/// [`GpianoError::Rejected`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum VerificationError {
    /// quotient identity does not hold on rank {0}
    Quotient(usize),
    /// permutation argument boundary violated
    Permutation,
    /// batched opening check failed
    Opening,
}

impl From<TransportError> for GpianoError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<PcsError> for GpianoError {
    fn from(e: PcsError) -> Self {
        Self::Pcs(e)
    }
}

impl From<ark_serialize::SerializationError> for GpianoError {
    fn from(e: ark_serialize::SerializationError) -> Self {
        Self::Serialization(e)
    }
}

impl From<ark_std::io::Error> for GpianoError {
    fn from(e: ark_std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<VerificationError> for GpianoError {
    fn from(e: VerificationError) -> Self {
        Self::Rejected(e)
    }
}

impl ark_std::error::Error for GpianoError {}
