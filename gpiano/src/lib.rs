//! Distributed PLONK backend over BN254.
//!
//! A cluster of `W` workers, each holding one horizontal shard of the
//! constraint system, cooperates over a rank-addressed transport to
//! produce a single succinct proof. A two-level commitment scheme binds
//! the sharded polynomials: a distributed KZG (dKZG) over the bivariate
//! `(Y, X)` layout, where `Y` indexes workers and `X` indexes rows, and
//! an ordinary univariate KZG over the outer worker domain.
//!
//! The crate is generic over `ark_ec::pairing::Pairing` internally;
//! the public entry points below dispatch on a [`Curve`] tag, with
//! BN254 the only instantiated curve.

pub mod cs;
pub mod errors;
pub mod marshal;
pub mod prover;
pub mod relation;
pub mod setup;
pub mod structs;
pub mod verifier;

#[cfg(test)]
mod tests;

pub use cs::SparseConstraintSystem;
pub use errors::{GpianoError, VerificationError};
pub use prover::prove_direct;
pub use setup::setup_random;
pub use structs::{
    HashTag, Proof, ProofEvaluations, ProverConfig, ProvingKey, VerifyingKey, NUM_SELECTORS, QK,
    QL, QM, QO, QR,
};

use ark_ec::pairing::Pairing;
use ark_std::io::Read;
use ark_std::rand::{CryptoRng, RngCore};

use subroutines::{Transcript, Transport};

/// Supported curve tags. Only BN254 is wired to an implementation; the
/// other tags exist so callers get a typed error instead of a panic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Curve {
    Bn254,
    Bls12_381,
    Bls12_377,
}

pub type Bn254 = ark_bn254::Bn254;
pub type Fr = ark_bn254::Fr;

/// Curve-tagged [`setup::setup`].
pub fn setup<C, R>(
    curve: Curve,
    ccs: &SparseConstraintSystem<Fr>,
    public_witness: &[Fr],
    rng: &mut R,
    net: &mut C,
) -> Result<(ProvingKey<Bn254>, VerifyingKey<Bn254>), GpianoError>
where
    C: Transport + ?Sized,
    R: RngCore + CryptoRng,
{
    match curve {
        Curve::Bn254 => setup::setup(ccs, public_witness, rng, net),
        _ => Err(GpianoError::UnsupportedCurve),
    }
}

/// Curve-tagged [`prover::prove`].
pub fn prove<C>(
    curve: Curve,
    ccs: &SparseConstraintSystem<Fr>,
    pk: &ProvingKey<Bn254>,
    full_witness: &[Fr],
    config: &ProverConfig,
    net: &mut C,
) -> Result<Proof<Bn254>, GpianoError>
where
    C: Transport + ?Sized,
{
    match curve {
        Curve::Bn254 => prover::prove(ccs, pk, full_witness, config, net),
        _ => Err(GpianoError::UnsupportedCurve),
    }
}

/// Curve-tagged [`verifier::verify`].
pub fn verify(
    curve: Curve,
    proof: &Proof<Bn254>,
    vk: &VerifyingKey<Bn254>,
    public_witness: &[Fr],
) -> Result<(), GpianoError> {
    match curve {
        Curve::Bn254 => verifier::verify(proof, vk, public_witness),
        _ => Err(GpianoError::UnsupportedCurve),
    }
}

/// Curve-tagged constructor for deserialisation scaffolding.
pub fn new_constraint_system(
    curve: Curve,
    nb_public_variables: usize,
) -> Result<SparseConstraintSystem<Fr>, GpianoError> {
    match curve {
        Curve::Bn254 => Ok(SparseConstraintSystem::new(nb_public_variables)),
        _ => Err(GpianoError::UnsupportedCurve),
    }
}

/// Read a proving key for the tagged curve (compressed encoding).
pub fn read_proving_key<R: Read>(
    curve: Curve,
    reader: R,
) -> Result<(ProvingKey<Bn254>, u64), GpianoError> {
    match curve {
        Curve::Bn254 => ProvingKey::read_from(reader),
        _ => Err(GpianoError::UnsupportedCurve),
    }
}

/// Read a verifying key for the tagged curve (compressed encoding).
pub fn read_verifying_key<R: Read>(
    curve: Curve,
    reader: R,
) -> Result<(VerifyingKey<Bn254>, u64), GpianoError> {
    match curve {
        Curve::Bn254 => VerifyingKey::read_from(reader),
        _ => Err(GpianoError::UnsupportedCurve),
    }
}

/// Read a proof for the tagged curve (compressed encoding).
pub fn read_proof<R: Read>(
    curve: Curve,
    reader: R,
) -> Result<(Proof<Bn254>, u64), GpianoError> {
    match curve {
        Curve::Bn254 => Proof::read_from(reader),
        _ => Err(GpianoError::UnsupportedCurve),
    }
}

/// Shared transcript initialisation: binds the circuit dimensions, the
/// fixed-polynomial digests and the public witness before round 1.
pub(crate) fn transcript_init<E: Pairing>(
    vk: &VerifyingKey<E>,
    public_witness: &[E::ScalarField],
) -> Result<Transcript, ark_serialize::SerializationError> {
    let mut transcript = Transcript::new(b"gpiano");
    transcript.append_u64(b"size_y", vk.size_y);
    transcript.append_u64(b"size_x", vk.size_x);
    transcript.append_serializable(b"generator_y", &vk.generator_y)?;
    transcript.append_serializable(b"generator_x", &vk.generator_x)?;
    transcript.append_serializable(b"coset_shift", &vk.coset_shift)?;
    for digest in &vk.q {
        transcript.append_serializable(b"q_digest", digest)?;
    }
    for digest in &vk.sy {
        transcript.append_serializable(b"sy_digest", digest)?;
    }
    for digest in &vk.sx {
        transcript.append_serializable(b"sx_digest", digest)?;
    }
    transcript.append_serializable(b"public_witness", &public_witness.to_vec())?;
    Ok(transcript)
}
