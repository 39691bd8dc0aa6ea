//! Key and proof containers.

use ark_ec::pairing::Pairing;
use ark_poly::{EvaluationDomain, Radix2EvaluationDomain};

use subroutines::{DkzgSrs, KzgSrs};

use crate::errors::GpianoError;

/// Number of selector columns; indexed access is the canonical form,
/// the `Q*` constants name the slots.
pub const NUM_SELECTORS: usize = 5;
pub const QL: usize = 0;
pub const QR: usize = 1;
pub const QM: usize = 2;
pub const QO: usize = 3;
pub const QK: usize = 4;

/// Replicated verifying key.
///
/// The outer FFT domain and both SRS are owned here rather than living
/// in process-wide state; the SRS fields are not serialised and must be
/// rebound with [`VerifyingKey::init_kzg`] after deserialisation.
#[derive(Clone, Debug)]
pub struct VerifyingKey<E: Pairing> {
    /// Outer (cross-worker) domain size `W`.
    pub size_y: u64,
    /// Inner (per-worker row) domain size `n`.
    pub size_x: u64,
    pub size_y_inv: E::ScalarField,
    pub size_x_inv: E::ScalarField,
    pub generator_y: E::ScalarField,
    pub generator_x: E::ScalarField,
    pub generator_x_inv: E::ScalarField,
    /// Multiplicative coset shift `u`; `1, u, u^2` tag the L, R, O
    /// slots of the wire layout.
    pub coset_shift: E::ScalarField,
    pub nb_public_variables: u64,

    /// Digests of the selector polynomials, indexed by `QL..=QK`.
    pub q: [E::G1Affine; NUM_SELECTORS],
    /// Digests of the worker-coordinate permutation polynomials.
    pub sy: [E::G1Affine; 3],
    /// Digests of the row-coordinate permutation polynomials.
    pub sx: [E::G1Affine; 3],

    /// Outer KZG SRS (size `W`, powers of `t`). Not serialised.
    pub kzg: Option<KzgSrs<E>>,
    /// This rank's dKZG slice (size `n + 3`). Only the G2 triple is
    /// used for verification. Not serialised.
    pub dkzg: Option<DkzgSrs<E>>,
}

impl<E: Pairing> VerifyingKey<E> {
    /// Rebind both commitment SRS after deserialisation, validating
    /// their sizes against the circuit dimensions.
    pub fn init_kzg(&mut self, dkzg: DkzgSrs<E>, kzg: KzgSrs<E>) -> Result<(), GpianoError> {
        let need_dkzg = self.size_x as usize + 3;
        if dkzg.size() < need_dkzg {
            return Err(GpianoError::SrsTooSmall(dkzg.size(), need_dkzg));
        }
        if kzg.size() < self.size_y as usize {
            return Err(GpianoError::SrsTooSmall(kzg.size(), self.size_y as usize));
        }
        self.dkzg = Some(dkzg);
        self.kzg = Some(kzg);
        Ok(())
    }

    /// Number of field elements expected in the public witness.
    pub fn nb_public_witness(&self) -> usize {
        self.nb_public_variables as usize
    }

    pub fn outer_domain(&self) -> Result<Radix2EvaluationDomain<E::ScalarField>, GpianoError> {
        Radix2EvaluationDomain::new(self.size_y as usize)
            .ok_or_else(|| GpianoError::Configuration("outer domain".to_string()))
    }

    pub fn inner_domain(&self) -> Result<Radix2EvaluationDomain<E::ScalarField>, GpianoError> {
        Radix2EvaluationDomain::new(self.size_x as usize)
            .ok_or_else(|| GpianoError::Configuration("inner domain".to_string()))
    }

    pub(crate) fn kzg_srs(&self) -> Result<&KzgSrs<E>, GpianoError> {
        self.kzg
            .as_ref()
            .ok_or_else(|| GpianoError::Configuration("outer KZG SRS not bound".to_string()))
    }

    pub(crate) fn dkzg_srs(&self) -> Result<&DkzgSrs<E>, GpianoError> {
        self.dkzg
            .as_ref()
            .ok_or_else(|| GpianoError::Configuration("dKZG SRS not bound".to_string()))
    }
}

/// Per-worker proving key; not replicated. Holds the worker's slice of
/// every fixed polynomial in canonical (coefficient) form plus the
/// permutation tables, and embeds the replicated verifying key.
#[derive(Clone, Debug)]
pub struct ProvingKey<E: Pairing> {
    pub vk: VerifyingKey<E>,

    /// Selector slices, indexed by `QL..=QK`, each of length `n`.
    pub q: [Vec<E::ScalarField>; NUM_SELECTORS],
    pub sy: [Vec<E::ScalarField>; 3],
    pub sx: [Vec<E::ScalarField>; 3],

    /// For each local cell `v*n + x`, the worker coordinate of its
    /// permutation image. `-1` is the unfilled sentinel and must not
    /// survive setup.
    pub permutation_y: Vec<i64>,
    /// For each local cell, the `(slot, row)` coordinate `v'*n + x'` of
    /// its permutation image.
    pub permutation_x: Vec<i64>,

    /// Inner domain of size `n`.
    pub domain: Radix2EvaluationDomain<E::ScalarField>,
    /// Coset domain for quotient evaluation, sized to interpolate the
    /// quotient.
    pub domain_big: Radix2EvaluationDomain<E::ScalarField>,
}

impl<E: Pairing> ProvingKey<E> {
    pub fn vk(&self) -> &VerifyingKey<E> {
        &self.vk
    }

    /// Rebind the commitment SRS after deserialisation; forwards to the
    /// embedded verifying key.
    pub fn init_kzg(&mut self, dkzg: DkzgSrs<E>, kzg: KzgSrs<E>) -> Result<(), GpianoError> {
        self.vk.init_kzg(dkzg, kzg)
    }
}

/// Per-rank evaluation tables carried in the proof: for every opened
/// polynomial, one evaluation at `zeta_x` per rank, in rank order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofEvaluations<F> {
    pub a: Vec<F>,
    pub b: Vec<F>,
    pub c: Vec<F>,
    pub sy: [Vec<F>; 3],
    pub sx: [Vec<F>; 3],
    pub q: [Vec<F>; NUM_SELECTORS],
    pub h: [Vec<F>; 3],
    pub z: Vec<F>,
    /// `z` at `zeta_x * omega_x`.
    pub z_omega: Vec<F>,
    /// Lagrange values of the outer accumulator `Z_y`.
    pub zy: Vec<F>,
}

impl<F: ark_ff::PrimeField> ProofEvaluations<F> {
    /// Number of ranks the tables cover.
    pub fn world_size(&self) -> usize {
        self.a.len()
    }

    /// All tables present and of one length.
    pub fn is_consistent(&self) -> bool {
        let w = self.a.len();
        let mut ok = w > 0 && self.b.len() == w && self.c.len() == w;
        ok &= self.sy.iter().all(|t| t.len() == w);
        ok &= self.sx.iter().all(|t| t.len() == w);
        ok &= self.q.iter().all(|t| t.len() == w);
        ok &= self.h.iter().all(|t| t.len() == w);
        ok && self.z.len() == w && self.z_omega.len() == w && self.zy.len() == w
    }

    /// One rank's slice of the tables.
    pub fn rank(&self, r: usize) -> crate::relation::RankEvals<F> {
        crate::relation::RankEvals {
            a: self.a[r],
            b: self.b[r],
            c: self.c[r],
            sy: [self.sy[0][r], self.sy[1][r], self.sy[2][r]],
            sx: [self.sx[0][r], self.sx[1][r], self.sx[2][r]],
            q: [
                self.q[0][r], self.q[1][r], self.q[2][r], self.q[3][r], self.q[4][r],
            ],
            h: [self.h[0][r], self.h[1][r], self.h[2][r]],
            z: self.z[r],
            z_omega: self.z_omega[r],
        }
    }

    /// Absorb every table, in the fold order, then the accumulator
    /// values.
    pub fn absorb(
        &self,
        transcript: &mut subroutines::Transcript,
    ) -> Result<(), ark_serialize::SerializationError> {
        transcript.append_serializable(b"evals_a", &self.a)?;
        transcript.append_serializable(b"evals_b", &self.b)?;
        transcript.append_serializable(b"evals_c", &self.c)?;
        for table in &self.sy {
            transcript.append_serializable(b"evals_sy", table)?;
        }
        for table in &self.sx {
            transcript.append_serializable(b"evals_sx", table)?;
        }
        for table in &self.q {
            transcript.append_serializable(b"evals_q", table)?;
        }
        for table in &self.h {
            transcript.append_serializable(b"evals_h", table)?;
        }
        transcript.append_serializable(b"evals_z", &self.z)?;
        transcript.append_serializable(b"evals_z_omega", &self.z_omega)?;
        transcript.append_serializable(b"evals_zy", &self.zy)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proof<E: Pairing> {
    pub a: E::G1Affine,
    pub b: E::G1Affine,
    pub c: E::G1Affine,
    /// dKZG digest of the effective inner accumulator.
    pub z: E::G1Affine,
    /// Outer KZG commitment to `Z_y`.
    pub zy: E::G1Affine,
    /// Quotient chunks.
    pub h: [E::G1Affine; 3],

    pub evals: ProofEvaluations<E::ScalarField>,

    /// Aggregated dKZG opening proof of the folded batch at `zeta_x`.
    pub batch_opening: E::G1Affine,
    /// Aggregated dKZG opening proof of `z` at `zeta_x * omega_x`.
    pub shift_opening: E::G1Affine,
    /// Outer KZG opening proof of the per-rank batched polynomial at
    /// `zeta_y`.
    pub outer_opening: E::G1Affine,
    /// Value of the per-rank batched polynomial at `zeta_y`.
    pub outer_eval: E::ScalarField,
}

/// Transcript hash algorithm tag. A single algorithm is implemented;
/// the tag exists so key/proof producers agree explicitly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HashTag {
    #[default]
    Merlin,
}

/// Prover options.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProverConfig {
    /// Run all prover computations even if the witness does not satisfy
    /// the circuit; the solution vector is patched with pseudo-random
    /// values and the proof will not verify.
    pub force_execute: bool,
    pub hash_tag: HashTag,
}
