//! The algebraic relation of the protocol, shared between the prover's
//! quotient/linearisation construction and the verifier's per-rank
//! checks. Keeping both sides on these functions is what makes the
//! transcripts meet.

use ark_ff::{Field, PrimeField};

use crate::structs::{NUM_SELECTORS, QK, QL, QM, QO, QR};

/// Gate value `q_l a + q_r b + q_m a b + q_o c + q_k + pi`.
pub fn gate_eval<F: PrimeField>(q: &[F; NUM_SELECTORS], a: F, b: F, c: F, pi: F) -> F {
    q[QL] * a + q[QR] * b + q[QM] * a * b + q[QO] * c + q[QK] + pi
}

/// Identity-side permutation factor product at one cell: the wire
/// triple against the cell coordinates `(id_y, u^k id_x)`, bound with
/// `beta, beta^2`.
pub fn permutation_numerator<F: PrimeField>(
    w: &[F; 3],
    id_y: F,
    id_x: F,
    coset_shift: F,
    beta: F,
    gamma: F,
) -> F {
    let beta_sq = beta.square();
    let mut shift = F::one();
    let mut acc = F::one();
    for wk in w {
        acc *= *wk + beta * id_y + beta_sq * shift * id_x + gamma;
        shift *= coset_shift;
    }
    acc
}

/// Permuted-side factor product at one cell: the wire triple against
/// the images `(S^y_k, S^x_k)`.
pub fn permutation_denominator<F: PrimeField>(
    w: &[F; 3],
    sy: &[F; 3],
    sx: &[F; 3],
    beta: F,
    gamma: F,
) -> F {
    let beta_sq = beta.square();
    let mut acc = F::one();
    for k in 0..3 {
        acc *= w[k] + beta * sy[k] + beta_sq * sx[k] + gamma;
    }
    acc
}

/// One rank's worth of opened evaluations at `zeta_x` (plus the shifted
/// accumulator value), as the verifier reads them out of the proof and
/// the prover holds them locally.
#[derive(Clone, Copy)]
pub struct RankEvals<F> {
    pub a: F,
    pub b: F,
    pub c: F,
    pub sy: [F; 3],
    pub sx: [F; 3],
    pub q: [F; NUM_SELECTORS],
    pub h: [F; 3],
    pub z: F,
    pub z_omega: F,
}

/// Scalars fixed for the whole cluster once the transcript has produced
/// the round-3/4 challenges.
#[derive(Clone, Copy)]
pub struct RelationContext<F> {
    pub alpha: F,
    pub beta: F,
    pub gamma: F,
    pub zeta_x: F,
    pub zeta_y: F,
    pub coset_shift: F,
    /// `zeta_x^n - 1`.
    pub vanishing: F,
    /// `L_0(zeta_x)` over the inner domain.
    pub lagrange_first: F,
    /// `L_{n-1}(zeta_x)` over the inner domain.
    pub lagrange_last: F,
    /// `zeta_x^{n+2}`, the chunk-recombination factor.
    pub chunk_shift: F,
}

/// Folded quotient value `h_1 + zeta^{n+2} h_2 + zeta^{2(n+2)} h_3`.
pub fn fold_quotient<F: PrimeField>(h: &[F; 3], chunk_shift: F) -> F {
    h[0] + chunk_shift * (h[1] + chunk_shift * h[2])
}

/// The per-rank identity the quotient witnesses: returns the value of
/// `gate + alpha perm + alpha^2 (inner boundary) + alpha^3 (outer
/// boundary)` minus `Z_H(zeta_x)` times the folded quotient. Zero for
/// an honest proof.
#[allow(clippy::too_many_arguments)]
pub fn rank_identity<F: PrimeField>(
    ctx: &RelationContext<F>,
    rank: usize,
    id_y: F,
    evals: &RankEvals<F>,
    zy: F,
    zy_next: F,
    public_input: F,
) -> F {
    let w = [evals.a, evals.b, evals.c];
    let gate = gate_eval(&evals.q, evals.a, evals.b, evals.c, public_input);

    let num = permutation_numerator(&w, id_y, ctx.zeta_x, ctx.coset_shift, ctx.beta, ctx.gamma);
    let den = permutation_denominator(&w, &evals.sy, &evals.sx, ctx.beta, ctx.gamma);
    // wrap patch against the scalar boundary values; equivalent to
    // patching with z(omega X) once the alpha^2 term pins z(1) = zy,
    // and keeps the quotient at degree 3n + 5
    let perm =
        evals.z_omega * den - evals.z * num + ctx.lagrange_last * den * (zy_next - zy);

    let inner_boundary = ctx.lagrange_first * (evals.z - zy);
    let outer_boundary = if rank == 0 {
        ctx.lagrange_first * (evals.z - F::one())
    } else {
        F::zero()
    };

    let alpha_sq = ctx.alpha.square();
    gate + ctx.alpha * perm + alpha_sq * inner_boundary + alpha_sq * ctx.alpha * outer_boundary
        - ctx.vanishing * fold_quotient(&evals.h, ctx.chunk_shift)
}

/// Coefficients of the linearisation polynomial, rank-uniform by
/// construction: the prover applies them to its coefficient slices, the
/// verifier to the VK digests and to every rank's opened evaluations.
#[derive(Clone, Copy)]
pub struct LinearizationCoeffs<F> {
    pub q: [F; NUM_SELECTORS],
    /// Applied to the `c` witness polynomial (third permuted factor).
    pub c: F,
    pub sy2: F,
    pub sx2: F,
    pub z: F,
    pub h: [F; 3],
}

/// Combined (barycentric, at `zeta_y`) evaluations feeding the
/// linearisation coefficients.
#[derive(Clone, Copy)]
pub struct CombinedEvals<F> {
    pub a: F,
    pub b: F,
    pub c: F,
    pub sy0: F,
    pub sx0: F,
    pub sy1: F,
    pub sx1: F,
    pub z_omega: F,
}

impl<F: PrimeField> CombinedEvals<F> {
    pub fn absorb(
        &self,
        transcript: &mut subroutines::Transcript,
    ) -> Result<(), ark_serialize::SerializationError> {
        transcript.append_serializable(b"a_bar", &self.a)?;
        transcript.append_serializable(b"b_bar", &self.b)?;
        transcript.append_serializable(b"c_bar", &self.c)?;
        transcript.append_serializable(b"sy0_bar", &self.sy0)?;
        transcript.append_serializable(b"sx0_bar", &self.sx0)?;
        transcript.append_serializable(b"sy1_bar", &self.sy1)?;
        transcript.append_serializable(b"sx1_bar", &self.sx1)?;
        transcript.append_serializable(b"z_omega_bar", &self.z_omega)?;
        Ok(())
    }
}

pub fn linearization_coeffs<F: PrimeField>(
    ctx: &RelationContext<F>,
    combined: &CombinedEvals<F>,
) -> LinearizationCoeffs<F> {
    let beta_sq = ctx.beta.square();
    // At the combined level the worker coordinate of the identity is
    // the interpolation of w_Y^r, i.e. Y itself.
    let w = [combined.a, combined.b, combined.c];
    let num = permutation_numerator(
        &w,
        ctx.zeta_y,
        ctx.zeta_x,
        ctx.coset_shift,
        ctx.beta,
        ctx.gamma,
    );
    let mu = ctx.alpha
        * combined.z_omega
        * (combined.a + ctx.beta * combined.sy0 + beta_sq * combined.sx0 + ctx.gamma)
        * (combined.b + ctx.beta * combined.sy1 + beta_sq * combined.sx1 + ctx.gamma);

    let mut q = [F::zero(); NUM_SELECTORS];
    q[QL] = combined.a;
    q[QR] = combined.b;
    q[QM] = combined.a * combined.b;
    q[QO] = combined.c;
    q[QK] = F::one();

    let alpha_sq = ctx.alpha.square();
    LinearizationCoeffs {
        q,
        c: mu,
        sy2: mu * ctx.beta,
        sx2: mu * beta_sq,
        z: alpha_sq * ctx.lagrange_first - ctx.alpha * num,
        h: [
            -ctx.vanishing,
            -ctx.vanishing * ctx.chunk_shift,
            -ctx.vanishing * ctx.chunk_shift.square(),
        ],
    }
}

/// Value of the linearisation polynomial slice of one rank at
/// `zeta_x`, computed from that rank's opened evaluations.
pub fn linearization_row<F: PrimeField>(
    coeffs: &LinearizationCoeffs<F>,
    evals: &RankEvals<F>,
) -> F {
    let mut acc = F::zero();
    for i in 0..NUM_SELECTORS {
        acc += coeffs.q[i] * evals.q[i];
    }
    acc += coeffs.c * evals.c + coeffs.sy2 * evals.sy[2] + coeffs.sx2 * evals.sx[2];
    acc += coeffs.z * evals.z;
    for i in 0..3 {
        acc += coeffs.h[i] * evals.h[i];
    }
    acc
}
