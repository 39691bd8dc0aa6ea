//! Single-process verifier: transcript replay, per-rank identity
//! checks, and one combined multi-pairing over the two commitment
//! layers.

use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::{Field, One, Zero};
use ark_poly::EvaluationDomain;

use arithmetic::{barycentric_eval, lagrange_eval, lagrange_evals_prefix};
use subroutines::Transcript;

use crate::errors::{GpianoError, VerificationError};
use crate::relation::{
    linearization_coeffs, linearization_row, rank_identity, CombinedEvals, RelationContext,
};
use crate::structs::{Proof, VerifyingKey};
use crate::transcript_init;

pub fn verify<E: Pairing>(
    proof: &Proof<E>,
    vk: &VerifyingKey<E>,
    public_witness: &[E::ScalarField],
) -> Result<(), GpianoError> {
    type F<E> = <E as Pairing>::ScalarField;

    if public_witness.len() != vk.nb_public_witness() {
        return Err(GpianoError::InvalidWitness(format!(
            "{} public values, key expects {}",
            public_witness.len(),
            vk.nb_public_witness()
        )));
    }
    let world_size = vk.size_y as usize;
    let n = vk.size_x as usize;
    if !proof.evals.is_consistent() || proof.evals.world_size() != world_size {
        return Err(GpianoError::ProtocolMismatch(
            "evaluation tables do not match the worker count".to_string(),
        ));
    }
    let outer_domain = vk.outer_domain()?;
    let inner_domain = vk.inner_domain()?;
    let kzg = vk.kzg_srs()?;
    let dkzg = vk.dkzg_srs()?;

    // -----------------------------------------------------------------------
    // transcript replay
    // -----------------------------------------------------------------------
    let mut transcript: Transcript = transcript_init(vk, public_witness)?;
    transcript.append_serializable(b"a", &proof.a)?;
    transcript.append_serializable(b"b", &proof.b)?;
    transcript.append_serializable(b"c", &proof.c)?;
    let beta: F<E> = transcript.challenge_field(b"beta");
    let gamma: F<E> = transcript.challenge_field(b"gamma");
    transcript.append_serializable(b"z", &proof.z)?;
    transcript.append_serializable(b"zy", &proof.zy)?;
    let alpha: F<E> = transcript.challenge_field(b"alpha");
    transcript.append_serializable(b"h1", &proof.h[0])?;
    transcript.append_serializable(b"h2", &proof.h[1])?;
    transcript.append_serializable(b"h3", &proof.h[2])?;
    let zeta_x: F<E> = transcript.challenge_outside_domain(b"zeta_x", n as u64);
    let zeta_y: F<E> = transcript.challenge_outside_domain(b"zeta_y", world_size as u64);
    proof.evals.absorb(&mut transcript)?;

    let combined = CombinedEvals {
        a: barycentric_eval(&proof.evals.a, &outer_domain, &zeta_y),
        b: barycentric_eval(&proof.evals.b, &outer_domain, &zeta_y),
        c: barycentric_eval(&proof.evals.c, &outer_domain, &zeta_y),
        sy0: barycentric_eval(&proof.evals.sy[0], &outer_domain, &zeta_y),
        sx0: barycentric_eval(&proof.evals.sx[0], &outer_domain, &zeta_y),
        sy1: barycentric_eval(&proof.evals.sy[1], &outer_domain, &zeta_y),
        sx1: barycentric_eval(&proof.evals.sx[1], &outer_domain, &zeta_y),
        z_omega: barycentric_eval(&proof.evals.z_omega, &outer_domain, &zeta_y),
    };
    combined.absorb(&mut transcript)?;
    let v: F<E> = transcript.challenge_field(b"v");
    transcript.append_serializable(b"batch_opening", &proof.batch_opening)?;
    transcript.append_serializable(b"shift_opening", &proof.shift_opening)?;
    transcript.append_serializable(b"outer_opening", &proof.outer_opening)?;
    transcript.append_serializable(b"outer_eval", &proof.outer_eval)?;
    let rho: F<E> = transcript.challenge_field(b"rho");

    // -----------------------------------------------------------------------
    // permutation-argument boundaries
    // -----------------------------------------------------------------------
    if proof.evals.zy[0] != F::<E>::one() {
        return Err(VerificationError::Permutation.into());
    }
    let zy_commit = kzg.commit(&outer_domain.ifft(&proof.evals.zy))?;
    if zy_commit != proof.zy {
        return Err(VerificationError::Permutation.into());
    }

    // -----------------------------------------------------------------------
    // per-rank quotient identity
    // -----------------------------------------------------------------------
    let ctx = RelationContext {
        alpha,
        beta,
        gamma,
        zeta_x,
        zeta_y,
        coset_shift: vk.coset_shift,
        vanishing: zeta_x.pow([n as u64]) - F::<E>::one(),
        lagrange_first: lagrange_eval(&inner_domain, 0, &zeta_x),
        lagrange_last: lagrange_eval(&inner_domain, n - 1, &zeta_x),
        chunk_shift: zeta_x.pow([n as u64 + 2]),
    };

    let public_eval: F<E> = if public_witness.is_empty() {
        F::<E>::zero()
    } else {
        lagrange_evals_prefix(&inner_domain, &zeta_x, public_witness.len())
            .iter()
            .zip(public_witness.iter())
            .map(|(l, x)| *l * x)
            .sum()
    };

    let mut id_y = F::<E>::one();
    for r in 0..world_size {
        let evals = proof.evals.rank(r);
        let zy = proof.evals.zy[r];
        let zy_next = if r + 1 < world_size {
            proof.evals.zy[r + 1]
        } else {
            F::<E>::one()
        };
        let pi = if r == 0 { public_eval } else { F::<E>::zero() };
        if !rank_identity(&ctx, r, id_y, &evals, zy, zy_next, pi).is_zero() {
            return Err(VerificationError::Quotient(r).into());
        }
        id_y *= vk.generator_y;
    }

    // -----------------------------------------------------------------------
    // linearisation and batched openings
    // -----------------------------------------------------------------------
    let lin = linearization_coeffs(&ctx, &combined);

    // [r] is a linear combination of verifying-key digests and proof
    // commitments; its per-rank values derive from the tables.
    let lin_points: Vec<E::G1Affine> = vec![
        vk.q[0], vk.q[1], vk.q[2], vk.q[3], vk.q[4],
        proof.c, vk.sy[2], vk.sx[2], proof.z,
        proof.h[0], proof.h[1], proof.h[2],
    ];
    let lin_scalars: Vec<F<E>> = vec![
        lin.q[0], lin.q[1], lin.q[2], lin.q[3], lin.q[4],
        lin.c, lin.sy2, lin.sx2, lin.z,
        lin.h[0], lin.h[1], lin.h[2],
    ];
    let lin_commit = E::G1::msm(&lin_points, &lin_scalars).map_err(|_| {
        GpianoError::Configuration("linearisation fold".to_string())
    })?;

    // fold order: lin, a, b, c, sy, sx, q, h, z (+ z_omega outer-only)
    let commitments: Vec<E::G1> = {
        let mut points: Vec<E::G1> = vec![
            lin_commit,
            proof.a.into_group(),
            proof.b.into_group(),
            proof.c.into_group(),
        ];
        points.extend(vk.sy.iter().map(|p| p.into_group()));
        points.extend(vk.sx.iter().map(|p| p.into_group()));
        points.extend(vk.q.iter().map(|p| p.into_group()));
        points.extend(proof.h.iter().map(|p| p.into_group()));
        points.push(proof.z.into_group());
        points
    };

    let mut inner_rows = Vec::with_capacity(world_size);
    let mut outer_rows = Vec::with_capacity(world_size);
    for r in 0..world_size {
        let evals = proof.evals.rank(r);
        let mut values = vec![linearization_row(&lin, &evals)];
        values.push(evals.a);
        values.push(evals.b);
        values.push(evals.c);
        values.extend_from_slice(&evals.sy);
        values.extend_from_slice(&evals.sx);
        values.extend_from_slice(&evals.q);
        values.extend_from_slice(&evals.h);
        values.push(evals.z);

        let mut acc = F::<E>::zero();
        let mut power = F::<E>::one();
        for value in &values {
            acc += power * value;
            power *= v;
        }
        inner_rows.push(acc);
        outer_rows.push(acc + power * evals.z_omega);
    }

    // value of the per-rank batched polynomial at zeta_y must match the
    // opening
    if barycentric_eval(&outer_rows, &outer_domain, &zeta_y) != proof.outer_eval {
        return Err(VerificationError::Opening.into());
    }

    let mut folded_commit = E::G1::zero();
    let mut power = F::<E>::one();
    for point in &commitments {
        folded_commit += *point * power;
        power *= v;
    }

    let u_inner = kzg.commit(&outer_domain.ifft(&inner_rows))?.into_group();
    let u_shift = kzg.commit(&outer_domain.ifft(&proof.evals.z_omega))?.into_group();
    let e_commit = kzg.commit(&outer_domain.ifft(&outer_rows))?.into_group();

    // one multi-pairing covers the zeta_x batch, the shifted opening
    // and the outer opening:
    //   e(P1 + rho P2, G2) = e(pi1 + rho pi2, s G2)
    //   e(P3, G2)          = e(pi3, t G2)
    let g = E::G1Affine::generator();
    let p1 = folded_commit - u_inner + proof.batch_opening.into_group() * zeta_x;
    let zeta_omega = zeta_x * vk.generator_x;
    let p2 = proof.z.into_group() - u_shift + proof.shift_opening.into_group() * zeta_omega;
    let p3 = e_commit - g * proof.outer_eval + proof.outer_opening.into_group() * zeta_y;

    let rho_sq = rho.square();
    let lhs = p1 + p2 * rho + p3 * rho_sq;
    let inner_proofs = proof.batch_opening.into_group() + proof.shift_opening.into_group() * rho;
    let outer_proof = proof.outer_opening.into_group() * rho_sq;

    let result = E::multi_pairing(
        [lhs, -inner_proofs, -outer_proof],
        [dkzg.g2[0], dkzg.g2[2], dkzg.g2[1]],
    );
    if !result.0.is_one() {
        return Err(VerificationError::Opening.into());
    }
    Ok(())
}
