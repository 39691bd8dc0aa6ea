//! Five-round SPMD prover.
//!
//! Every rank executes the same sequence of compute steps and
//! collective calls; the Fiat-Shamir transcript is replicated, so all
//! ranks derive identical challenges and no challenge ever travels over
//! the wire. Each round is a straight line: local work, then the fixed
//! collectives, then the absorptions.

use ark_ec::pairing::Pairing;
use ark_ff::{batch_inversion, Field, One, PrimeField, Zero};
use ark_poly::EvaluationDomain;
use ark_serialize::CanonicalSerialize;
use ark_std::rand::SeedableRng;
use ark_std::{end_timer, start_timer, UniformRand};
use rand_chacha::ChaCha20Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use arithmetic::{
    barycentric_eval, coset_lagrange_table, coset_vanishing_table, horner_eval, lagrange_eval,
};
use subroutines::pcs::commit_aggregate;
use subroutines::{all_gather, Transcript, Transport};

use crate::cs::SparseConstraintSystem;
use crate::errors::GpianoError;
use crate::relation::{
    gate_eval, linearization_coeffs, linearization_row, permutation_denominator,
    permutation_numerator, CombinedEvals, RelationContext,
};
use crate::structs::{
    Proof, ProofEvaluations, ProverConfig, ProvingKey, NUM_SELECTORS,
};
use crate::transcript_init;

/// Prove from a constraint system and a full witness: runs the solver
/// (or patches the solution under `force_execute`), extracts this
/// rank's wire columns and hands over to the round protocol.
pub fn prove<E: Pairing, C: Transport + ?Sized>(
    ccs: &SparseConstraintSystem<E::ScalarField>,
    pk: &ProvingKey<E>,
    full_witness: &[E::ScalarField],
    config: &ProverConfig,
    net: &mut C,
) -> Result<Proof<E>, GpianoError> {
    if ccs.nb_public_variables as u64 != pk.vk.nb_public_variables {
        return Err(GpianoError::ProtocolMismatch(
            "constraint system and proving key disagree on public variables".to_string(),
        ));
    }

    let solution = if config.force_execute {
        let mut rng = solver_rng(full_witness)?;
        ccs.solve(full_witness, Some(&mut rng))?
    } else {
        ccs.solve(full_witness, None)?
    };

    let n = pk.domain.size();
    let rank = net.rank();
    let mut columns: [Vec<E::ScalarField>; 3] =
        [Vec::with_capacity(n), Vec::with_capacity(n), Vec::with_capacity(n)];
    for j in 0..n {
        let (l, r, o) = ccs.wires_of_row(rank * n + j);
        columns[0].push(solution[l]);
        columns[1].push(solution[r]);
        columns[2].push(solution[o]);
    }

    let public_input = solution[..ccs.nb_public_variables].to_vec();
    run_rounds(pk, &columns, &public_input, net)
}

/// Prove from explicit per-rank witness columns, bypassing the
/// constraint solver. Used with [`crate::setup::setup_random`].
pub fn prove_direct<E: Pairing, C: Transport + ?Sized>(
    pk: &ProvingKey<E>,
    witnesses: &[Vec<E::ScalarField>; 3],
    public_input: &[E::ScalarField],
    _config: &ProverConfig,
    net: &mut C,
) -> Result<Proof<E>, GpianoError> {
    let n = pk.domain.size();
    for column in witnesses {
        if column.len() != n {
            return Err(GpianoError::InvalidWitness(format!(
                "witness column has {} rows, domain has {n}",
                column.len()
            )));
        }
    }
    if public_input.len() != pk.vk.nb_public_variables as usize {
        return Err(GpianoError::InvalidWitness(format!(
            "{} public inputs, key expects {}",
            public_input.len(),
            pk.vk.nb_public_variables
        )));
    }
    run_rounds(pk, witnesses, public_input, net)
}

fn solver_rng<F: PrimeField>(witness: &[F]) -> Result<ChaCha20Rng, GpianoError> {
    let transcript = Transcript::new(b"gpiano solver");
    let mut bytes = Vec::new();
    witness.to_vec().serialize_compressed(&mut bytes)?;
    Ok(ChaCha20Rng::from_seed(transcript.fork_seed(b"force", &bytes)))
}

/// Append `(b_1 X + b_0) Z_H` to hide two openings of a witness
/// polynomial.
fn blind_two<F: PrimeField>(mut coeffs: Vec<F>, n: usize, rng: &mut ChaCha20Rng) -> Vec<F> {
    let b0 = F::rand(rng);
    let b1 = F::rand(rng);
    coeffs.resize(n + 2, F::zero());
    coeffs[0] -= b0;
    coeffs[1] -= b1;
    coeffs[n] += b0;
    coeffs[n + 1] += b1;
    coeffs
}

/// Append `(b_2 X^2 + b_1 X + b_0) Z_H` to hide the accumulator's two
/// opening points.
fn blind_three<F: PrimeField>(mut coeffs: Vec<F>, n: usize, rng: &mut ChaCha20Rng) -> Vec<F> {
    let b0 = F::rand(rng);
    let b1 = F::rand(rng);
    let b2 = F::rand(rng);
    coeffs.resize(n + 3, F::zero());
    coeffs[0] -= b0;
    coeffs[1] -= b1;
    coeffs[2] -= b2;
    coeffs[n] += b0;
    coeffs[n + 1] += b1;
    coeffs[n + 2] += b2;
    coeffs
}

fn run_rounds<E: Pairing, C: Transport + ?Sized>(
    pk: &ProvingKey<E>,
    witnesses: &[Vec<E::ScalarField>; 3],
    public_input: &[E::ScalarField],
    net: &mut C,
) -> Result<Proof<E>, GpianoError> {
    type F<E> = <E as Pairing>::ScalarField;

    let vk = &pk.vk;
    let n = pk.domain.size();
    let world_size = net.world_size();
    let rank = net.rank();
    if world_size as u64 != vk.size_y {
        return Err(GpianoError::ProtocolMismatch(format!(
            "cluster has {world_size} ranks, key was set up for {}",
            vk.size_y
        )));
    }
    let dkzg = vk.dkzg_srs()?;
    let kzg = vk.kzg_srs()?;
    let domain = pk.domain;
    let big = pk.domain_big;
    let outer_domain = vk.outer_domain()?;
    let u = vk.coset_shift;

    let mut transcript = transcript_init(vk, public_input)?;

    // Blinding is derived, not sampled: a transcript fork seeded with
    // the rank and the witness keeps repeated runs byte-identical.
    let mut seed_extra = Vec::new();
    seed_extra.extend_from_slice(&(rank as u64).to_le_bytes());
    for column in witnesses {
        column.serialize_compressed(&mut seed_extra)?;
    }
    let mut blind_rng = ChaCha20Rng::from_seed(transcript.fork_seed(b"blinding", &seed_extra));

    // =======================================================================
    // Round 1: witness polynomials a, b, c
    // =======================================================================
    let step = start_timer!(|| "round 1: witness commitments");

    let a = blind_two(domain.ifft(&witnesses[0]), n, &mut blind_rng);
    let b = blind_two(domain.ifft(&witnesses[1]), n, &mut blind_rng);
    let c = blind_two(domain.ifft(&witnesses[2]), n, &mut blind_rng);

    let commit_a = commit_aggregate::<E, _>(net, dkzg.commit_partial(&a)?)?;
    let commit_b = commit_aggregate::<E, _>(net, dkzg.commit_partial(&b)?)?;
    let commit_c = commit_aggregate::<E, _>(net, dkzg.commit_partial(&c)?)?;
    transcript.append_serializable(b"a", &commit_a)?;
    transcript.append_serializable(b"b", &commit_b)?;
    transcript.append_serializable(b"c", &commit_c)?;

    end_timer!(step);

    // =======================================================================
    // Round 2: permutation accumulators
    // =======================================================================
    let step = start_timer!(|| "round 2: permutation accumulators");

    let beta: F<E> = transcript.challenge_field(b"beta");
    let gamma: F<E> = transcript.challenge_field(b"gamma");

    // Lagrange values of the permutation polynomials, rebuilt from the
    // permutation tables.
    let mut id_ys = Vec::with_capacity(world_size);
    let mut acc = F::<E>::one();
    for _ in 0..world_size {
        id_ys.push(acc);
        acc *= vk.generator_y;
    }
    let mut id_xs = Vec::with_capacity(3 * n);
    let mut shift = F::<E>::one();
    for _ in 0..3 {
        let mut acc = shift;
        for _ in 0..n {
            id_xs.push(acc);
            acc *= vk.generator_x;
        }
        shift *= u;
    }
    let sy_lag: Vec<Vec<F<E>>> = (0..3)
        .map(|k| {
            (0..n)
                .map(|i| id_ys[pk.permutation_y[k * n + i] as usize])
                .collect()
        })
        .collect();
    let sx_lag: Vec<Vec<F<E>>> = (0..3)
        .map(|k| {
            (0..n)
                .map(|i| id_xs[pk.permutation_x[k * n + i] as usize])
                .collect()
        })
        .collect();

    let id_y = id_ys[rank];
    let mut numerators = Vec::with_capacity(n);
    let mut denominators = Vec::with_capacity(n);
    for i in 0..n {
        let w = [witnesses[0][i], witnesses[1][i], witnesses[2][i]];
        numerators.push(permutation_numerator(
            &w,
            id_y,
            domain.element(i),
            u,
            beta,
            gamma,
        ));
        denominators.push(permutation_denominator(
            &w,
            &[sy_lag[0][i], sy_lag[1][i], sy_lag[2][i]],
            &[sx_lag[0][i], sx_lag[1][i], sx_lag[2][i]],
            beta,
            gamma,
        ));
    }
    batch_inversion(&mut denominators);
    let ratios: Vec<F<E>> = numerators
        .iter()
        .zip(denominators.iter())
        .map(|(num, den_inv)| *num * den_inv)
        .collect();

    let mut local_product = F::<E>::one();
    for ratio in &ratios {
        local_product *= ratio;
    }
    let products: Vec<F<E>> = all_gather(net, &local_product)?;

    // Outer prefix products: zy[r] = prod_{r' < r} P_{r'}
    let mut zy_vals = Vec::with_capacity(world_size);
    let mut acc = F::<E>::one();
    for product in products.iter() {
        zy_vals.push(acc);
        acc *= product;
    }

    // Effective inner accumulator, prefixed with this rank's zy.
    let mut z_vals = Vec::with_capacity(n);
    let mut acc = zy_vals[rank];
    for ratio in &ratios {
        z_vals.push(acc);
        acc *= ratio;
    }
    let z = blind_three(domain.ifft(&z_vals), n, &mut blind_rng);
    let commit_z = commit_aggregate::<E, _>(net, dkzg.commit_partial(&z)?)?;

    let zy_coeffs = outer_domain.ifft(&zy_vals);
    let commit_zy = kzg.commit(&zy_coeffs)?;
    transcript.append_serializable(b"z", &commit_z)?;
    transcript.append_serializable(b"zy", &commit_zy)?;

    end_timer!(step);

    // =======================================================================
    // Round 3: quotient on the big coset
    // =======================================================================
    let step = start_timer!(|| "round 3: quotient");

    let alpha: F<E> = transcript.challenge_field(b"alpha");
    let m = big.size();
    let rotation = m / n;

    let a_big = big.fft(&a);
    let b_big = big.fft(&b);
    let c_big = big.fft(&c);
    let z_big = big.fft(&z);
    let q_big: Vec<Vec<F<E>>> = pk.q.iter().map(|q| big.fft(q)).collect();
    let sy_big: Vec<Vec<F<E>>> = pk.sy.iter().map(|s| big.fft(s)).collect();
    let sx_big: Vec<Vec<F<E>>> = pk.sx.iter().map(|s| big.fft(s)).collect();

    let pi_big = if rank == 0 && !public_input.is_empty() {
        let mut pi_lag = vec![F::<E>::zero(); n];
        pi_lag[..public_input.len()].copy_from_slice(public_input);
        big.fft(&domain.ifft(&pi_lag))
    } else {
        vec![F::<E>::zero(); m]
    };

    let mut vanishing = coset_vanishing_table(n, &big);
    let lagrange_first = coset_lagrange_table(&domain, &big, 0, &vanishing);
    let lagrange_last = coset_lagrange_table(&domain, &big, n - 1, &vanishing);
    batch_inversion(&mut vanishing);

    let mut points = Vec::with_capacity(m);
    let mut acc = big.coset_offset();
    for _ in 0..m {
        points.push(acc);
        acc *= big.group_gen;
    }

    let zy_here = zy_vals[rank];
    let zy_next = if rank + 1 < world_size {
        zy_vals[rank + 1]
    } else {
        F::<E>::one()
    };
    let alpha_sq = alpha.square();

    let quotient_at = |j: usize| -> F<E> {
        let w = [a_big[j], b_big[j], c_big[j]];
        let q_row = [
            q_big[0][j], q_big[1][j], q_big[2][j], q_big[3][j], q_big[4][j],
        ];
        let gate = gate_eval(&q_row, w[0], w[1], w[2], pi_big[j]);

        let num = permutation_numerator(&w, id_y, points[j], u, beta, gamma);
        let den = permutation_denominator(
            &w,
            &[sy_big[0][j], sy_big[1][j], sy_big[2][j]],
            &[sx_big[0][j], sx_big[1][j], sx_big[2][j]],
            beta,
            gamma,
        );
        let z_here = z_big[j];
        let z_next = z_big[(j + rotation) % m];
        let perm = z_next * den - z_here * num + lagrange_last[j] * den * (zy_next - zy_here);

        let inner_boundary = lagrange_first[j] * (z_here - zy_here);
        let mut t = gate + alpha * perm + alpha_sq * inner_boundary;
        if rank == 0 {
            t += alpha_sq * alpha * lagrange_first[j] * (z_here - F::<E>::one());
        }
        t * vanishing[j]
    };
    #[cfg(feature = "parallel")]
    let h_evals: Vec<F<E>> = (0..m).into_par_iter().map(quotient_at).collect();
    #[cfg(not(feature = "parallel"))]
    let h_evals: Vec<F<E>> = (0..m).map(quotient_at).collect();

    let mut h_coeffs = big.ifft(&h_evals);
    h_coeffs.truncate(3 * (n + 2));
    h_coeffs.resize(3 * (n + 2), F::<E>::zero());
    let mut h1 = h_coeffs[..n + 2].to_vec();
    let mut h2 = h_coeffs[n + 2..2 * (n + 2)].to_vec();
    let mut h3 = h_coeffs[2 * (n + 2)..].to_vec();
    // cross-term chunk blinding, value-preserving under recombination
    let bb1 = F::<E>::rand(&mut blind_rng);
    let bb2 = F::<E>::rand(&mut blind_rng);
    h1.push(bb1);
    h2[0] -= bb1;
    h2.push(bb2);
    h3[0] -= bb2;

    let commit_h1 = commit_aggregate::<E, _>(net, dkzg.commit_partial(&h1)?)?;
    let commit_h2 = commit_aggregate::<E, _>(net, dkzg.commit_partial(&h2)?)?;
    let commit_h3 = commit_aggregate::<E, _>(net, dkzg.commit_partial(&h3)?)?;
    transcript.append_serializable(b"h1", &commit_h1)?;
    transcript.append_serializable(b"h2", &commit_h2)?;
    transcript.append_serializable(b"h3", &commit_h3)?;

    end_timer!(step);

    // =======================================================================
    // Round 4: evaluations at (zeta_y, zeta_x)
    // =======================================================================
    let step = start_timer!(|| "round 4: evaluations");

    let zeta_x: F<E> = transcript.challenge_outside_domain(b"zeta_x", n as u64);
    let zeta_y: F<E> = transcript.challenge_outside_domain(b"zeta_y", world_size as u64);

    // Local evaluations, gathered in one fixed-order exchange:
    // a, b, c, sy, sx, q, h, z, z(omega zeta).
    let mut local = Vec::with_capacity(19);
    local.push(horner_eval(&a, &zeta_x));
    local.push(horner_eval(&b, &zeta_x));
    local.push(horner_eval(&c, &zeta_x));
    for k in 0..3 {
        local.push(horner_eval(&pk.sy[k], &zeta_x));
    }
    for k in 0..3 {
        local.push(horner_eval(&pk.sx[k], &zeta_x));
    }
    for k in 0..NUM_SELECTORS {
        local.push(horner_eval(&pk.q[k], &zeta_x));
    }
    local.push(horner_eval(&h1, &zeta_x));
    local.push(horner_eval(&h2, &zeta_x));
    local.push(horner_eval(&h3, &zeta_x));
    local.push(horner_eval(&z, &zeta_x));
    local.push(horner_eval(&z, &(zeta_x * vk.generator_x)));

    let gathered: Vec<Vec<F<E>>> = all_gather(net, &local)?;
    let column = |idx: usize| -> Vec<F<E>> { gathered.iter().map(|row| row[idx]).collect() };
    let evals = ProofEvaluations {
        a: column(0),
        b: column(1),
        c: column(2),
        sy: [column(3), column(4), column(5)],
        sx: [column(6), column(7), column(8)],
        q: [column(9), column(10), column(11), column(12), column(13)],
        h: [column(14), column(15), column(16)],
        z: column(17),
        z_omega: column(18),
        zy: zy_vals.clone(),
    };
    evals.absorb(&mut transcript)?;

    let combined = CombinedEvals {
        a: barycentric_eval(&evals.a, &outer_domain, &zeta_y),
        b: barycentric_eval(&evals.b, &outer_domain, &zeta_y),
        c: barycentric_eval(&evals.c, &outer_domain, &zeta_y),
        sy0: barycentric_eval(&evals.sy[0], &outer_domain, &zeta_y),
        sx0: barycentric_eval(&evals.sx[0], &outer_domain, &zeta_y),
        sy1: barycentric_eval(&evals.sy[1], &outer_domain, &zeta_y),
        sx1: barycentric_eval(&evals.sx[1], &outer_domain, &zeta_y),
        z_omega: barycentric_eval(&evals.z_omega, &outer_domain, &zeta_y),
    };
    combined.absorb(&mut transcript)?;

    end_timer!(step);

    // =======================================================================
    // Round 5: batched openings
    // =======================================================================
    let step = start_timer!(|| "round 5: openings");

    let v: F<E> = transcript.challenge_field(b"v");

    let ctx = RelationContext {
        alpha,
        beta,
        gamma,
        zeta_x,
        zeta_y,
        coset_shift: u,
        vanishing: zeta_x.pow([n as u64]) - F::<E>::one(),
        lagrange_first: lagrange_eval(&domain, 0, &zeta_x),
        lagrange_last: lagrange_eval(&domain, n - 1, &zeta_x),
        chunk_shift: zeta_x.pow([n as u64 + 2]),
    };
    let lin = linearization_coeffs(&ctx, &combined);

    // This rank's linearisation slice; the coefficients are global, so
    // the Lagrange combination of the slices is the polynomial whose
    // commitment the verifier derives from the digests.
    let mut lin_slice = vec![F::<E>::zero(); n + 3];
    let mut add_scaled = |dst: &mut Vec<F<E>>, src: &[F<E>], scale: F<E>| {
        for (d, s) in dst.iter_mut().zip(src.iter()) {
            *d += scale * s;
        }
    };
    for k in 0..NUM_SELECTORS {
        add_scaled(&mut lin_slice, &pk.q[k], lin.q[k]);
    }
    add_scaled(&mut lin_slice, &c, lin.c);
    add_scaled(&mut lin_slice, &pk.sy[2], lin.sy2);
    add_scaled(&mut lin_slice, &pk.sx[2], lin.sx2);
    add_scaled(&mut lin_slice, &z, lin.z);
    add_scaled(&mut lin_slice, &h1, lin.h[0]);
    add_scaled(&mut lin_slice, &h2, lin.h[1]);
    add_scaled(&mut lin_slice, &h3, lin.h[2]);

    // Fold order: lin, a, b, c, sy, sx, q, h, z (z at the shifted point
    // opens separately; it joins only the outer batch).
    let rows: Vec<&[F<E>]> = {
        let mut rows: Vec<&[F<E>]> = vec![&lin_slice, &a, &b, &c];
        for k in 0..3 {
            rows.push(&pk.sy[k]);
        }
        for k in 0..3 {
            rows.push(&pk.sx[k]);
        }
        for k in 0..NUM_SELECTORS {
            rows.push(&pk.q[k]);
        }
        rows.push(&h1);
        rows.push(&h2);
        rows.push(&h3);
        rows.push(&z);
        rows
    };
    let mut folded = vec![F::<E>::zero(); n + 3];
    let mut power = F::<E>::one();
    for row in &rows {
        for (dst, src) in folded.iter_mut().zip(row.iter()) {
            *dst += power * src;
        }
        power *= v;
    }

    let (_, batch_partial) = dkzg.open_partial(&folded, &zeta_x)?;
    let batch_opening = commit_aggregate::<E, _>(net, batch_partial)?;
    let (_, shift_partial) = dkzg.open_partial(&z, &(zeta_x * vk.generator_x))?;
    let shift_opening = commit_aggregate::<E, _>(net, shift_partial)?;

    // Outer batch: the same rows as per-rank scalars, plus the shifted
    // accumulator, interpolated over the outer domain and opened at
    // zeta_y.
    let mut outer_rows = Vec::with_capacity(world_size);
    for r in 0..world_size {
        let rank_evals = evals.rank(r);
        let mut row_values = vec![linearization_row(&lin, &rank_evals)];
        row_values.push(rank_evals.a);
        row_values.push(rank_evals.b);
        row_values.push(rank_evals.c);
        row_values.extend_from_slice(&rank_evals.sy);
        row_values.extend_from_slice(&rank_evals.sx);
        row_values.extend_from_slice(&rank_evals.q);
        row_values.extend_from_slice(&rank_evals.h);
        row_values.push(rank_evals.z);
        row_values.push(rank_evals.z_omega);
        let mut acc = F::<E>::zero();
        let mut power = F::<E>::one();
        for value in row_values {
            acc += power * value;
            power *= v;
        }
        outer_rows.push(acc);
    }
    let outer_coeffs = outer_domain.ifft(&outer_rows);
    let (outer_eval, outer_opening) = kzg.open(&outer_coeffs, &zeta_y)?;

    end_timer!(step);

    Ok(Proof {
        a: commit_a,
        b: commit_b,
        c: commit_c,
        z: commit_z,
        zy: commit_zy,
        h: [commit_h1, commit_h2, commit_h3],
        evals,
        batch_opening,
        shift_opening,
        outer_opening,
        outer_eval,
    })
}
