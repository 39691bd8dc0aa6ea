//! Key generation: compiles a sharded constraint system into per-worker
//! proving keys and a replicated verifying key.

use ark_ec::pairing::Pairing;
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, FftField, Field, One, PrimeField, Zero};
use ark_poly::{EvaluationDomain, Radix2EvaluationDomain};
use ark_std::rand::{CryptoRng, RngCore};
use ark_std::{end_timer, start_timer, UniformRand};

use subroutines::pcs::commit_aggregate;
use subroutines::{broadcast_from_root, DkzgSrs, KzgSrs, Transport};

use crate::cs::SparseConstraintSystem;
use crate::errors::GpianoError;
use crate::structs::{ProvingKey, VerifyingKey, NUM_SELECTORS, QL};

/// Compile `ccs` plus the public witness into this rank's proving key
/// and the replicated verifying key.
///
/// Rank 0 samples the toxic waste and distributes it; every rank then
/// derives both SRS deterministically, so the keys agree across the
/// cluster without further exchange beyond the digest reductions.
pub fn setup<E, C, R>(
    ccs: &SparseConstraintSystem<E::ScalarField>,
    public_witness: &[E::ScalarField],
    rng: &mut R,
    net: &mut C,
) -> Result<(ProvingKey<E>, VerifyingKey<E>), GpianoError>
where
    E: Pairing,
    C: Transport + ?Sized,
    R: RngCore + CryptoRng,
{
    let step = start_timer!(|| "setup");
    let world_size = net.world_size();
    let rank = net.rank();
    let outer_domain = outer_domain::<E::ScalarField>(world_size)?;

    let p = ccs.nb_public_variables;
    if public_witness.len() != p {
        return Err(GpianoError::InvalidWitness(format!(
            "{} public values, circuit has {p} public variables",
            public_witness.len()
        )));
    }
    let size_system = (ccs.constraints.len() + p).div_ceil(world_size);
    if size_system < p {
        return Err(GpianoError::Configuration(
            "public variables do not fit in a single shard".to_string(),
        ));
    }
    let domain: Radix2EvaluationDomain<E::ScalarField> = Radix2EvaluationDomain::new(size_system)
        .ok_or_else(|| GpianoError::Configuration("inner domain".to_string()))?;
    let n = domain.size();
    let big = big_domain::<E::ScalarField>(n)?;

    let (t, s) = exchange_toxic_waste::<E::ScalarField, _, _>(
        world_size as u64,
        n as u64,
        rng,
        net,
    )?;
    let kzg = KzgSrs::<E>::generate(&t, world_size)?;
    let dkzg = DkzgSrs::<E>::generate(&t, &s, &outer_domain.group_gen, rank, world_size, n + 3)?;

    // Selector rows: [ placeholders | constraints ], sharded row-major.
    // The committed q_k keeps zeros on the public prefix; the prover
    // and verifier complete the gate with the public-input polynomial.
    let mut q: [Vec<E::ScalarField>; NUM_SELECTORS] =
        core::array::from_fn(|_| vec![E::ScalarField::zero(); n]);
    let offset = if rank == 0 {
        for i in 0..p {
            q[QL][i] = -E::ScalarField::one();
        }
        p
    } else {
        0
    };
    let start = rank * n + offset;
    let end = (start - offset + n).min(ccs.constraints.len() + p);
    for i in start..end {
        let row = ccs.selector_row(&ccs.constraints[i - p]);
        for (k, value) in row.into_iter().enumerate() {
            q[k][i - rank * n] = value;
        }
    }
    let q = q.map(|column| domain.ifft(&column));

    let (permutation_y, permutation_x) = build_permutation(ccs, rank, world_size, n);
    let (sy, sx) = permutation_polynomials::<E::ScalarField>(
        &permutation_y,
        &permutation_x,
        &outer_domain,
        &domain,
    );

    let keys = finish(
        net,
        &outer_domain,
        domain,
        big,
        p as u64,
        kzg,
        dkzg,
        q,
        sy,
        sx,
        permutation_y,
        permutation_x,
    );
    end_timer!(step);
    keys
}

/// Random-selector setup for benchmarking: random gates and witnesses
/// with `q_k` completing each row, identity permutation, keys plus the
/// per-rank witness columns and the shared public inputs.
///
/// Requires `nb_constraints` to split exactly into power-of-two shards
/// so the identity permutation covers every row.
#[allow(clippy::type_complexity)]
pub fn setup_random<E, C, R>(
    nb_constraints: usize,
    nb_public: usize,
    rng: &mut R,
    net: &mut C,
) -> Result<
    (
        ProvingKey<E>,
        VerifyingKey<E>,
        [Vec<E::ScalarField>; 3],
        Vec<E::ScalarField>,
    ),
    GpianoError,
>
where
    E: Pairing,
    C: Transport + ?Sized,
    R: RngCore + CryptoRng,
{
    let world_size = net.world_size();
    let rank = net.rank();
    let outer_domain = outer_domain::<E::ScalarField>(world_size)?;

    let size_system = nb_constraints / world_size;
    if size_system * world_size != nb_constraints || !size_system.is_power_of_two() {
        return Err(GpianoError::Configuration(format!(
            "{nb_constraints} constraints do not split into power-of-two shards over {world_size} workers"
        )));
    }
    if nb_public > size_system {
        return Err(GpianoError::Configuration(
            "public variables do not fit in a single shard".to_string(),
        ));
    }
    let domain: Radix2EvaluationDomain<E::ScalarField> = Radix2EvaluationDomain::new(size_system)
        .ok_or_else(|| GpianoError::Configuration("inner domain".to_string()))?;
    let n = domain.size();
    let big = big_domain::<E::ScalarField>(n)?;

    let (t, s) = exchange_toxic_waste::<E::ScalarField, _, _>(
        world_size as u64,
        n as u64,
        rng,
        net,
    )?;
    let kzg = KzgSrs::<E>::generate(&t, world_size)?;
    let dkzg = DkzgSrs::<E>::generate(&t, &s, &outer_domain.group_gen, rank, world_size, n + 3)?;

    let witnesses: [Vec<E::ScalarField>; 3] =
        core::array::from_fn(|_| (0..n).map(|_| E::ScalarField::rand(rng)).collect());
    let mut q: [Vec<E::ScalarField>; NUM_SELECTORS] =
        core::array::from_fn(|_| vec![E::ScalarField::zero(); n]);
    for i in 0..n {
        for column in q.iter_mut().take(4) {
            column[i] = E::ScalarField::rand(rng);
        }
        let [ql, qr, qm, qo, _] = core::array::from_fn(|k| q[k][i]);
        let (a, b, c) = (witnesses[0][i], witnesses[1][i], witnesses[2][i]);
        q[4][i] = -(ql * a + qr * b + qm * a * b + qo * c);
    }

    // The public inputs are rank 0's leading L-wires; everyone needs
    // the same values for the replicated transcript.
    let mut public_input = witnesses[0][..nb_public].to_vec();
    broadcast_from_root(net, &mut public_input)?;
    if rank == 0 {
        for i in 0..nb_public {
            q[4][i] -= witnesses[0][i];
        }
    }

    let q = q.map(|column| domain.ifft(&column));

    let permutation_y = vec![rank as i64; 3 * n];
    let permutation_x: Vec<i64> = (0..3 * n as i64).collect();
    let (sy, sx) = permutation_polynomials::<E::ScalarField>(
        &permutation_y,
        &permutation_x,
        &outer_domain,
        &domain,
    );

    let (pk, vk) = finish(
        net,
        &outer_domain,
        domain,
        big,
        nb_public as u64,
        kzg,
        dkzg,
        q,
        sy,
        sx,
        permutation_y,
        permutation_x,
    )?;
    Ok((pk, vk, witnesses, public_input))
}

fn outer_domain<F: FftField>(
    world_size: usize,
) -> Result<Radix2EvaluationDomain<F>, GpianoError> {
    let domain = Radix2EvaluationDomain::new(world_size)
        .ok_or_else(|| GpianoError::Configuration("outer domain".to_string()))?;
    if domain.size() != world_size {
        return Err(GpianoError::Configuration(
            "world size is not a power of two".to_string(),
        ));
    }
    Ok(domain)
}

/// The quotient has degree `3n + 5`; the evaluation coset must be able
/// to interpolate it. `4n` for `n >= 8`, `8n` below.
fn big_domain<F: FftField>(n: usize) -> Result<Radix2EvaluationDomain<F>, GpianoError> {
    let size = (3 * (n + 2)).next_power_of_two();
    Radix2EvaluationDomain::new(size)
        .and_then(|d| d.get_coset(F::GENERATOR))
        .ok_or_else(|| GpianoError::Configuration("quotient domain".to_string()))
}

/// Rank 0 rejection-samples the two toxic scalars and sends them to
/// every other rank as length-prefixed big-endian bytes; everyone else
/// receives them. `t` avoids the outer roots of unity, `s` the inner
/// ones.
fn exchange_toxic_waste<F, C, R>(
    outer_order: u64,
    inner_order: u64,
    rng: &mut R,
    net: &mut C,
) -> Result<(F, F), GpianoError>
where
    F: PrimeField,
    C: Transport + ?Sized,
    R: RngCore + CryptoRng,
{
    if net.rank() == 0 {
        let t = sample_off_domain::<F, R>(outer_order, rng);
        let s = sample_off_domain::<F, R>(inner_order, rng);
        for dst in 1..net.world_size() {
            for scalar in [&t, &s] {
                let bytes = scalar.into_bigint().to_bytes_be();
                net.send(&[bytes.len() as u8], dst)?;
                net.send(&bytes, dst)?;
            }
        }
        Ok((t, s))
    } else {
        let mut scalars = [F::zero(); 2];
        for slot in scalars.iter_mut() {
            let len = net.recv(0)?;
            let bytes = net.recv(0)?;
            if len.len() != 1 || bytes.len() != len[0] as usize {
                return Err(GpianoError::ProtocolMismatch(
                    "malformed toxic-waste message".to_string(),
                ));
            }
            *slot = F::from_be_bytes_mod_order(&bytes);
        }
        Ok((scalars[0], scalars[1]))
    }
}

fn sample_off_domain<F: PrimeField, R: RngCore + CryptoRng>(order: u64, rng: &mut R) -> F {
    loop {
        let candidate = F::rand(rng);
        if candidate.pow([order]) != F::one() {
            return candidate;
        }
    }
}

/// Build this rank's permutation tables from the copy constraints.
///
/// Cells are addressed by the canonical `(slot, worker, row)` triple;
/// the flat index `slot * W * n + worker * n + row` exists only at this
/// boundary. The walk links every reoccurrence of a wire to its
/// previous position, then closes each cycle by sending the first
/// occurrence to the last.
pub(crate) fn build_permutation<F: PrimeField>(
    ccs: &SparseConstraintSystem<F>,
    rank: usize,
    world_size: usize,
    n: usize,
) -> (Vec<i64>, Vec<i64>) {
    let total = world_size * n;
    let p = ccs.nb_public_variables;

    // position -> wire id; rows without placeholders or constraints
    // stay on wire 0
    let mut lro = vec![0usize; 3 * total];
    for (i, cell) in lro.iter_mut().enumerate().take(p) {
        *cell = i;
    }
    for (ci, c) in ccs.constraints.iter().enumerate() {
        lro[p + ci] = c.l.wire;
        lro[total + p + ci] = c.r.wire;
        lro[2 * total + p + ci] = c.o.wire;
    }

    let parse = |g: usize| -> (usize, usize, usize) {
        let slot = g / total;
        let rem = g % total;
        (slot, rem / n, rem % n)
    };

    // wire id -> last position seen
    let mut cycle = vec![-1i64; ccs.nb_variables];
    let mut perm_y = vec![-1i64; 3 * n];
    let mut perm_x = vec![-1i64; 3 * n];
    for (i, &wire) in lro.iter().enumerate() {
        if cycle[wire] != -1 {
            let (pv, py, px) = parse(cycle[wire] as usize);
            let (cv, cy, cx) = parse(i);
            if cy == rank {
                perm_y[cv * n + cx] = py as i64;
                perm_x[cv * n + cx] = (pv * n + px) as i64;
            }
        }
        cycle[wire] = i as i64;
    }

    // close the cycles: first occurrences point at last occurrences
    for local in 0..3 * n {
        if perm_y[local] == -1 {
            let (slot, row) = (local / n, local % n);
            let g = slot * total + rank * n + row;
            let (tv, ty, tx) = parse(cycle[lro[g]] as usize);
            perm_y[local] = ty as i64;
            perm_x[local] = (tv * n + tx) as i64;
        }
    }
    (perm_y, perm_x)
}

/// Canonical forms of `S^y_k, S^x_k`: the Lagrange tables
/// `w_Y^{perm_y}` and `u^{v'} w_X^{x'}`, interpolated.
fn permutation_polynomials<F: FftField + PrimeField>(
    perm_y: &[i64],
    perm_x: &[i64],
    outer_domain: &Radix2EvaluationDomain<F>,
    domain: &Radix2EvaluationDomain<F>,
) -> ([Vec<F>; 3], [Vec<F>; 3]) {
    let n = domain.size();
    let world_size = outer_domain.size();

    let mut id_ys = Vec::with_capacity(world_size);
    let mut acc = F::one();
    for _ in 0..world_size {
        id_ys.push(acc);
        acc *= outer_domain.group_gen;
    }
    let mut id_xs = Vec::with_capacity(3 * n);
    let mut shift = F::one();
    for _ in 0..3 {
        let mut acc = shift;
        for _ in 0..n {
            id_xs.push(acc);
            acc *= domain.group_gen;
        }
        shift *= F::GENERATOR;
    }

    let sy = core::array::from_fn(|k| {
        domain.ifft(
            &(0..n)
                .map(|i| id_ys[perm_y[k * n + i] as usize])
                .collect::<Vec<_>>(),
        )
    });
    let sx = core::array::from_fn(|k| {
        domain.ifft(
            &(0..n)
                .map(|i| id_xs[perm_x[k * n + i] as usize])
                .collect::<Vec<_>>(),
        )
    });
    (sy, sx)
}

/// Commit the eleven fixed polynomials (one reduction each, in a fixed
/// order) and assemble the keys.
#[allow(clippy::too_many_arguments)]
fn finish<E, C>(
    net: &mut C,
    outer_domain: &Radix2EvaluationDomain<E::ScalarField>,
    domain: Radix2EvaluationDomain<E::ScalarField>,
    domain_big: Radix2EvaluationDomain<E::ScalarField>,
    nb_public_variables: u64,
    kzg: KzgSrs<E>,
    dkzg: DkzgSrs<E>,
    q: [Vec<E::ScalarField>; NUM_SELECTORS],
    sy: [Vec<E::ScalarField>; 3],
    sx: [Vec<E::ScalarField>; 3],
    permutation_y: Vec<i64>,
    permutation_x: Vec<i64>,
) -> Result<(ProvingKey<E>, VerifyingKey<E>), GpianoError>
where
    E: Pairing,
    C: Transport + ?Sized,
{
    let mut vk = VerifyingKey {
        size_y: outer_domain.size() as u64,
        size_x: domain.size() as u64,
        size_y_inv: outer_domain.size_inv,
        size_x_inv: domain.size_inv,
        generator_y: outer_domain.group_gen,
        generator_x: domain.group_gen,
        generator_x_inv: domain.group_gen_inv,
        coset_shift: E::ScalarField::GENERATOR,
        nb_public_variables,
        q: [E::G1Affine::zero(); NUM_SELECTORS],
        sy: [E::G1Affine::zero(); 3],
        sx: [E::G1Affine::zero(); 3],
        kzg: None,
        dkzg: None,
    };
    for k in 0..NUM_SELECTORS {
        vk.q[k] = commit_aggregate::<E, _>(net, dkzg.commit_partial(&q[k])?)?;
    }
    for k in 0..3 {
        vk.sy[k] = commit_aggregate::<E, _>(net, dkzg.commit_partial(&sy[k])?)?;
    }
    for k in 0..3 {
        vk.sx[k] = commit_aggregate::<E, _>(net, dkzg.commit_partial(&sx[k])?)?;
    }
    vk.kzg = Some(kzg);
    vk.dkzg = Some(dkzg);

    let pk = ProvingKey {
        vk: vk.clone(),
        q,
        sy,
        sx,
        permutation_y,
        permutation_x,
        domain,
        domain_big,
    };
    Ok((pk, vk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use crate::cs::SparseConstraintSystem;

    fn chain_circuit() -> SparseConstraintSystem<Fr> {
        // public x, y; x * x * x == y
        let mut cs = SparseConstraintSystem::<Fr>::new(2);
        let x2 = cs.mul(0, 0);
        let x3 = cs.mul(x2, 0);
        cs.assert_equal(x3, 1);
        cs
    }

    #[test]
    fn permutation_is_a_bijection_fixing_wires() {
        let ccs = chain_circuit();
        let world_size = 2;
        let n = 4;
        let total = world_size * n;

        // combine every rank's slice into the global map
        let mut sigma = vec![None; 3 * total];
        for rank in 0..world_size {
            let (perm_y, perm_x) = build_permutation(&ccs, rank, world_size, n);
            for local in 0..3 * n {
                let (slot, row) = (local / n, local % n);
                let g = slot * total + rank * n + row;
                assert_ne!(perm_y[local], -1);
                assert_ne!(perm_x[local], -1);
                let (tv, tx) = (perm_x[local] as usize / n, perm_x[local] as usize % n);
                let target = tv * total + perm_y[local] as usize * n + tx;
                sigma[g] = Some(target);
            }
        }

        // bijection
        let mut seen = vec![false; 3 * total];
        for target in sigma.iter().map(|t| t.unwrap()) {
            assert!(!seen[target]);
            seen[target] = true;
        }

        // sigma respects wire assignments: lro[i] == lro[sigma(i)]
        let p = ccs.nb_public_variables;
        let mut lro = vec![0usize; 3 * total];
        for (i, cell) in lro.iter_mut().enumerate().take(p) {
            *cell = i;
        }
        for (ci, c) in ccs.constraints.iter().enumerate() {
            lro[p + ci] = c.l.wire;
            lro[total + p + ci] = c.r.wire;
            lro[2 * total + p + ci] = c.o.wire;
        }
        for (i, target) in sigma.iter().map(|t| t.unwrap()).enumerate() {
            assert_eq!(lro[i], lro[target]);
        }
    }

    #[test]
    fn big_domain_sizing() {
        // 4n once n is large enough to absorb the quotient degree, 8n
        // below
        assert_eq!(big_domain::<Fr>(8).unwrap().size(), 32);
        assert_eq!(big_domain::<Fr>(16).unwrap().size(), 64);
        assert_eq!(big_domain::<Fr>(4).unwrap().size(), 32);
    }
}
