use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::Field;
use ark_std::One;

use arithmetic::divide_by_linear;

use super::PcsError;
use crate::transport::{all_to_one_sum, broadcast_from_root, Transport, TransportError};

/// Worker-side SRS of the distributed bivariate KZG.
///
/// Worker `r` holds `g1[j] = L_r(t) s^j G1`, where `L_r` is the rank-`r`
/// Lagrange polynomial over the outer domain generated by `outer_gen`.
/// A partial commitment of worker `r` to its slice `f_r` is
/// `L_r(t) f_r(s) G1`; summing partial commitments over the cluster
/// yields `F(t, s) G1` for the bivariate `F(Y,X) = sum_r L_r(Y) f_r(X)`,
/// a single digest binding the whole matrix. Every rank therefore ends
/// up with the same digest after one reduction and broadcast.
#[derive(Clone, Debug)]
pub struct DkzgSrs<E: Pairing> {
    pub rank: usize,
    pub world_size: usize,
    pub g1: Vec<E::G1Affine>,
    /// `(G2, t G2, s G2)`
    pub g2: [E::G2Affine; 3],
}

impl<E: Pairing> DkzgSrs<E> {
    /// Build rank `rank`'s slice from the two toxic scalars and the
    /// outer-domain generator. `t` must not be a `world_size`-th root of
    /// unity (the setup rejection-samples it).
    pub fn generate(
        t: &E::ScalarField,
        s: &E::ScalarField,
        outer_gen: &E::ScalarField,
        rank: usize,
        world_size: usize,
        size: usize,
    ) -> Result<Self, PcsError> {
        if size == 0 || world_size == 0 || rank >= world_size {
            return Err(PcsError::InvalidSrs(format!(
                "rank {rank} of {world_size}, size {size}"
            )));
        }
        // L_r(t) = (t^W - 1) w^r / (W (t - w^r))
        let root = outer_gen.pow([rank as u64]);
        let denom = E::ScalarField::from(world_size as u64) * (*t - root);
        let denom_inv = denom
            .inverse()
            .ok_or_else(|| PcsError::InvalidSrs("t lies on the outer domain".to_string()))?;
        let lambda = (t.pow([world_size as u64]) - E::ScalarField::one()) * root * denom_inv;

        let g1_gen = E::G1Affine::generator();
        let mut scale = lambda;
        let mut points = Vec::with_capacity(size);
        for _ in 0..size {
            points.push(g1_gen * scale);
            scale *= s;
        }
        let g2_gen = E::G2Affine::generator();
        Ok(Self {
            rank,
            world_size,
            g1: E::G1::normalize_batch(&points),
            g2: [
                g2_gen,
                (g2_gen * *t).into_affine(),
                (g2_gen * *s).into_affine(),
            ],
        })
    }

    pub fn size(&self) -> usize {
        self.g1.len()
    }

    /// This worker's additive share of the digest of the bivariate
    /// polynomial whose rank-`rank` row is `coeffs`.
    pub fn commit_partial(&self, coeffs: &[E::ScalarField]) -> Result<E::G1, PcsError> {
        if coeffs.len() > self.g1.len() {
            return Err(PcsError::SrsTooSmall(coeffs.len(), self.g1.len()));
        }
        E::G1::msm(&self.g1[..coeffs.len()], coeffs).map_err(|_| PcsError::Msm)
    }

    /// This worker's additive share of the X-opening proof at `point`:
    /// the partial commitment to `(f_r(X) - f_r(point)) / (X - point)`.
    /// Returns the local evaluation alongside.
    pub fn open_partial(
        &self,
        coeffs: &[E::ScalarField],
        point: &E::ScalarField,
    ) -> Result<(E::ScalarField, E::G1), PcsError> {
        let (quotient, eval) = divide_by_linear(coeffs, point);
        let proof = self.commit_partial(&quotient)?;
        Ok((eval, proof))
    }
}

/// Reduce the per-worker partial commitments to the digest and hand it
/// to every rank. Must be called by the whole cluster in lockstep.
pub fn commit_aggregate<E: Pairing, C: Transport + ?Sized>(
    net: &mut C,
    partial: E::G1,
) -> Result<E::G1Affine, TransportError> {
    let sum = all_to_one_sum(net, partial)?;
    let mut digest = sum.into_affine();
    broadcast_from_root(net, &mut digest)?;
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Bn254, Fr, G1Projective};
    use ark_ec::Group;
    use ark_ff::Zero;
    use ark_poly::{EvaluationDomain, Radix2EvaluationDomain};
    use ark_std::{test_rng, UniformRand};
    use arithmetic::{horner_eval, lagrange_eval};

    #[test]
    fn aggregated_digest_matches_bivariate_evaluation() {
        let mut rng = test_rng();
        let world_size = 4;
        let size = 8;
        let domain = Radix2EvaluationDomain::<Fr>::new(world_size).unwrap();
        let t = Fr::rand(&mut rng);
        let s = Fr::rand(&mut rng);

        let rows: Vec<Vec<Fr>> = (0..world_size)
            .map(|_| (0..size).map(|_| Fr::rand(&mut rng)).collect())
            .collect();

        let mut digest = G1Projective::zero();
        let mut expected = Fr::zero();
        for (r, row) in rows.iter().enumerate() {
            let srs =
                DkzgSrs::<Bn254>::generate(&t, &s, &domain.group_gen, r, world_size, size).unwrap();
            digest += srs.commit_partial(row).unwrap();
            expected += lagrange_eval(&domain, r, &t) * horner_eval(row, &s);
        }

        assert_eq!(digest.into_affine(), (G1Projective::generator() * expected).into_affine());
    }

    #[test]
    fn aggregated_opening_passes_pairing_check() {
        let mut rng = test_rng();
        let world_size = 2;
        let size = 8;
        let domain = Radix2EvaluationDomain::<Fr>::new(world_size).unwrap();
        let t = Fr::rand(&mut rng);
        let s = Fr::rand(&mut rng);
        let point = Fr::rand(&mut rng);

        let rows: Vec<Vec<Fr>> = (0..world_size)
            .map(|_| (0..size).map(|_| Fr::rand(&mut rng)).collect())
            .collect();

        let mut digest = G1Projective::zero();
        let mut proof = G1Projective::zero();
        // U = sum_r f_r(point) L_r(t) G1, the outer commitment to the
        // Y-restriction F(Y, point)
        let mut restriction = Fr::zero();
        let mut g2 = None;
        for (r, row) in rows.iter().enumerate() {
            let srs =
                DkzgSrs::<Bn254>::generate(&t, &s, &domain.group_gen, r, world_size, size).unwrap();
            digest += srs.commit_partial(row).unwrap();
            let (eval, partial) = srs.open_partial(row, &point).unwrap();
            proof += partial;
            restriction += lagrange_eval(&domain, r, &t) * eval;
            g2 = Some(srs.g2);
        }
        let g2 = g2.unwrap();
        let u = G1Projective::generator() * restriction;

        // e(C - U + zeta pi, G2) == e(pi, s G2)
        let lhs = digest - u + proof * point;
        assert_eq!(
            Bn254::pairing(lhs, g2[0]),
            Bn254::pairing(proof, g2[2])
        );
    }
}
