use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup, VariableBaseMSM};
use ark_std::One;

use arithmetic::divide_by_linear;

use super::PcsError;

/// Univariate KZG over the outer (cross-worker) domain: `g1[i] = t^i G1`
/// together with `(G2, t G2)`.
///
/// The toxic scalar `t` is shared with the dKZG SRS below; during setup
/// it is distributed to every rank, so each rank can rebuild this SRS
/// deterministically and the verifying key stays replicated.
#[derive(Clone, Debug)]
pub struct KzgSrs<E: Pairing> {
    pub g1: Vec<E::G1Affine>,
    pub g2: [E::G2Affine; 2],
}

impl<E: Pairing> KzgSrs<E> {
    pub fn generate(t: &E::ScalarField, size: usize) -> Result<Self, PcsError> {
        if size == 0 {
            return Err(PcsError::InvalidSrs("empty outer SRS".to_string()));
        }
        let g1_gen = E::G1Affine::generator();
        let mut power = E::ScalarField::one();
        let mut points = Vec::with_capacity(size);
        for _ in 0..size {
            points.push(g1_gen * power);
            power *= t;
        }
        let g2_gen = E::G2Affine::generator();
        Ok(Self {
            g1: E::G1::normalize_batch(&points),
            g2: [g2_gen, (g2_gen * *t).into_affine()],
        })
    }

    pub fn size(&self) -> usize {
        self.g1.len()
    }

    pub fn commit(&self, coeffs: &[E::ScalarField]) -> Result<E::G1Affine, PcsError> {
        if coeffs.len() > self.g1.len() {
            return Err(PcsError::SrsTooSmall(coeffs.len(), self.g1.len()));
        }
        let commitment =
            E::G1::msm(&self.g1[..coeffs.len()], coeffs).map_err(|_| PcsError::Msm)?;
        Ok(commitment.into_affine())
    }

    /// Open at `point`: returns the evaluation and the commitment to the
    /// witness quotient `(f(X) - f(point)) / (X - point)`.
    pub fn open(
        &self,
        coeffs: &[E::ScalarField],
        point: &E::ScalarField,
    ) -> Result<(E::ScalarField, E::G1Affine), PcsError> {
        let (quotient, eval) = divide_by_linear(coeffs, point);
        let proof = self.commit(&quotient)?;
        Ok((eval, proof))
    }

    /// Single-point pairing check,
    /// `e(C - v G1 + z pi, G2) == e(pi, t G2)`.
    pub fn check(
        &self,
        commitment: &E::G1Affine,
        point: &E::ScalarField,
        value: &E::ScalarField,
        proof: &E::G1Affine,
    ) -> bool {
        let lhs = commitment.into_group() - E::G1Affine::generator() * *value
            + proof.into_group() * *point;
        E::pairing(lhs, self.g2[0]) == E::pairing(*proof, self.g2[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Bn254, Fr};
    use ark_std::{test_rng, UniformRand};
    use arithmetic::horner_eval;

    #[test]
    fn commit_open_check() {
        let mut rng = test_rng();
        let t = Fr::rand(&mut rng);
        let srs = KzgSrs::<Bn254>::generate(&t, 16).unwrap();

        let coeffs: Vec<Fr> = (0..16).map(|_| Fr::rand(&mut rng)).collect();
        let commitment = srs.commit(&coeffs).unwrap();

        let point = Fr::rand(&mut rng);
        let (eval, proof) = srs.open(&coeffs, &point).unwrap();
        assert_eq!(eval, horner_eval(&coeffs, &point));
        assert!(srs.check(&commitment, &point, &eval, &proof));
        assert!(!srs.check(&commitment, &point, &(eval + Fr::from(1u64)), &proof));
    }

    #[test]
    fn oversized_polynomial_is_rejected() {
        let mut rng = test_rng();
        let t = Fr::rand(&mut rng);
        let srs = KzgSrs::<Bn254>::generate(&t, 4).unwrap();
        let coeffs: Vec<Fr> = (0..5).map(|_| Fr::rand(&mut rng)).collect();
        assert!(matches!(
            srs.commit(&coeffs),
            Err(PcsError::SrsTooSmall(5, 4))
        ));
    }
}
