use ark_ff::Field;

/// Evaluate a polynomial given by its coefficients (low degree first) at
/// `point` using Horner's rule.
pub fn horner_eval<F: Field>(coeffs: &[F], point: &F) -> F {
    let mut acc = F::zero();
    for c in coeffs.iter().rev() {
        acc = acc * point + c;
    }
    acc
}

/// Synthetic division of `coeffs` by the linear factor `(X - z)`.
///
/// Returns the quotient coefficients and the remainder, which equals the
/// polynomial's value at `z`.
pub fn divide_by_linear<F: Field>(coeffs: &[F], z: &F) -> (Vec<F>, F) {
    if coeffs.is_empty() {
        return (Vec::new(), F::zero());
    }
    let mut quotient = vec![F::zero(); coeffs.len() - 1];
    let mut carry = coeffs[coeffs.len() - 1];
    for i in (0..coeffs.len() - 1).rev() {
        quotient[i] = carry;
        carry = coeffs[i] + carry * z;
    }
    (quotient, carry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use ark_std::{test_rng, UniformRand};

    #[test]
    fn division_reconstructs() {
        let mut rng = test_rng();
        let coeffs: Vec<Fr> = (0..17).map(|_| Fr::rand(&mut rng)).collect();
        let z = Fr::rand(&mut rng);
        let (q, r) = divide_by_linear(&coeffs, &z);

        assert_eq!(r, horner_eval(&coeffs, &z));

        // (X - z) * q + r == f at a fresh point
        let x = Fr::rand(&mut rng);
        let lhs = (x - z) * horner_eval(&q, &x) + r;
        assert_eq!(lhs, horner_eval(&coeffs, &x));
    }

    #[test]
    fn division_of_constant() {
        let coeffs = vec![Fr::from(7u64)];
        let (q, r) = divide_by_linear(&coeffs, &Fr::from(3u64));
        assert!(q.is_empty());
        assert_eq!(r, Fr::from(7u64));
    }
}
