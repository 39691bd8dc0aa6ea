use ark_ff::{batch_inversion, FftField, Field};
use ark_poly::{EvaluationDomain, Radix2EvaluationDomain};

/// Evaluate at `point` the polynomial whose values on `domain` are
/// `evals`, via the barycentric formula
/// `f(z) = (z^n - 1)/n * sum_i evals[i] * w^i / (z - w^i)`.
///
/// `point` must not lie on the domain.
pub fn barycentric_eval<F: FftField>(
    evals: &[F],
    domain: &Radix2EvaluationDomain<F>,
    point: &F,
) -> F {
    let n = domain.size();
    debug_assert_eq!(evals.len(), n);

    let mut denoms: Vec<F> = Vec::with_capacity(n);
    let mut root = F::one();
    for _ in 0..n {
        denoms.push(*point - root);
        root *= domain.group_gen;
    }
    batch_inversion(&mut denoms);

    let mut acc = F::zero();
    let mut root = F::one();
    for (eval, inv) in evals.iter().zip(denoms.iter()) {
        acc += *eval * root * inv;
        root *= domain.group_gen;
    }
    acc * domain.evaluate_vanishing_polynomial(*point) * domain.size_inv
}

/// Value of the `i`-th Lagrange basis polynomial of `domain` at `point`,
/// `L_i(z) = w^i (z^n - 1) / (n (z - w^i))`.
pub fn lagrange_eval<F: FftField>(
    domain: &Radix2EvaluationDomain<F>,
    i: usize,
    point: &F,
) -> F {
    let root = domain.element(i);
    let denom = (*point - root) * domain.size_as_field_element;
    match denom.inverse() {
        Some(inv) => root * domain.evaluate_vanishing_polynomial(*point) * inv,
        // point on the domain: L_i is an indicator
        None => {
            if *point == root {
                F::one()
            } else {
                F::zero()
            }
        }
    }
}

/// Values of `L_0 .. L_{count-1}` of `domain` at `point`, batched.
pub fn lagrange_evals_prefix<F: FftField>(
    domain: &Radix2EvaluationDomain<F>,
    point: &F,
    count: usize,
) -> Vec<F> {
    let mut denoms: Vec<F> = (0..count).map(|i| *point - domain.element(i)).collect();
    batch_inversion(&mut denoms);
    let scale = domain.evaluate_vanishing_polynomial(*point) * domain.size_inv;
    denoms
        .iter()
        .enumerate()
        .map(|(i, inv)| domain.element(i) * scale * inv)
        .collect()
}

/// Values of the vanishing polynomial `X^n - 1` of the size-`n` domain on
/// every point of the (coset) evaluation domain `big`.
pub fn coset_vanishing_table<F: FftField>(
    n: usize,
    big: &Radix2EvaluationDomain<F>,
) -> Vec<F> {
    let step = big.group_gen.pow([n as u64]);
    let mut acc = big.coset_offset().pow([n as u64]);
    (0..big.size())
        .map(|_| {
            let v = acc - F::one();
            acc *= step;
            v
        })
        .collect()
}

/// Values of the `i`-th Lagrange basis polynomial of the size-`n` inner
/// domain on every point of the (coset) domain `big`.
pub fn coset_lagrange_table<F: FftField>(
    inner: &Radix2EvaluationDomain<F>,
    big: &Radix2EvaluationDomain<F>,
    i: usize,
    vanishing: &[F],
) -> Vec<F> {
    let root = inner.element(i);
    // element() already folds the coset offset in
    let mut denoms: Vec<F> = (0..big.size()).map(|j| big.element(j) - root).collect();
    batch_inversion(&mut denoms);
    let scale = root * inner.size_inv;
    denoms
        .iter()
        .zip(vanishing.iter())
        .map(|(inv, z)| scale * z * inv)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use ark_std::{test_rng, UniformRand};

    #[test]
    fn barycentric_matches_ifft() {
        let mut rng = test_rng();
        let domain = Radix2EvaluationDomain::<Fr>::new(8).unwrap();
        let evals: Vec<Fr> = (0..8).map(|_| Fr::rand(&mut rng)).collect();
        let coeffs = domain.ifft(&evals);
        let z = Fr::rand(&mut rng);
        assert_eq!(
            barycentric_eval(&evals, &domain, &z),
            crate::horner_eval(&coeffs, &z)
        );
    }

    #[test]
    fn lagrange_indicator_on_domain() {
        let domain = Radix2EvaluationDomain::<Fr>::new(4).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                let expected = if i == j { Fr::from(1u64) } else { Fr::from(0u64) };
                assert_eq!(lagrange_eval(&domain, i, &domain.element(j)), expected);
            }
        }
    }

    #[test]
    fn lagrange_prefix_consistent() {
        let mut rng = test_rng();
        let domain = Radix2EvaluationDomain::<Fr>::new(16).unwrap();
        let z = Fr::rand(&mut rng);
        let batch = lagrange_evals_prefix(&domain, &z, 5);
        for (i, v) in batch.iter().enumerate() {
            assert_eq!(*v, lagrange_eval(&domain, i, &z));
        }
    }

    #[test]
    fn vanishing_table_on_coset() {
        let inner = Radix2EvaluationDomain::<Fr>::new(8).unwrap();
        let big = Radix2EvaluationDomain::<Fr>::new(32)
            .unwrap()
            .get_coset(Fr::GENERATOR)
            .unwrap();
        let table = coset_vanishing_table(inner.size(), &big);
        for (j, v) in table.iter().enumerate() {
            let x = big.element(j);
            assert_eq!(*v, x.pow([8u64]) - Fr::from(1u64));
        }
        // Lagrange table agrees with the closed form at every coset point
        let lag = coset_lagrange_table(&inner, &big, 7, &table);
        for (j, v) in lag.iter().enumerate() {
            let x = big.element(j);
            assert_eq!(*v, lagrange_eval(&inner, 7, &x));
        }
    }
}
