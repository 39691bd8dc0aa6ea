//! Sparse PLONK-style constraint system and its witness assembly.
//!
//! A constraint is `q_l l + q_r r + q_m l r + q_o o + q_k = 0` over the
//! wires `(l, r, o)`; coefficients live in a shared table and are
//! referenced by index. Variables are numbered with the public inputs
//! first, then the remaining caller-assigned inputs, then internal
//! variables the solver computes.

use ark_ff::{Field, PrimeField, Zero};
use ark_std::rand::RngCore;
use ark_std::UniformRand;

use crate::errors::GpianoError;

/// Coefficient table index of the constant zero, installed by
/// [`SparseConstraintSystem::new`].
pub const COEFF_ZERO: usize = 0;
/// Coefficient table index of the constant one.
pub const COEFF_ONE: usize = 1;
/// Coefficient table index of the constant minus one.
pub const COEFF_MINUS_ONE: usize = 2;

/// A coefficient-scaled wire reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Term {
    pub coeff: usize,
    pub wire: usize,
}

impl Term {
    pub fn new(coeff: usize, wire: usize) -> Self {
        Self { coeff, wire }
    }

    /// A term that contributes nothing regardless of its wire value.
    pub fn zero() -> Self {
        Self { coeff: COEFF_ZERO, wire: 0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Constraint {
    pub l: Term,
    pub r: Term,
    pub o: Term,
    /// Multiplicative term; the product coefficient is
    /// `coefficients[m.0.coeff] * coefficients[m.1.coeff]` over the
    /// wires `(m.0.wire, m.1.wire)`.
    pub m: (Term, Term),
    /// Constant coefficient index.
    pub k: usize,
}

#[derive(Clone, Debug)]
pub struct SparseConstraintSystem<F: PrimeField> {
    pub nb_public_variables: usize,
    /// Public plus caller-assigned secret variables; the prover's full
    /// witness must have exactly this length.
    pub nb_input_variables: usize,
    pub nb_variables: usize,
    pub coefficients: Vec<F>,
    pub constraints: Vec<Constraint>,
}

impl<F: PrimeField> SparseConstraintSystem<F> {
    pub fn new(nb_public_variables: usize) -> Self {
        Self {
            nb_public_variables,
            nb_input_variables: nb_public_variables,
            nb_variables: nb_public_variables,
            coefficients: vec![F::zero(), F::one(), -F::one()],
            constraints: Vec::new(),
        }
    }

    /// Register a coefficient and return its table index.
    pub fn add_coefficient(&mut self, value: F) -> usize {
        self.coefficients.push(value);
        self.coefficients.len() - 1
    }

    /// A secret input variable, assigned by the caller's witness.
    /// All input variables must be created before any internal one.
    pub fn new_input_variable(&mut self) -> usize {
        debug_assert_eq!(self.nb_input_variables, self.nb_variables);
        self.nb_input_variables += 1;
        self.nb_variables += 1;
        self.nb_variables - 1
    }

    /// An internal variable, assigned by the solver.
    pub fn new_internal_variable(&mut self) -> usize {
        self.nb_variables += 1;
        self.nb_variables - 1
    }

    /// The M term must share its wires with L and R, so the gate seen
    /// by the prover (over the wire columns) matches the solver's view.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        debug_assert!(
            constraint.m.0.coeff == COEFF_ZERO && constraint.m.1.coeff == COEFF_ZERO
                || (constraint.m.0.wire == constraint.l.wire
                    && constraint.m.1.wire == constraint.r.wire)
        );
        self.constraints.push(constraint);
    }

    /// `a - b = 0`.
    pub fn assert_equal(&mut self, a: usize, b: usize) {
        self.add_constraint(Constraint {
            l: Term::new(COEFF_ONE, a),
            r: Term::new(COEFF_MINUS_ONE, b),
            o: Term::zero(),
            m: (Term::zero(), Term::zero()),
            k: COEFF_ZERO,
        });
    }

    /// `product = a * b`. The multiplicands ride the L and R wires with
    /// zero linear coefficients, keeping the M term on the same wires.
    pub fn mul(&mut self, a: usize, b: usize) -> usize {
        let product = self.new_internal_variable();
        self.add_constraint(Constraint {
            l: Term::new(COEFF_ZERO, a),
            r: Term::new(COEFF_ZERO, b),
            o: Term::new(COEFF_MINUS_ONE, product),
            m: (Term::new(COEFF_ONE, a), Term::new(COEFF_ONE, b)),
            k: COEFF_ZERO,
        });
        product
    }

    /// The `(q_l, q_r, q_m, q_o, q_k)` row of a constraint.
    pub fn selector_row(&self, c: &Constraint) -> [F; 5] {
        [
            self.coefficients[c.l.coeff],
            self.coefficients[c.r.coeff],
            self.coefficients[c.m.0.coeff] * self.coefficients[c.m.1.coeff],
            self.coefficients[c.o.coeff],
            self.coefficients[c.k],
        ]
    }

    /// Complete a full witness into a solution vector covering every
    /// variable. Walks constraints in order; each constraint must
    /// either hold over already-known wires or determine exactly one
    /// unknown wire linearly.
    ///
    /// With `force` set, unsolvable or violated constraints are patched
    /// with values from `rng` instead of failing; the resulting proof
    /// will not verify.
    pub fn solve(
        &self,
        full_witness: &[F],
        mut force: Option<&mut dyn RngCore>,
    ) -> Result<Vec<F>, GpianoError> {
        if full_witness.len() != self.nb_input_variables {
            return Err(GpianoError::InvalidWitness(format!(
                "witness has {} values, circuit expects {}",
                full_witness.len(),
                self.nb_input_variables
            )));
        }

        let mut values: Vec<Option<F>> = vec![None; self.nb_variables];
        for (slot, value) in values.iter_mut().zip(full_witness.iter()) {
            *slot = Some(*value);
        }

        for (index, c) in self.constraints.iter().enumerate() {
            if let Err(e) = self.solve_constraint(c, &mut values) {
                let rng = force.as_mut().ok_or_else(|| {
                    GpianoError::InvalidWitness(format!("constraint {index}: {e}"))
                })?;
                for term in [c.l, c.r, c.o, c.m.0, c.m.1] {
                    if values[term.wire].is_none() {
                        values[term.wire] = Some(F::rand(&mut **rng));
                    }
                }
            }
        }

        values
            .into_iter()
            .map(|v| match v {
                Some(v) => Ok(v),
                None => match force.as_mut() {
                    Some(rng) => Ok(F::rand(&mut **rng)),
                    None => Err(GpianoError::InvalidWitness(
                        "variable never constrained".to_string(),
                    )),
                },
            })
            .collect()
    }

    fn solve_constraint(
        &self,
        c: &Constraint,
        values: &mut [Option<F>],
    ) -> Result<(), String> {
        let ql = self.coefficients[c.l.coeff];
        let qr = self.coefficients[c.r.coeff];
        let qm = self.coefficients[c.m.0.coeff] * self.coefficients[c.m.1.coeff];
        let qo = self.coefficients[c.o.coeff];
        let qk = self.coefficients[c.k];

        let vl = values[c.l.wire];
        let vr = values[c.r.wire];
        let vo = values[c.o.wire];
        let vm0 = values[c.m.0.wire];
        let vm1 = values[c.m.1.wire];

        // Gate with every wire known: just check it.
        if let (Some(l), Some(r), Some(o), Some(m0), Some(m1)) = (vl, vr, vo, vm0, vm1) {
            let residue = ql * l + qr * r + qm * m0 * m1 + qo * o + qk;
            return if residue.is_zero() {
                Ok(())
            } else {
                Err("constraint violated".to_string())
            };
        }

        // One unknown wire, appearing linearly: accumulate its
        // coefficient and the known residue.
        let mut unknown: Option<usize> = None;
        for term in [c.l.wire, c.r.wire, c.o.wire, c.m.0.wire, c.m.1.wire] {
            if values[term].is_none() {
                if unknown.is_some() && unknown != Some(term) {
                    return Err("more than one unknown wire".to_string());
                }
                unknown = Some(term);
            }
        }
        let wire = unknown.ok_or_else(|| "unreachable".to_string())?;

        let mut coefficient = F::zero();
        let mut residue = qk;
        if c.l.wire == wire {
            coefficient += ql;
        } else if let Some(l) = vl {
            residue += ql * l;
        }
        if c.r.wire == wire {
            coefficient += qr;
        } else if let Some(r) = vr {
            residue += qr * r;
        }
        if c.o.wire == wire {
            coefficient += qo;
        } else if let Some(o) = vo {
            residue += qo * o;
        }
        match (vm0, vm1) {
            (Some(m0), Some(m1)) => residue += qm * m0 * m1,
            (Some(m0), None) if c.m.1.wire == wire => coefficient += qm * m0,
            (None, Some(m1)) if c.m.0.wire == wire => coefficient += qm * m1,
            (None, None) if qm.is_zero() => {}
            _ => return Err("unknown wire appears quadratically".to_string()),
        }

        let inv = coefficient
            .inverse()
            .ok_or_else(|| "unknown wire has zero coefficient".to_string())?;
        values[wire] = Some(-residue * inv);
        Ok(())
    }

    /// Wire triple of the global row `row` in the sharded layout:
    /// placeholder rows `0..P` pin the L wire to the public variable,
    /// constraint rows carry their own wires, trailing rows fall back
    /// to wire 0.
    pub fn wires_of_row(&self, row: usize) -> (usize, usize, usize) {
        let p = self.nb_public_variables;
        if row < p {
            (row, 0, 0)
        } else if row - p < self.constraints.len() {
            let c = &self.constraints[row - p];
            (c.l.wire, c.r.wire, c.o.wire)
        } else {
            (0, 0, 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;

    fn square_circuit() -> SparseConstraintSystem<Fr> {
        // public x, y; internal x^2; assert x^2 == y
        let mut cs = SparseConstraintSystem::<Fr>::new(2);
        let x_sq = cs.mul(0, 0);
        cs.assert_equal(x_sq, 1);
        cs
    }

    #[test]
    fn solver_completes_internal_wires() {
        let cs = square_circuit();
        let witness = vec![Fr::from(5u64), Fr::from(25u64)];
        let solution = cs.solve(&witness, None).unwrap();
        assert_eq!(solution.len(), 3);
        assert_eq!(solution[2], Fr::from(25u64));
    }

    #[test]
    fn solver_rejects_violated_assertion() {
        let cs = square_circuit();
        let witness = vec![Fr::from(5u64), Fr::from(26u64)];
        assert!(matches!(
            cs.solve(&witness, None),
            Err(GpianoError::InvalidWitness(_))
        ));
    }

    #[test]
    fn solver_rejects_short_witness() {
        let cs = square_circuit();
        assert!(matches!(
            cs.solve(&[Fr::from(5u64)], None),
            Err(GpianoError::InvalidWitness(_))
        ));
    }

    #[test]
    fn force_fills_the_gaps() {
        let cs = square_circuit();
        let witness = vec![Fr::from(5u64), Fr::from(26u64)];
        let mut rng = ark_std::test_rng();
        let solution = cs.solve(&witness, Some(&mut rng)).unwrap();
        assert_eq!(solution.len(), 3);
    }
}
