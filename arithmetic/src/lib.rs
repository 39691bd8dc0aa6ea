//! Univariate polynomial and evaluation-domain helpers shared by the
//! distributed PLONK subroutines and backend.

mod domain;
mod polynomial;

pub use domain::{
    barycentric_eval, coset_lagrange_table, coset_vanishing_table, lagrange_eval,
    lagrange_evals_prefix,
};
pub use polynomial::{divide_by_linear, horner_eval};
