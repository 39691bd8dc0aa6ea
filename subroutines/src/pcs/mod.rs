//! Polynomial commitment schemes: the outer univariate KZG over the
//! cross-worker domain and the distributed bivariate KZG (dKZG) that
//! binds one matrix row per worker.

mod dkzg;
mod kzg;

pub use dkzg::{commit_aggregate, DkzgSrs};
pub use kzg::KzgSrs;

use displaydoc::Display;

use crate::transport::TransportError;

#[derive(Debug, Display)]
pub enum PcsError {
    /// polynomial with {0} coefficients exceeds the SRS size {1}
    SrsTooSmall(usize, usize),
    /// invalid SRS parameters: {0}
    InvalidSrs(String),
    /// multi-scalar multiplication over mismatched inputs
    Msm,
    /// transport failure during distributed commitment: {0}
    Transport(TransportError),
}

impl From<TransportError> for PcsError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl ark_std::error::Error for PcsError {}
