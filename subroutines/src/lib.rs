//! Reusable subroutines for the distributed PLONK backend: the
//! rank-addressed transport with its collectives, the Fiat-Shamir
//! transcript, and the univariate/bivariate KZG commitment schemes.

pub mod pcs;
pub mod prelude;
pub mod transcript;
pub mod transport;

pub use pcs::{DkzgSrs, KzgSrs, PcsError};
pub use transcript::Transcript;
pub use transport::{
    all_gather, all_to_one_sum, broadcast_from_root, gather_at_root, memory_cluster,
    MemoryTransport, TcpTransport, Transport, TransportError,
};
