pub use crate::{
    pcs::{DkzgSrs, KzgSrs, PcsError},
    transcript::Transcript,
    transport::{
        all_gather, all_to_one_sum, broadcast_from_root, gather_at_root, memory_cluster,
        MemoryTransport, TcpTransport, Transport, TransportError,
    },
};
