use std::sync::mpsc::{channel, Receiver, Sender};

use super::{Transport, TransportError};

/// In-process transport: a full mesh of mpsc channels between ranks.
///
/// Used to run a whole worker cluster inside one process, one thread per
/// rank.
pub struct MemoryTransport {
    rank: usize,
    world_size: usize,
    senders: Vec<Option<Sender<Vec<u8>>>>,
    receivers: Vec<Option<Receiver<Vec<u8>>>>,
}

/// Build the channel mesh for a `world_size`-rank cluster and hand out
/// one endpoint per rank.
pub fn memory_cluster(world_size: usize) -> Vec<MemoryTransport> {
    let mut senders: Vec<Vec<Option<Sender<Vec<u8>>>>> =
        (0..world_size).map(|_| (0..world_size).map(|_| None).collect()).collect();
    let mut receivers: Vec<Vec<Option<Receiver<Vec<u8>>>>> =
        (0..world_size).map(|_| (0..world_size).map(|_| None).collect()).collect();

    for src in 0..world_size {
        for dst in 0..world_size {
            if src == dst {
                continue;
            }
            let (tx, rx) = channel();
            senders[src][dst] = Some(tx);
            receivers[dst][src] = Some(rx);
        }
    }

    senders
        .into_iter()
        .zip(receivers)
        .enumerate()
        .map(|(rank, (senders, receivers))| MemoryTransport {
            rank,
            world_size,
            senders,
            receivers,
        })
        .collect()
}

impl Transport for MemoryTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn send(&mut self, payload: &[u8], dst: usize) -> Result<(), TransportError> {
        let sender = self
            .senders
            .get(dst)
            .and_then(|s| s.as_ref())
            .ok_or(TransportError::InvalidRank(dst, self.world_size))?;
        sender
            .send(payload.to_vec())
            .map_err(|_| TransportError::Send(dst))
    }

    fn recv(&mut self, src: usize) -> Result<Vec<u8>, TransportError> {
        let receiver = self
            .receivers
            .get(src)
            .and_then(|r| r.as_ref())
            .ok_or(TransportError::InvalidRank(src, self.world_size))?;
        receiver.recv().map_err(|_| TransportError::Recv(src))
    }
}
