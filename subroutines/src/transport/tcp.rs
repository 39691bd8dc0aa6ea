use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::{Duration, Instant};

use super::{Transport, TransportError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Socket transport: a full mesh of TCP streams between ranks.
///
/// Rank `r` listens on `base_port + r`; it dials every lower rank and
/// accepts a connection from every higher rank. Each dialer opens the
/// exchange by sending its own rank. Messages are framed with a `u64`
/// little-endian length prefix.
pub struct TcpTransport {
    rank: usize,
    world_size: usize,
    streams: Vec<Option<TcpStream>>,
}

impl TcpTransport {
    pub fn connect(
        rank: usize,
        world_size: usize,
        host: &str,
        base_port: u16,
    ) -> Result<Self, TransportError> {
        if rank >= world_size {
            return Err(TransportError::InvalidRank(rank, world_size));
        }
        let listener = TcpListener::bind((host, base_port + rank as u16))
            .map_err(|e| TransportError::Setup(format!("bind: {e}")))?;

        let mut streams: Vec<Option<TcpStream>> = (0..world_size).map(|_| None).collect();

        // Dial every lower rank; their listeners are bound before any
        // rank starts dialing, but the process may not be up yet.
        for peer in 0..rank {
            let stream = dial((host, base_port + peer as u16))?;
            let mut stream = stream;
            stream
                .write_all(&(rank as u64).to_le_bytes())
                .map_err(|_| TransportError::Send(peer))?;
            streams[peer] = Some(stream);
        }

        // Accept one connection from every higher rank.
        for _ in rank + 1..world_size {
            let (mut stream, _) = listener
                .accept()
                .map_err(|e| TransportError::Setup(format!("accept: {e}")))?;
            stream
                .set_nodelay(true)
                .map_err(|e| TransportError::Setup(format!("nodelay: {e}")))?;
            let mut peer_bytes = [0u8; 8];
            stream
                .read_exact(&mut peer_bytes)
                .map_err(|_| TransportError::Setup("peer handshake".to_string()))?;
            let peer = u64::from_le_bytes(peer_bytes) as usize;
            if peer <= rank || peer >= world_size {
                return Err(TransportError::InvalidRank(peer, world_size));
            }
            streams[peer] = Some(stream);
        }

        Ok(Self {
            rank,
            world_size,
            streams,
        })
    }

    fn stream(&mut self, peer: usize) -> Result<&mut TcpStream, TransportError> {
        let world_size = self.world_size;
        self.streams
            .get_mut(peer)
            .and_then(|s| s.as_mut())
            .ok_or(TransportError::InvalidRank(peer, world_size))
    }
}

fn dial(addr: (&str, u16)) -> Result<TcpStream, TransportError> {
    let deadline = Instant::now() + CONNECT_TIMEOUT;
    loop {
        match TcpStream::connect(addr) {
            Ok(stream) => {
                stream
                    .set_nodelay(true)
                    .map_err(|e| TransportError::Setup(format!("nodelay: {e}")))?;
                return Ok(stream);
            }
            Err(e) => {
                if Instant::now() >= deadline {
                    return Err(TransportError::Setup(format!("connect: {e}")));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

impl Transport for TcpTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn send(&mut self, payload: &[u8], dst: usize) -> Result<(), TransportError> {
        let len = (payload.len() as u64).to_le_bytes();
        let stream = self.stream(dst)?;
        stream.write_all(&len).map_err(|_| TransportError::Send(dst))?;
        stream
            .write_all(payload)
            .map_err(|_| TransportError::Send(dst))
    }

    fn recv(&mut self, src: usize) -> Result<Vec<u8>, TransportError> {
        let stream = self.stream(src)?;
        let mut len_bytes = [0u8; 8];
        stream
            .read_exact(&mut len_bytes)
            .map_err(|_| TransportError::Recv(src))?;
        let len = u64::from_le_bytes(len_bytes) as usize;
        let mut payload = vec![0u8; len];
        stream
            .read_exact(&mut payload)
            .map_err(|_| TransportError::Recv(src))?;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::all_gather;
    use std::thread;

    #[test]
    fn tcp_mesh_all_gather() {
        let world_size = 3;
        let handles: Vec<_> = (0..world_size)
            .map(|rank| {
                thread::spawn(move || {
                    let mut net =
                        TcpTransport::connect(rank, world_size, "127.0.0.1", 9311).unwrap();
                    let gathered: Vec<u64> = all_gather(&mut net, &(rank as u64 * 10)).unwrap();
                    assert_eq!(gathered, vec![0, 10, 20]);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
