use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use core::ops::Add;

use super::{Transport, TransportError};

fn to_bytes<T: CanonicalSerialize>(value: &T) -> Result<Vec<u8>, TransportError> {
    let mut bytes = Vec::new();
    value.serialize_compressed(&mut bytes)?;
    Ok(bytes)
}

fn from_bytes<T: CanonicalDeserialize>(bytes: &[u8]) -> Result<T, TransportError> {
    Ok(T::deserialize_compressed(bytes)?)
}

/// Binomial-tree broadcast from rank 0. On return every rank holds
/// rank 0's value in `value`.
pub fn broadcast_from_root<T, C>(net: &mut C, value: &mut T) -> Result<(), TransportError>
where
    T: CanonicalSerialize + CanonicalDeserialize,
    C: Transport + ?Sized,
{
    let world_size = net.world_size();
    let rank = net.rank();
    let mut step = 1;
    while step < world_size {
        if rank < step {
            let dst = rank + step;
            if dst < world_size {
                net.send(&to_bytes(value)?, dst)?;
            }
        } else if rank < 2 * step {
            let bytes = net.recv(rank - step)?;
            *value = from_bytes(&bytes)?;
        }
        step <<= 1;
    }
    Ok(())
}

/// Binomial-tree gather. Rank 0 returns `Some([x_0, .., x_{W-1}])` in
/// rank order; every other rank returns `None`.
pub fn gather_at_root<T, C>(net: &mut C, value: &T) -> Result<Option<Vec<T>>, TransportError>
where
    T: CanonicalSerialize + CanonicalDeserialize + Clone,
    C: Transport + ?Sized,
{
    let world_size = net.world_size();
    let rank = net.rank();
    // items accumulates the contiguous rank range [rank, rank + step)
    let mut items = vec![value.clone()];
    let mut step = 1;
    while step < world_size {
        if rank & step == 0 {
            let src = rank + step;
            if src < world_size {
                let bytes = net.recv(src)?;
                let mut received: Vec<T> = from_bytes(&bytes)?;
                items.append(&mut received);
            }
        } else {
            net.send(&to_bytes(&items)?, rank - step)?;
            return Ok(None);
        }
        step <<= 1;
    }
    Ok(Some(items))
}

/// Binomial-tree reduction by addition. Rank 0 returns the full sum;
/// other ranks return their partial sums, which callers must not rely
/// on.
pub fn all_to_one_sum<T, C>(net: &mut C, value: T) -> Result<T, TransportError>
where
    T: CanonicalSerialize + CanonicalDeserialize + Add<Output = T>,
    C: Transport + ?Sized,
{
    let world_size = net.world_size();
    let rank = net.rank();
    let mut acc = value;
    let mut step = 1;
    while step < world_size {
        if rank & step == 0 {
            let src = rank + step;
            if src < world_size {
                let bytes = net.recv(src)?;
                let received: T = from_bytes(&bytes)?;
                acc = acc + received;
            }
        } else {
            net.send(&to_bytes(&acc)?, rank - step)?;
            return Ok(acc);
        }
        step <<= 1;
    }
    Ok(acc)
}

/// Ring all-gather: after `W - 1` exchange steps every rank holds
/// `[x_0, .., x_{W-1}]` in rank order.
pub fn all_gather<T, C>(net: &mut C, value: &T) -> Result<Vec<T>, TransportError>
where
    T: CanonicalSerialize + CanonicalDeserialize + Clone,
    C: Transport + ?Sized,
{
    let world_size = net.world_size();
    let rank = net.rank();
    let mut slots: Vec<Option<T>> = (0..world_size).map(|_| None).collect();
    slots[rank] = Some(value.clone());

    let next = (rank + 1) % world_size;
    let prev = (rank + world_size - 1) % world_size;
    let mut forwarded = to_bytes(value)?;
    for k in 0..world_size.saturating_sub(1) {
        net.send(&forwarded, next)?;
        forwarded = net.recv(prev)?;
        let origin = (rank + world_size - 1 - k) % world_size;
        slots[origin] = Some(from_bytes(&forwarded)?);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.ok_or(TransportError::Recv(i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory_cluster;
    use ark_bn254::Fr;
    use ark_std::{test_rng, UniformRand};
    use std::thread;

    fn run_cluster<F>(world_size: usize, f: F)
    where
        F: Fn(crate::transport::MemoryTransport) + Send + Sync + Clone + 'static,
    {
        let handles: Vec<_> = memory_cluster(world_size)
            .into_iter()
            .map(|net| {
                let f = f.clone();
                thread::spawn(move || f(net))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn broadcast_reaches_every_rank() {
        run_cluster(4, |mut net| {
            let mut value = if net.rank() == 0 { Fr::from(42u64) } else { Fr::from(0u64) };
            broadcast_from_root(&mut net, &mut value).unwrap();
            assert_eq!(value, Fr::from(42u64));
        });
    }

    #[test]
    fn gather_is_rank_ordered() {
        run_cluster(4, |mut net| {
            let rank = net.rank();
            let gathered = gather_at_root(&mut net, &Fr::from(rank as u64)).unwrap();
            if rank == 0 {
                let expected: Vec<Fr> = (0..4).map(|i| Fr::from(i as u64)).collect();
                assert_eq!(gathered.unwrap(), expected);
            } else {
                assert!(gathered.is_none());
            }
        });
    }

    #[test]
    fn sum_lands_on_root() {
        let mut rng = test_rng();
        let values: Vec<Fr> = (0..4).map(|_| Fr::rand(&mut rng)).collect();
        let expected: Fr = values.iter().sum();
        run_cluster(4, move |mut net| {
            let rank = net.rank();
            let sum = all_to_one_sum(&mut net, values[rank]).unwrap();
            if rank == 0 {
                assert_eq!(sum, expected);
            }
        });
    }

    #[test]
    fn all_gather_on_odd_world() {
        run_cluster(3, |mut net| {
            let rank = net.rank() as u64;
            let gathered: Vec<u64> = all_gather(&mut net, &rank).unwrap();
            assert_eq!(gathered, vec![0, 1, 2]);
        });
    }
}
