//! Fiat-Shamir transcript shared by the prover cluster and the
//! verifier.
//!
//! Every rank absorbs the same elements in the same order and therefore
//! derives bitwise-identical challenges; no challenge ever travels over
//! the transport.

use ark_ff::{Field, PrimeField};
use ark_serialize::{CanonicalSerialize, SerializationError};
use ark_std::{rand::SeedableRng, UniformRand};
use rand_chacha::ChaCha20Rng;

#[derive(Clone)]
pub struct Transcript {
    inner: merlin::Transcript,
}

impl Transcript {
    pub fn new(label: &'static [u8]) -> Self {
        Self {
            inner: merlin::Transcript::new(label),
        }
    }

    pub fn append_u64(&mut self, label: &'static [u8], value: u64) {
        self.inner.append_u64(label, value);
    }

    pub fn append_message(&mut self, label: &'static [u8], message: &[u8]) {
        self.inner.append_message(label, message);
    }

    /// Absorb any ark-serializable element (field elements, curve
    /// points, vectors of either) through its compressed encoding.
    pub fn append_serializable(
        &mut self,
        label: &'static [u8],
        element: &impl CanonicalSerialize,
    ) -> Result<(), SerializationError> {
        let mut bytes = Vec::new();
        element.serialize_compressed(&mut bytes)?;
        self.inner.append_message(label, &bytes);
        Ok(())
    }

    /// Squeeze a field challenge: 64 transcript bytes reduced modulo the
    /// field order.
    pub fn challenge_field<F: PrimeField>(&mut self, label: &'static [u8]) -> F {
        let mut bytes = [0u8; 64];
        self.inner.challenge_bytes(label, &mut bytes);
        F::from_le_bytes_mod_order(&bytes)
    }

    /// Squeeze a field challenge that avoids the `order`-th roots of
    /// unity, by seeding a ChaCha stream from the transcript and
    /// rejection-sampling it.
    pub fn challenge_outside_domain<F: PrimeField>(
        &mut self,
        label: &'static [u8],
        order: u64,
    ) -> F {
        let mut seed = [0u8; 32];
        self.inner.challenge_bytes(label, &mut seed);
        let mut rng = ChaCha20Rng::from_seed(seed);
        loop {
            let candidate = F::rand(&mut rng);
            if candidate.pow([order]) != F::one() {
                return candidate;
            }
        }
    }

    /// Derive a 32-byte seed from a fork of the transcript; the caller
    /// typically mixes secrets in before squeezing. Does not advance
    /// this transcript.
    pub fn fork_seed(&self, label: &'static [u8], extra: &[u8]) -> [u8; 32] {
        let mut fork = self.inner.clone();
        fork.append_message(b"fork", extra);
        let mut seed = [0u8; 32];
        fork.challenge_bytes(label, &mut seed);
        seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use ark_ff::Field;

    #[test]
    fn identical_absorptions_agree() {
        let mut a = Transcript::new(b"test");
        let mut b = Transcript::new(b"test");
        a.append_serializable(b"x", &Fr::from(5u64)).unwrap();
        b.append_serializable(b"x", &Fr::from(5u64)).unwrap();
        assert_eq!(a.challenge_field::<Fr>(b"c"), b.challenge_field::<Fr>(b"c"));
    }

    #[test]
    fn diverging_absorptions_disagree() {
        let mut a = Transcript::new(b"test");
        let mut b = Transcript::new(b"test");
        a.append_serializable(b"x", &Fr::from(5u64)).unwrap();
        b.append_serializable(b"x", &Fr::from(6u64)).unwrap();
        assert_ne!(a.challenge_field::<Fr>(b"c"), b.challenge_field::<Fr>(b"c"));
    }

    #[test]
    fn domain_avoiding_challenge() {
        let mut t = Transcript::new(b"test");
        let c: Fr = t.challenge_outside_domain(b"zeta", 8);
        assert_ne!(c.pow([8u64]), Fr::from(1u64));
    }
}
