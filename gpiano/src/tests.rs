//! End-to-end tests: whole worker clusters run inside the process, one
//! thread per rank, over the in-memory transport.

use std::sync::Arc;
use std::thread;

use ark_ff::{Field, One};
use ark_serialize::CanonicalSerialize;
use ark_std::rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use subroutines::{memory_cluster, MemoryTransport};

use crate::cs::SparseConstraintSystem;
use crate::errors::GpianoError;
use crate::prover::{prove, prove_direct};
use crate::setup::{setup, setup_random};
use crate::structs::{Proof, ProverConfig};
use crate::verifier::verify;
use crate::{Bn254, Fr};

fn run_cluster<T, F>(world_size: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize, MemoryTransport) -> T + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let handles: Vec<_> = memory_cluster(world_size)
        .into_iter()
        .enumerate()
        .map(|(rank, net)| {
            let f = Arc::clone(&f);
            thread::spawn(move || f(rank, net))
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

/// `x^12 == y` over public `(x, y)`: 12 constraints plus 2 placeholder
/// rows, so two workers get an inner domain of 8 with empty tail rows.
fn power_chain_circuit() -> (SparseConstraintSystem<Fr>, Vec<Fr>) {
    let mut cs = SparseConstraintSystem::<Fr>::new(2);
    let mut acc = cs.mul(0, 0);
    for _ in 0..10 {
        acc = cs.mul(acc, 0);
    }
    cs.assert_equal(acc, 1);

    let x = Fr::from(12u64);
    let y = x.pow([12u64]);
    (cs, vec![x, y])
}

fn proof_bytes(proof: &Proof<Bn254>) -> Vec<u8> {
    let mut bytes = Vec::new();
    proof.write_to(&mut bytes).unwrap();
    bytes
}

#[test]
fn distributed_prove_verify_accepts() {
    let (_, public) = power_chain_circuit();
    let results = run_cluster(2, move |_, mut net| {
        let (ccs, witness) = power_chain_circuit();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let (pk, vk) = setup::<Bn254, _, _>(&ccs, &witness, &mut rng, &mut net).unwrap();
        let proof = prove(&ccs, &pk, &witness, &ProverConfig::default(), &mut net).unwrap();
        (proof, vk)
    });

    // every rank assembled the same proof: the transcripts agreed
    let reference = proof_bytes(&results[0].0);
    for (proof, _) in results.iter() {
        assert_eq!(proof_bytes(proof), reference);
    }

    let (proof, vk) = &results[0];
    verify(proof, vk, &public).unwrap();

    // a different public witness at verification time must be caught
    let mut wrong = public.clone();
    wrong[1] += Fr::one();
    assert!(matches!(
        verify(proof, vk, &wrong),
        Err(GpianoError::Rejected(_))
    ));
}

#[test]
fn proof_streams_round_trip() {
    let results = run_cluster(2, move |_, mut net| {
        let (ccs, witness) = power_chain_circuit();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let (pk, vk) = setup::<Bn254, _, _>(&ccs, &witness, &mut rng, &mut net).unwrap();
        let proof = prove(&ccs, &pk, &witness, &ProverConfig::default(), &mut net).unwrap();
        (proof, vk)
    });
    let (proof, vk) = &results[0];
    let world_size = vk.size_y as usize;

    let mut compressed = Vec::new();
    let written = proof.write_to(&mut compressed).unwrap();
    assert_eq!(written, compressed.len() as u64);
    let (decoded, read) = Proof::<Bn254>::read_from(compressed.as_slice()).unwrap();
    assert_eq!(read, written);
    assert_eq!(&decoded, proof);

    let mut raw = Vec::new();
    let raw_written = proof.write_raw_to(&mut raw).unwrap();
    let (decoded_raw, raw_read) = Proof::<Bn254>::read_raw_from(raw.as_slice()).unwrap();
    assert_eq!(raw_read, raw_written);
    assert_eq!(&decoded_raw, proof);

    // the uncompressed size follows the fixed schema: 11 points, 20
    // per-rank tables, one scalar
    let g1_raw = proof.a.uncompressed_size() as u64;
    let fr_raw = proof.outer_eval.uncompressed_size() as u64;
    let expected = 11 * g1_raw + 20 * (4 + world_size as u64 * fr_raw) + fr_raw;
    assert_eq!(raw_written, expected);
}

#[test]
fn single_worker_reduces_to_plonk() {
    let results = run_cluster(1, |_, mut net| {
        // Assert(x == y) with x = y = 12
        let mut cs = SparseConstraintSystem::<Fr>::new(2);
        cs.assert_equal(0, 1);
        let witness = vec![Fr::from(12u64), Fr::from(12u64)];
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let (pk, vk) = setup::<Bn254, _, _>(&cs, &witness, &mut rng, &mut net).unwrap();
        let proof = prove(&cs, &pk, &witness, &ProverConfig::default(), &mut net).unwrap();
        (proof, vk, witness)
    });
    let (proof, vk, witness) = &results[0];
    verify(proof, vk, witness).unwrap();
}

#[test]
fn non_power_of_two_world_fails_on_every_rank() {
    let results = run_cluster(3, |_, mut net| {
        let (ccs, witness) = power_chain_circuit();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        setup::<Bn254, _, _>(&ccs, &witness, &mut rng, &mut net)
    });
    for result in results {
        assert!(matches!(result, Err(GpianoError::Configuration(_))));
    }
}

#[test]
fn shard_exactly_filled_by_publics() {
    // P = 4, C = 4, W = 2: size_system == P, the guard's boundary
    let results = run_cluster(2, |_, mut net| {
        let mut cs = SparseConstraintSystem::<Fr>::new(4);
        cs.assert_equal(0, 1);
        cs.assert_equal(1, 2);
        cs.assert_equal(2, 3);
        cs.assert_equal(3, 0);
        let witness = vec![Fr::from(7u64); 4];
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let (pk, vk) = setup::<Bn254, _, _>(&cs, &witness, &mut rng, &mut net).unwrap();
        let proof = prove(&cs, &pk, &witness, &ProverConfig::default(), &mut net).unwrap();
        (proof, vk, witness)
    });
    let (proof, vk, witness) = &results[0];
    verify(proof, vk, witness).unwrap();
}

#[test]
fn malformed_witness_is_rejected_before_committing() {
    let results = run_cluster(2, |_, mut net| {
        let (ccs, witness) = power_chain_circuit();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let (pk, _) = setup::<Bn254, _, _>(&ccs, &witness, &mut rng, &mut net).unwrap();
        // one value short: rejected locally, no collective is entered
        prove(&ccs, &pk, &witness[..1], &ProverConfig::default(), &mut net)
    });
    for result in results {
        assert!(matches!(result, Err(GpianoError::InvalidWitness(_))));
    }
}

#[test]
fn force_execute_proves_but_does_not_verify() {
    let results = run_cluster(2, |_, mut net| {
        let (ccs, mut witness) = power_chain_circuit();
        witness[1] += Fr::one(); // violates the final assertion
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let (pk, vk) = setup::<Bn254, _, _>(&ccs, &witness, &mut rng, &mut net).unwrap();

        let strict = prove(&ccs, &pk, &witness, &ProverConfig::default(), &mut net);
        assert!(matches!(strict, Err(GpianoError::InvalidWitness(_))));

        let config = ProverConfig {
            force_execute: true,
            ..Default::default()
        };
        let proof = prove(&ccs, &pk, &witness, &config, &mut net).unwrap();
        (proof, vk, witness)
    });
    let (proof, vk, witness) = &results[0];
    assert!(matches!(
        verify(proof, vk, witness),
        Err(GpianoError::Rejected(_))
    ));
}

#[test]
fn deserialized_proving_key_reproves_identically() {
    let results = run_cluster(2, |_, mut net| {
        let (ccs, witness) = power_chain_circuit();
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let (pk, _) = setup::<Bn254, _, _>(&ccs, &witness, &mut rng, &mut net).unwrap();
        let first = prove(&ccs, &pk, &witness, &ProverConfig::default(), &mut net).unwrap();

        let mut bytes = Vec::new();
        pk.write_to(&mut bytes).unwrap();
        let (mut restored, _) = crate::ProvingKey::<Bn254>::read_from(bytes.as_slice()).unwrap();
        assert!(restored.vk.dkzg.is_none());
        restored
            .init_kzg(
                pk.vk.dkzg.clone().unwrap(),
                pk.vk.kzg.clone().unwrap(),
            )
            .unwrap();

        let second = prove(&ccs, &restored, &witness, &ProverConfig::default(), &mut net).unwrap();
        (first, second)
    });
    for (first, second) in results {
        assert_eq!(proof_bytes(&first), proof_bytes(&second));
    }
}

#[test]
fn setup_random_end_to_end() {
    // 16 random constraints over 4 workers: n = 4, quotient coset 8n
    let results = run_cluster(4, |_, mut net| {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let (pk, vk, witnesses, public_input) =
            setup_random::<Bn254, _, _>(16, 4, &mut rng, &mut net).unwrap();
        let proof = prove_direct(
            &pk,
            &witnesses,
            &public_input,
            &ProverConfig::default(),
            &mut net,
        )
        .unwrap();
        (proof, vk, public_input)
    });

    let reference = proof_bytes(&results[0].0);
    for (proof, _, _) in results.iter() {
        assert_eq!(proof_bytes(proof), reference);
    }

    let (proof, vk, public_input) = &results[0];
    verify(proof, vk, public_input).unwrap();

    let mut wrong = public_input.clone();
    wrong[0] += Fr::one();
    assert!(matches!(
        verify(proof, vk, &wrong),
        Err(GpianoError::Rejected(_))
    ));
}

#[test]
fn unsupported_curve_is_reported() {
    let result = crate::new_constraint_system(crate::Curve::Bls12_381, 1);
    assert!(matches!(result, Err(GpianoError::UnsupportedCurve)));
}
