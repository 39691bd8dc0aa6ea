//! Canonical byte encodings of the proving key, verifying key and
//! proof.
//!
//! Scalars are fixed-width big-endian; slices carry a `u32` big-endian
//! length; permutation entries are raw big-endian `i64`; G1 points use
//! the library-canonical encoding, compressed by default and
//! uncompressed in the `raw` variants. Neither SRS is part of a key's
//! byte stream; rebind with `init_kzg` after reading.

use ark_ec::pairing::Pairing;
use ark_ff::{BigInteger, FftField, PrimeField};
use ark_poly::{EvaluationDomain, Radix2EvaluationDomain};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize, Compress, Validate};
use ark_std::io::{Read, Write};

use crate::errors::GpianoError;
use crate::structs::{Proof, ProofEvaluations, ProvingKey, VerifyingKey, NUM_SELECTORS};

struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> ark_std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> ark_std::io::Result<()> {
        self.inner.flush()
    }
}

struct CountingReader<R: Read> {
    inner: R,
    read: u64,
}

impl<R: Read> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, read: 0 }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> ark_std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        Ok(n)
    }
}

fn write_u64<W: Write>(w: &mut W, value: u64) -> Result<(), GpianoError> {
    Ok(w.write_all(&value.to_be_bytes())?)
}

fn read_u64<R: Read>(r: &mut R) -> Result<u64, GpianoError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

fn write_u32<W: Write>(w: &mut W, value: u32) -> Result<(), GpianoError> {
    Ok(w.write_all(&value.to_be_bytes())?)
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, GpianoError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn scalar_width<F: PrimeField>() -> usize {
    F::one().into_bigint().to_bytes_be().len()
}

fn write_fr<F: PrimeField, W: Write>(w: &mut W, value: &F) -> Result<(), GpianoError> {
    Ok(w.write_all(&value.into_bigint().to_bytes_be())?)
}

fn read_fr<F: PrimeField, R: Read>(r: &mut R) -> Result<F, GpianoError> {
    let mut buf = vec![0u8; scalar_width::<F>()];
    r.read_exact(&mut buf)?;
    let value = F::from_be_bytes_mod_order(&buf);
    // round-trip equality rejects non-canonical (>= modulus) encodings
    if value.into_bigint().to_bytes_be() != buf {
        return Err(GpianoError::ProtocolMismatch(
            "non-canonical field element".to_string(),
        ));
    }
    Ok(value)
}

fn write_fr_slice<F: PrimeField, W: Write>(w: &mut W, values: &[F]) -> Result<(), GpianoError> {
    write_u32(w, values.len() as u32)?;
    for value in values {
        write_fr(w, value)?;
    }
    Ok(())
}

fn read_fr_slice<F: PrimeField, R: Read>(r: &mut R) -> Result<Vec<F>, GpianoError> {
    let len = read_u32(r)? as usize;
    (0..len).map(|_| read_fr(r)).collect()
}

fn write_i64_slice<W: Write>(w: &mut W, values: &[i64]) -> Result<(), GpianoError> {
    write_u32(w, values.len() as u32)?;
    for value in values {
        w.write_all(&value.to_be_bytes())?;
    }
    Ok(())
}

fn read_i64_slice<R: Read>(r: &mut R) -> Result<Vec<i64>, GpianoError> {
    let len = read_u32(r)? as usize;
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        let mut buf = [0u8; 8];
        r.read_exact(&mut buf)?;
        values.push(i64::from_be_bytes(buf));
    }
    Ok(values)
}

fn write_point<P: CanonicalSerialize, W: Write>(
    w: &mut W,
    point: &P,
    compress: Compress,
) -> Result<(), GpianoError> {
    Ok(point.serialize_with_mode(&mut *w, compress)?)
}

fn read_point<P: CanonicalDeserialize, R: Read>(
    r: &mut R,
    compress: Compress,
) -> Result<P, GpianoError> {
    Ok(P::deserialize_with_mode(&mut *r, compress, Validate::Yes)?)
}

impl<E: Pairing> VerifyingKey<E> {
    pub fn write_to<W: Write>(&self, writer: W) -> Result<u64, GpianoError> {
        self.serialize_into(writer, Compress::Yes)
    }

    pub fn write_raw_to<W: Write>(&self, writer: W) -> Result<u64, GpianoError> {
        self.serialize_into(writer, Compress::No)
    }

    pub fn read_from<R: Read>(reader: R) -> Result<(Self, u64), GpianoError> {
        Self::deserialize_from(reader, Compress::Yes)
    }

    pub fn read_raw_from<R: Read>(reader: R) -> Result<(Self, u64), GpianoError> {
        Self::deserialize_from(reader, Compress::No)
    }

    fn serialize_into<W: Write>(&self, writer: W, compress: Compress) -> Result<u64, GpianoError> {
        let mut w = CountingWriter::new(writer);
        write_u64(&mut w, self.size_y)?;
        write_u64(&mut w, self.size_x)?;
        write_fr(&mut w, &self.size_y_inv)?;
        write_fr(&mut w, &self.size_x_inv)?;
        write_fr(&mut w, &self.generator_y)?;
        write_fr(&mut w, &self.generator_x)?;
        write_fr(&mut w, &self.generator_x_inv)?;
        write_fr(&mut w, &self.coset_shift)?;
        write_u64(&mut w, self.nb_public_variables)?;
        for point in self.q.iter().chain(self.sy.iter()).chain(self.sx.iter()) {
            write_point(&mut w, point, compress)?;
        }
        Ok(w.written)
    }

    fn deserialize_from<R: Read>(reader: R, compress: Compress) -> Result<(Self, u64), GpianoError> {
        let mut r = CountingReader::new(reader);
        let size_y = read_u64(&mut r)?;
        let size_x = read_u64(&mut r)?;
        let size_y_inv = read_fr(&mut r)?;
        let size_x_inv = read_fr(&mut r)?;
        let generator_y = read_fr(&mut r)?;
        let generator_x = read_fr(&mut r)?;
        let generator_x_inv = read_fr(&mut r)?;
        let coset_shift = read_fr(&mut r)?;
        let nb_public_variables = read_u64(&mut r)?;
        let mut q = [E::G1Affine::default(); NUM_SELECTORS];
        for point in q.iter_mut() {
            *point = read_point(&mut r, compress)?;
        }
        let mut sy = [E::G1Affine::default(); 3];
        for point in sy.iter_mut() {
            *point = read_point(&mut r, compress)?;
        }
        let mut sx = [E::G1Affine::default(); 3];
        for point in sx.iter_mut() {
            *point = read_point(&mut r, compress)?;
        }
        Ok((
            Self {
                size_y,
                size_x,
                size_y_inv,
                size_x_inv,
                generator_y,
                generator_x,
                generator_x_inv,
                coset_shift,
                nb_public_variables,
                q,
                sy,
                sx,
                kzg: None,
                dkzg: None,
            },
            r.read,
        ))
    }
}

impl<E: Pairing> ProvingKey<E> {
    pub fn write_to<W: Write>(&self, writer: W) -> Result<u64, GpianoError> {
        self.serialize_into(writer, Compress::Yes)
    }

    pub fn write_raw_to<W: Write>(&self, writer: W) -> Result<u64, GpianoError> {
        self.serialize_into(writer, Compress::No)
    }

    pub fn read_from<R: Read>(reader: R) -> Result<(Self, u64), GpianoError> {
        Self::deserialize_from(reader, Compress::Yes)
    }

    pub fn read_raw_from<R: Read>(reader: R) -> Result<(Self, u64), GpianoError> {
        Self::deserialize_from(reader, Compress::No)
    }

    fn serialize_into<W: Write>(&self, writer: W, compress: Compress) -> Result<u64, GpianoError> {
        let mut w = CountingWriter::new(writer);
        match compress {
            Compress::Yes => self.vk.write_to(&mut w)?,
            Compress::No => self.vk.write_raw_to(&mut w)?,
        };
        write_u64(&mut w, self.domain.size() as u64)?;
        write_u64(&mut w, self.domain_big.size() as u64)?;
        for column in self.q.iter().chain(self.sy.iter()).chain(self.sx.iter()) {
            write_fr_slice(&mut w, column)?;
        }
        write_i64_slice(&mut w, &self.permutation_y)?;
        write_i64_slice(&mut w, &self.permutation_x)?;
        Ok(w.written)
    }

    fn deserialize_from<R: Read>(reader: R, compress: Compress) -> Result<(Self, u64), GpianoError> {
        let mut r = CountingReader::new(reader);
        let (vk, _) = match compress {
            Compress::Yes => VerifyingKey::<E>::read_from(&mut r)?,
            Compress::No => VerifyingKey::<E>::read_raw_from(&mut r)?,
        };
        let n = read_u64(&mut r)? as usize;
        let big = read_u64(&mut r)? as usize;
        if n != vk.size_x as usize {
            return Err(GpianoError::ProtocolMismatch(
                "inner domain does not match verifying key".to_string(),
            ));
        }
        let domain = Radix2EvaluationDomain::new(n)
            .ok_or_else(|| GpianoError::Configuration("inner domain".to_string()))?;
        let domain_big = Radix2EvaluationDomain::new(big)
            .and_then(|d| d.get_coset(E::ScalarField::GENERATOR))
            .ok_or_else(|| GpianoError::Configuration("quotient domain".to_string()))?;

        let mut read_column = |r: &mut CountingReader<R>| -> Result<Vec<E::ScalarField>, GpianoError> {
            let column = read_fr_slice(r)?;
            if column.len() != n {
                return Err(GpianoError::ProtocolMismatch(
                    "polynomial slice does not match the domain".to_string(),
                ));
            }
            Ok(column)
        };
        let mut q: [Vec<E::ScalarField>; NUM_SELECTORS] = Default::default();
        for column in q.iter_mut() {
            *column = read_column(&mut r)?;
        }
        let mut sy: [Vec<E::ScalarField>; 3] = Default::default();
        for column in sy.iter_mut() {
            *column = read_column(&mut r)?;
        }
        let mut sx: [Vec<E::ScalarField>; 3] = Default::default();
        for column in sx.iter_mut() {
            *column = read_column(&mut r)?;
        }

        let permutation_y = read_i64_slice(&mut r)?;
        let permutation_x = read_i64_slice(&mut r)?;
        for table in [&permutation_y, &permutation_x] {
            if table.len() != 3 * n {
                return Err(GpianoError::ProtocolMismatch(
                    "permutation table does not match the domain".to_string(),
                ));
            }
            if table.iter().any(|&entry| entry == -1) {
                return Err(GpianoError::ProtocolMismatch(
                    "permutation table contains the unfilled sentinel".to_string(),
                ));
            }
        }

        Ok((
            Self {
                vk,
                q,
                sy,
                sx,
                permutation_y,
                permutation_x,
                domain,
                domain_big,
            },
            r.read,
        ))
    }
}

impl<E: Pairing> Proof<E> {
    pub fn write_to<W: Write>(&self, writer: W) -> Result<u64, GpianoError> {
        self.serialize_into(writer, Compress::Yes)
    }

    pub fn write_raw_to<W: Write>(&self, writer: W) -> Result<u64, GpianoError> {
        self.serialize_into(writer, Compress::No)
    }

    pub fn read_from<R: Read>(reader: R) -> Result<(Self, u64), GpianoError> {
        Self::deserialize_from(reader, Compress::Yes)
    }

    pub fn read_raw_from<R: Read>(reader: R) -> Result<(Self, u64), GpianoError> {
        Self::deserialize_from(reader, Compress::No)
    }

    fn serialize_into<W: Write>(&self, writer: W, compress: Compress) -> Result<u64, GpianoError> {
        let mut w = CountingWriter::new(writer);
        for point in [&self.a, &self.b, &self.c, &self.z, &self.zy] {
            write_point(&mut w, point, compress)?;
        }
        for point in &self.h {
            write_point(&mut w, point, compress)?;
        }
        let e = &self.evals;
        for table in [&e.a, &e.b, &e.c] {
            write_fr_slice(&mut w, table)?;
        }
        for table in e.sy.iter().chain(e.sx.iter()).chain(e.q.iter()).chain(e.h.iter()) {
            write_fr_slice(&mut w, table)?;
        }
        write_fr_slice(&mut w, &e.z)?;
        write_fr_slice(&mut w, &e.z_omega)?;
        write_fr_slice(&mut w, &e.zy)?;
        for point in [&self.batch_opening, &self.shift_opening, &self.outer_opening] {
            write_point(&mut w, point, compress)?;
        }
        write_fr(&mut w, &self.outer_eval)?;
        Ok(w.written)
    }

    fn deserialize_from<R: Read>(reader: R, compress: Compress) -> Result<(Self, u64), GpianoError> {
        let mut r = CountingReader::new(reader);
        let a = read_point(&mut r, compress)?;
        let b = read_point(&mut r, compress)?;
        let c = read_point(&mut r, compress)?;
        let z = read_point(&mut r, compress)?;
        let zy = read_point(&mut r, compress)?;
        let mut h = [E::G1Affine::default(); 3];
        for point in h.iter_mut() {
            *point = read_point(&mut r, compress)?;
        }

        let ea = read_fr_slice(&mut r)?;
        let eb = read_fr_slice(&mut r)?;
        let ec = read_fr_slice(&mut r)?;
        let mut sy: [Vec<E::ScalarField>; 3] = Default::default();
        for table in sy.iter_mut() {
            *table = read_fr_slice(&mut r)?;
        }
        let mut sx: [Vec<E::ScalarField>; 3] = Default::default();
        for table in sx.iter_mut() {
            *table = read_fr_slice(&mut r)?;
        }
        let mut q: [Vec<E::ScalarField>; NUM_SELECTORS] = Default::default();
        for table in q.iter_mut() {
            *table = read_fr_slice(&mut r)?;
        }
        let mut eh: [Vec<E::ScalarField>; 3] = Default::default();
        for table in eh.iter_mut() {
            *table = read_fr_slice(&mut r)?;
        }
        let ez = read_fr_slice(&mut r)?;
        let ez_omega = read_fr_slice(&mut r)?;
        let ezy = read_fr_slice(&mut r)?;

        let evals = ProofEvaluations {
            a: ea,
            b: eb,
            c: ec,
            sy,
            sx,
            q,
            h: eh,
            z: ez,
            z_omega: ez_omega,
            zy: ezy,
        };
        if !evals.is_consistent() {
            return Err(GpianoError::ProtocolMismatch(
                "evaluation tables of inconsistent lengths".to_string(),
            ));
        }

        let batch_opening = read_point(&mut r, compress)?;
        let shift_opening = read_point(&mut r, compress)?;
        let outer_opening = read_point(&mut r, compress)?;
        let outer_eval = read_fr(&mut r)?;

        Ok((
            Self {
                a,
                b,
                c,
                z,
                zy,
                h,
                evals,
                batch_opening,
                shift_opening,
                outer_opening,
                outer_eval,
            },
            r.read,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Bn254, Fr, G1Affine};
    use ark_ec::AffineRepr;
    use ark_ff::{Field, One};

    type Vk = VerifyingKey<Bn254>;
    type Pk = ProvingKey<Bn254>;

    fn sample_vk() -> Vk {
        let g = G1Affine::generator();
        Vk {
            size_y: 2,
            size_x: 8,
            size_y_inv: Fr::from(2u64).inverse().unwrap(),
            size_x_inv: Fr::from(8u64).inverse().unwrap(),
            generator_y: Fr::from(3u64),
            generator_x: Fr::from(5u64),
            generator_x_inv: Fr::from(5u64).inverse().unwrap(),
            coset_shift: Fr::GENERATOR,
            nb_public_variables: 4,
            q: [g; NUM_SELECTORS],
            sy: [g; 3],
            sx: [g; 3],
            kzg: None,
            dkzg: None,
        }
    }

    fn sample_pk() -> Pk {
        let n = 8usize;
        let column = |seed: u64| -> Vec<Fr> { (0..n).map(|i| Fr::from(seed + i as u64)).collect() };
        Pk {
            vk: sample_vk(),
            q: [column(1), column(2), column(3), column(4), column(5)],
            sy: [column(6), column(7), column(8)],
            sx: [column(9), column(10), column(11)],
            permutation_y: vec![1; 3 * n],
            permutation_x: (0..3 * n as i64).collect(),
            domain: Radix2EvaluationDomain::new(n).unwrap(),
            domain_big: Radix2EvaluationDomain::new(32)
                .unwrap()
                .get_coset(Fr::GENERATOR)
                .unwrap(),
        }
    }

    #[test]
    fn verifying_key_round_trip() {
        let vk = sample_vk();
        for raw in [false, true] {
            let mut buf = Vec::new();
            let written = if raw {
                vk.write_raw_to(&mut buf).unwrap()
            } else {
                vk.write_to(&mut buf).unwrap()
            };
            assert_eq!(written, buf.len() as u64);
            let (decoded, read) = if raw {
                Vk::read_raw_from(buf.as_slice()).unwrap()
            } else {
                Vk::read_from(buf.as_slice()).unwrap()
            };
            assert_eq!(written, read);
            assert_eq!(decoded.size_y, vk.size_y);
            assert_eq!(decoded.size_x, vk.size_x);
            assert_eq!(decoded.generator_x_inv, vk.generator_x_inv);
            assert_eq!(decoded.q, vk.q);
            assert_eq!(decoded.sy, vk.sy);
            assert_eq!(decoded.sx, vk.sx);
            assert!(decoded.kzg.is_none() && decoded.dkzg.is_none());
        }
    }

    #[test]
    fn proving_key_round_trip() {
        let pk = sample_pk();
        for raw in [false, true] {
            let mut buf = Vec::new();
            let written = if raw {
                pk.write_raw_to(&mut buf).unwrap()
            } else {
                pk.write_to(&mut buf).unwrap()
            };
            assert_eq!(written, buf.len() as u64);
            let (decoded, read) = if raw {
                Pk::read_raw_from(buf.as_slice()).unwrap()
            } else {
                Pk::read_from(buf.as_slice()).unwrap()
            };
            assert_eq!(written, read);
            assert_eq!(decoded.q, pk.q);
            assert_eq!(decoded.sy, pk.sy);
            assert_eq!(decoded.sx, pk.sx);
            assert_eq!(decoded.permutation_y, pk.permutation_y);
            assert_eq!(decoded.permutation_x, pk.permutation_x);
            assert_eq!(decoded.domain.size(), pk.domain.size());
            assert_eq!(decoded.domain_big.size(), pk.domain_big.size());
        }
    }

    #[test]
    fn sentinel_permutation_is_rejected() {
        let mut pk = sample_pk();
        pk.permutation_y[0] = -1;
        let mut buf = Vec::new();
        pk.write_to(&mut buf).unwrap();
        assert!(matches!(
            Pk::read_from(buf.as_slice()),
            Err(GpianoError::ProtocolMismatch(_))
        ));
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let vk = sample_vk();
        let mut buf = Vec::new();
        vk.write_to(&mut buf).unwrap();
        buf.truncate(buf.len() - 1);
        assert!(Vk::read_from(buf.as_slice()).is_err());
    }

    #[test]
    fn non_canonical_scalar_is_rejected() {
        let vk = sample_vk();
        let mut buf = Vec::new();
        vk.write_to(&mut buf).unwrap();
        // size_y_inv starts at offset 16; overwrite with the modulus
        // complement pattern 0xff.., which cannot be canonical
        for byte in buf.iter_mut().skip(16).take(32) {
            *byte = 0xff;
        }
        assert!(matches!(
            Vk::read_from(buf.as_slice()),
            Err(GpianoError::ProtocolMismatch(_))
        ));
    }
}
