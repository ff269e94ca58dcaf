//! Slot encoders: batching for BFV/BGV, canonical embedding for CKKS.

use std::f64::consts::PI;

use nalgebra::Complex;

use crate::cipher::Plaintext;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::modulus::Modulus;
use crate::ntt::NttTables;
use crate::params::SchemeType;
use crate::polynomial::RnsPoly;

/// Largest coefficient magnitude the CKKS encoder will produce.
const MAX_ENCODED_COEFF: f64 = (1u64 << 62) as f64;
/// Generator of the slot rotation group.
const SLOT_GENERATOR: usize = 5;

/// Packs N integers modulo t into one plaintext (requires t ≡ 1 mod 2N).
pub struct BatchEncoder<'a> {
    context: &'a Context,
    plain_modulus: Modulus,
    tables: &'a NttTables,
}

impl<'a> BatchEncoder<'a> {
    /// Fails unless the context is BFV/BGV with a batching plain modulus.
    pub fn new(context: &'a Context) -> Result<Self> {
        if !context.scheme().is_exact() {
            return Err(Error::UnsupportedScheme {
                scheme: context.scheme().name(),
                operation: "batch encoding",
            });
        }
        let tables = context.plain_ntt_tables().ok_or_else(|| {
            Error::InvalidParameters("plain modulus does not support batching".into())
        })?;
        Ok(Self {
            context,
            plain_modulus: context.plain_modulus()?,
            tables,
        })
    }

    /// N
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.context.poly_modulus_degree()
    }

    /// Values must be reduced modulo t; missing slots are zero.
    pub fn encode(&self, values: &[u64]) -> Result<Plaintext> {
        let slots = self.slot_count();
        if values.len() > slots {
            return Err(Error::Encoding(format!(
                "{} values do not fit in {slots} slots",
                values.len()
            )));
        }
        let t = self.plain_modulus.value();
        if let Some(v) = values.iter().find(|&&v| v >= t) {
            return Err(Error::Encoding(format!(
                "value {v} is not reduced modulo {t}"
            )));
        }

        let mut coeffs = values.to_vec();
        coeffs.resize(slots, 0);
        self.tables.inverse(&mut coeffs);
        let poly = RnsPoly::from_unsigned(&[self.plain_modulus], &coeffs);
        Ok(Plaintext::new(self.context.scheme(), poly, 1.0))
    }

    /// Returns all N slots.
    pub fn decode(&self, plain: &Plaintext) -> Result<Vec<u64>> {
        plain.validate(self.context)?;
        let mut slots = plain.poly().residues(0).to_vec();
        self.tables.forward(&mut slots);
        Ok(slots)
    }
}

/// Encodes N/2 complex (or real) slots at a fixed-point scale.
pub struct CkksEncoder<'a> {
    context: &'a Context,
    /// e^{iπk/N}, k = 0..2N
    roots: Vec<Complex<f64>>,
    /// 5^j mod 2N, j = 0..N/2
    rotation_group: Vec<usize>,
}

impl<'a> CkksEncoder<'a> {
    /// Fails unless the context is CKKS.
    pub fn new(context: &'a Context) -> Result<Self> {
        if context.scheme() != SchemeType::Ckks {
            return Err(Error::UnsupportedScheme {
                scheme: context.scheme().name(),
                operation: "CKKS encoding",
            });
        }
        let n = context.poly_modulus_degree();
        let m = 2 * n;
        let roots = (0..m)
            .map(|k| Complex::from_polar(1.0, PI * k as f64 / n as f64))
            .collect();
        let mut rotation_group = Vec::with_capacity(n / 2);
        let mut g = 1usize;
        for _ in 0..n / 2 {
            rotation_group.push(g);
            g = g * SLOT_GENERATOR % m;
        }
        Ok(Self {
            context,
            roots,
            rotation_group,
        })
    }

    /// N/2
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.context.poly_modulus_degree() / 2
    }

    /// Encodes real values at `scale`; missing slots are zero.
    pub fn encode(&self, values: &[f64], scale: f64) -> Result<Plaintext> {
        let complex: Vec<Complex<f64>> = values.iter().map(|&v| Complex::new(v, 0.0)).collect();
        self.encode_complex(&complex, scale)
    }

    /// Rounds `scale · σ^{-1}(values)` into the data-level primes.
    pub fn encode_complex(&self, values: &[Complex<f64>], scale: f64) -> Result<Plaintext> {
        let slots = self.slot_count();
        if values.len() > slots {
            return Err(Error::Encoding(format!(
                "{} values do not fit in {slots} slots",
                values.len()
            )));
        }
        self.check_scale(scale)?;

        let n = self.context.poly_modulus_degree();
        let mask = 2 * n - 1;
        let mut acc = vec![0.0f64; n];
        for (z, &g) in values.iter().zip(&self.rotation_group) {
            let mut index = 0usize;
            for a in acc.iter_mut() {
                *a += (z * self.roots[index].conj()).re;
                index = (index + g) & mask;
            }
        }

        let factor = 2.0 * scale / n as f64;
        let mut coeffs = Vec::with_capacity(n);
        for a in acc {
            let c = (a * factor).round();
            if !c.is_finite() || c.abs() >= MAX_ENCODED_COEFF {
                return Err(Error::Encoding(
                    "encoded values are too large for the scale".into(),
                ));
            }
            coeffs.push(c as i64);
        }

        let poly = RnsPoly::from_signed(self.context.data_moduli(), &coeffs);
        Ok(Plaintext::new(SchemeType::Ckks, poly, scale))
    }

    /// Real parts of `decode_complex`.
    pub fn decode(&self, plain: &Plaintext) -> Result<Vec<f64>> {
        Ok(self.decode_complex(plain)?.into_iter().map(|z| z.re).collect())
    }

    /// Evaluates the centered plaintext at the slot roots and divides by the scale.
    pub fn decode_complex(&self, plain: &Plaintext) -> Result<Vec<Complex<f64>>> {
        plain.validate(self.context)?;
        let coeffs = self.context.data_base().compose_centered(plain.poly());
        let mask = 2 * self.context.poly_modulus_degree() - 1;
        let inv_scale = 1.0 / plain.scale();

        Ok(self
            .rotation_group
            .iter()
            .map(|&g| {
                let mut index = 0usize;
                let mut z = Complex::new(0.0, 0.0);
                for &c in &coeffs {
                    z += self.roots[index] * c;
                    index = (index + g) & mask;
                }
                z * inv_scale
            })
            .collect())
    }

    fn check_scale(&self, scale: f64) -> Result<()> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::Encoding(format!("scale {scale} must be positive")));
        }
        let data_bits: u32 = self
            .context
            .data_moduli()
            .iter()
            .map(|q| q.bit_count())
            .sum();
        if scale.log2() + 1.0 >= f64::from(data_bits) {
            return Err(Error::Encoding(format!(
                "scale {scale} is too large for a {data_bits}-bit data modulus"
            )));
        }
        Ok(())
    }
}
