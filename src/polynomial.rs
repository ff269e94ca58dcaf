//! Polynomials of Z_Q[X]/(X^N + 1) in RNS form, Q = q_0 · q_1 · … · q_{k-1}.

use std::ops::{Add, Neg, Sub};

use itertools::izip;
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{ToPrimitive, Zero};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::modulus::Modulus;
use crate::ntt::NttTables;

/// Standard deviation of the RLWE error distribution.
pub const NOISE_STANDARD_DEVIATION: f64 = 3.2;
/// Error samples are rejected beyond this many standard deviations.
pub const NOISE_MAX_DEVIATIONS: f64 = 6.0;

/// f(x) = Σ c_j x^j, stored as one residue vector per prime of the base.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RnsPoly {
    moduli: Vec<Modulus>,
    residues: Vec<Vec<u64>>,
}

impl RnsPoly {
    /// The zero polynomial over `moduli`.
    pub fn zero(moduli: &[Modulus], degree: usize) -> Self {
        Self {
            moduli: moduli.to_vec(),
            residues: vec![vec![0; degree]; moduli.len()],
        }
    }

    /// Same small signed coefficients in every residue.
    pub fn from_signed(moduli: &[Modulus], coeffs: &[i64]) -> Self {
        let residues = moduli
            .iter()
            .map(|&q| coeffs.iter().map(|&c| q.reduce_i64(c)).collect())
            .collect();
        Self {
            moduli: moduli.to_vec(),
            residues,
        }
    }

    /// Unsigned coefficients reduced into every residue.
    pub fn from_unsigned(moduli: &[Modulus], coeffs: &[u64]) -> Self {
        let residues = moduli
            .iter()
            .map(|&q| coeffs.iter().map(|&c| q.reduce(c)).collect())
            .collect();
        Self {
            moduli: moduli.to_vec(),
            residues,
        }
    }

    /// Wraps raw residues, checking shape and range.
    pub fn from_residues(moduli: &[Modulus], residues: Vec<Vec<u64>>) -> Result<Self> {
        let poly = Self {
            moduli: moduli.to_vec(),
            residues,
        };
        if !poly.is_well_formed() {
            return Err(Error::InvalidFormat(
                "residue vectors do not match their moduli".into(),
            ));
        }
        Ok(poly)
    }

    /// Coefficients per residue vector (the ring degree N).
    #[inline]
    pub fn degree(&self) -> usize {
        self.residues.first().map_or(0, Vec::len)
    }

    /// Primes of the residue vectors, in order.
    #[inline]
    pub fn moduli(&self) -> &[Modulus] {
        &self.moduli
    }

    /// Coefficients modulo the `index`-th prime. Panics if out of range.
    #[inline]
    pub fn residues(&self, index: usize) -> &[u64] {
        &self.residues[index]
    }

    /// Total number of stored words (degree × number of primes).
    pub fn coeff_count(&self) -> usize {
        self.degree() * self.moduli.len()
    }

    /// Whether every residue is zero.
    pub fn is_zero(&self) -> bool {
        self.residues.iter().flatten().all(|&c| c == 0)
    }

    /// Every residue vector has the same length and holds reduced values.
    pub fn is_well_formed(&self) -> bool {
        let degree = self.degree();
        self.moduli.len() == self.residues.len()
            && self
                .moduli
                .iter()
                .zip(&self.residues)
                .all(|(q, r)| r.len() == degree && r.iter().all(|&c| c < q.value()))
    }

    /// Negacyclic product; `tables` must cover at least this polynomial's primes.
    pub fn multiply(&self, rhs: &RnsPoly, tables: &[NttTables]) -> RnsPoly {
        assert_eq!(self.moduli, rhs.moduli, "moduli must match");
        assert!(tables.len() >= self.moduli.len(), "missing NTT tables");
        let residues = izip!(&self.moduli, &self.residues, &rhs.residues, tables)
            .map(|(&q, a, b, t)| {
                debug_assert_eq!(t.modulus(), q);
                t.multiply(a, b)
            })
            .collect();
        RnsPoly {
            moduli: self.moduli.clone(),
            residues,
        }
    }

    /// Multiplies residue `i` by `scalars[i]`.
    pub fn mul_scalars(&self, scalars: &[u64]) -> RnsPoly {
        assert_eq!(scalars.len(), self.moduli.len(), "one scalar per prime");
        let residues = izip!(&self.moduli, &self.residues, scalars)
            .map(|(&q, r, &s)| r.iter().map(|&c| q.mul(c, s)).collect())
            .collect();
        RnsPoly {
            moduli: self.moduli.clone(),
            residues,
        }
    }

    /// Multiplies by `scalar`, reduced per prime.
    pub fn mul_scalar(&self, scalar: u64) -> RnsPoly {
        let scalars: Vec<u64> = self.moduli.iter().map(|q| q.reduce(scalar)).collect();
        self.mul_scalars(&scalars)
    }

    /// Reinterprets the polynomial modulo all but the last prime.
    pub fn drop_last(&self) -> RnsPoly {
        let keep = self.moduli.len().saturating_sub(1);
        RnsPoly {
            moduli: self.moduli[..keep].to_vec(),
            residues: self.residues[..keep].to_vec(),
        }
    }

    /// Computes round(f / q_last) modulo the remaining primes.
    pub fn divide_and_round_last(&self) -> Result<RnsPoly> {
        let (q_last, rest) = self
            .moduli
            .split_last()
            .filter(|(_, rest)| !rest.is_empty())
            .ok_or_else(|| Error::InvalidParameters("need at least two primes to divide".into()))?;
        let half = q_last.value() >> 1;
        let shifted_last: Vec<u64> = self.residues[rest.len()]
            .iter()
            .map(|&c| q_last.add(c, q_last.reduce(half)))
            .collect();

        let mut residues = Vec::with_capacity(rest.len());
        for (&q, r) in rest.iter().zip(&self.residues) {
            let inv = q.inv(q.reduce(q_last.value())).ok_or_else(|| {
                Error::InvalidParameters(format!(
                    "{} and {} are not coprime",
                    q.value(),
                    q_last.value()
                ))
            })?;
            let half_mod = q.reduce(half);
            residues.push(
                r.iter()
                    .zip(&shifted_last)
                    .map(|(&c, &l)| {
                        let numerator = q.sub(q.add(c, half_mod), q.reduce(l));
                        q.mul(numerator, inv)
                    })
                    .collect(),
            );
        }
        Ok(RnsPoly {
            moduli: rest.to_vec(),
            residues,
        })
    }

    /// Uniform over Z_Q.
    pub fn sample_uniform<R: Rng>(moduli: &[Modulus], degree: usize, rng: &mut R) -> Self {
        let residues = moduli
            .iter()
            .map(|q| (0..degree).map(|_| rng.gen_range(0..q.value())).collect())
            .collect();
        Self {
            moduli: moduli.to_vec(),
            residues,
        }
    }

    /// Coefficients uniform in {-1, 0, 1}.
    pub fn sample_ternary<R: Rng>(moduli: &[Modulus], degree: usize, rng: &mut R) -> Self {
        let coeffs: Vec<i64> = (0..degree).map(|_| rng.gen_range(-1..=1)).collect();
        Self::from_signed(moduli, &coeffs)
    }

    /// Rounded Gaussian, rejected beyond [`NOISE_MAX_DEVIATIONS`] standard deviations.
    pub fn sample_gaussian<R: Rng>(
        moduli: &[Modulus],
        degree: usize,
        std_dev: f64,
        rng: &mut R,
    ) -> Result<Self> {
        let normal = Normal::new(0.0, std_dev)
            .map_err(|e| Error::InvalidParameters(format!("noise distribution: {e}")))?;
        let bound = NOISE_MAX_DEVIATIONS * std_dev;
        let coeffs: Vec<i64> = (0..degree)
            .map(|_| loop {
                let x = normal.sample(&mut *rng).round();
                if x.abs() <= bound {
                    break x as i64;
                }
            })
            .collect();
        Ok(Self::from_signed(moduli, &coeffs))
    }
}

impl Add for &RnsPoly {
    type Output = RnsPoly;
    fn add(self, rhs: Self) -> Self::Output {
        assert_eq!(self.moduli, rhs.moduli, "moduli must match");
        let residues = izip!(&self.moduli, &self.residues, &rhs.residues)
            .map(|(&q, a, b)| a.iter().zip(b).map(|(&x, &y)| q.add(x, y)).collect())
            .collect();
        RnsPoly {
            moduli: self.moduli.clone(),
            residues,
        }
    }
}

impl Add for RnsPoly {
    type Output = RnsPoly;
    fn add(self, rhs: Self) -> Self::Output {
        &self + &rhs
    }
}

impl Add<&RnsPoly> for RnsPoly {
    type Output = RnsPoly;
    fn add(self, rhs: &RnsPoly) -> Self::Output {
        &self + rhs
    }
}

impl Sub for &RnsPoly {
    type Output = RnsPoly;
    fn sub(self, rhs: Self) -> Self::Output {
        assert_eq!(self.moduli, rhs.moduli, "moduli must match");
        let residues = izip!(&self.moduli, &self.residues, &rhs.residues)
            .map(|(&q, a, b)| a.iter().zip(b).map(|(&x, &y)| q.sub(x, y)).collect())
            .collect();
        RnsPoly {
            moduli: self.moduli.clone(),
            residues,
        }
    }
}

impl Sub for RnsPoly {
    type Output = RnsPoly;
    fn sub(self, rhs: Self) -> Self::Output {
        &self - &rhs
    }
}

impl Neg for &RnsPoly {
    type Output = RnsPoly;
    fn neg(self) -> Self::Output {
        let residues = self
            .moduli
            .iter()
            .zip(&self.residues)
            .map(|(&q, r)| r.iter().map(|&c| q.neg(c)).collect())
            .collect();
        RnsPoly {
            moduli: self.moduli.clone(),
            residues,
        }
    }
}

impl Neg for RnsPoly {
    type Output = RnsPoly;
    fn neg(self) -> Self::Output {
        -&self
    }
}

/// CRT data for a fixed list of pairwise coprime moduli.
#[derive(Clone, Debug)]
pub struct RnsBase {
    moduli: Vec<Modulus>,
    product: BigUint,
    /// Q / q_i
    punctured: Vec<BigUint>,
    /// (Q / q_i)^{-1} mod q_i
    inv_punctured: Vec<u64>,
}

impl RnsBase {
    /// Fails on an empty or non-coprime base.
    pub fn new(moduli: &[Modulus]) -> Result<Self> {
        if moduli.is_empty() {
            return Err(Error::InvalidParameters("empty RNS base".into()));
        }
        let product = moduli
            .iter()
            .fold(BigUint::from(1u8), |acc, q| acc * q.value());

        let mut punctured = Vec::with_capacity(moduli.len());
        let mut inv_punctured = Vec::with_capacity(moduli.len());
        for &q in moduli {
            let p = &product / q.value();
            let p_mod = (&p % q.value()).to_u64().unwrap_or(0);
            let inv = q.inv(p_mod).ok_or_else(|| {
                Error::InvalidParameters(format!("{} is not coprime to the base", q.value()))
            })?;
            punctured.push(p);
            inv_punctured.push(inv);
        }

        Ok(Self {
            moduli: moduli.to_vec(),
            product,
            punctured,
            inv_punctured,
        })
    }

    /// Primes of the base.
    #[inline]
    pub fn moduli(&self) -> &[Modulus] {
        &self.moduli
    }

    /// Q = Π q_i
    #[inline]
    pub fn product(&self) -> &BigUint {
        &self.product
    }

    /// Residues of `value` modulo every prime of the base.
    pub fn decompose(&self, value: &BigUint) -> Vec<u64> {
        self.moduli
            .iter()
            .map(|q| (value % q.value()).to_u64().unwrap_or(0))
            .collect()
    }

    /// Coefficients as integers in [0, Q).
    pub fn compose(&self, poly: &RnsPoly) -> Vec<BigUint> {
        assert_eq!(poly.moduli(), self.moduli.as_slice(), "moduli must match");
        (0..poly.degree())
            .map(|j| {
                let mut acc = BigUint::zero();
                for (i, &q) in self.moduli.iter().enumerate() {
                    let y = q.mul(poly.residues[i][j], self.inv_punctured[i]);
                    acc += &self.punctured[i] * y;
                }
                acc.mod_floor(&self.product)
            })
            .collect()
    }

    /// Coefficients lifted to (-Q/2, Q/2] and converted to `f64`.
    pub fn compose_centered(&self, poly: &RnsPoly) -> Vec<f64> {
        let half = &self.product >> 1u32;
        self.compose(poly)
            .into_iter()
            .map(|x| {
                if x > half {
                    -(&self.product - x).to_f64().unwrap_or(f64::NAN)
                } else {
                    x.to_f64().unwrap_or(f64::NAN)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn small_primes() -> Vec<Modulus> {
        [97u64, 113, 193]
            .iter()
            .map(|&q| Modulus::new(q).unwrap())
            .collect()
    }

    #[test]
    fn test_basic_ops() {
        let moduli = small_primes();
        let p1 = RnsPoly::from_signed(&moduli, &[1, 2, 3, -4]);
        let p2 = RnsPoly::from_signed(&moduli, &[4, 5, 6, 4]);

        assert_eq!(&p1 + &p2, RnsPoly::from_signed(&moduli, &[5, 7, 9, 0]));
        assert_eq!(&p1 - &p2, RnsPoly::from_signed(&moduli, &[-3, -3, -3, -8]));
        assert_eq!(-p1.clone(), RnsPoly::from_signed(&moduli, &[-1, -2, -3, 4]));
        assert_eq!(p1.mul_scalar(2), RnsPoly::from_signed(&moduli, &[2, 4, 6, -8]));
        assert!((&p1 - &p1).is_zero());
        assert_eq!(p1.coeff_count(), 12);
    }

    #[test]
    fn test_multiply_wraps_negacyclically() {
        let moduli = small_primes();
        let tables: Vec<NttTables> = moduli
            .iter()
            .map(|&q| NttTables::new(4, q).unwrap())
            .collect();
        // (1 + X^3) · X = X + X^4 = X - 1
        let a = RnsPoly::from_signed(&moduli, &[1, 0, 0, 1]);
        let x = RnsPoly::from_signed(&moduli, &[0, 1, 0, 0]);
        assert_eq!(
            a.multiply(&x, &tables),
            RnsPoly::from_signed(&moduli, &[-1, 1, 0, 0])
        );
    }

    #[test]
    fn test_compose_centered() {
        let moduli = small_primes();
        let base = RnsBase::new(&moduli).unwrap();
        let poly = RnsPoly::from_signed(&moduli, &[0, 1, -1, 1_000_000, -1_000_000]);
        assert_eq!(
            base.compose_centered(&poly),
            vec![0.0, 1.0, -1.0, 1_000_000.0, -1_000_000.0]
        );
        let big = BigUint::from(1_234_567u32);
        let digits = base.decompose(&big);
        let back = RnsPoly::from_residues(
            &moduli,
            digits.iter().map(|&d| vec![d]).collect(),
        )
        .unwrap();
        assert_eq!(base.compose(&back), vec![big]);
    }

    #[test]
    fn test_divide_and_round_last() {
        let moduli = small_primes();
        let values = [0i64, 193, 96, 97, -290, 193 * 50 + 100];
        let poly = RnsPoly::from_signed(&moduli, &values);
        let divided = poly.divide_and_round_last().unwrap();
        let base = RnsBase::new(&moduli[..2]).unwrap();
        let expected: Vec<f64> = values
            .iter()
            .map(|&v| (v as f64 / 193.0).round())
            .collect();
        assert_eq!(base.compose_centered(&divided), expected);
        assert!(divided.drop_last().divide_and_round_last().is_err());
    }

    #[test]
    fn test_sampling_ranges() {
        let moduli = small_primes();
        let mut rng = StdRng::seed_from_u64(3);
        let base = RnsBase::new(&moduli).unwrap();

        let ternary = RnsPoly::sample_ternary(&moduli, 256, &mut rng);
        assert!(base
            .compose_centered(&ternary)
            .iter()
            .all(|c| (-1.0..=1.0).contains(c)));

        let gaussian =
            RnsPoly::sample_gaussian(&moduli, 256, NOISE_STANDARD_DEVIATION, &mut rng).unwrap();
        let bound = NOISE_MAX_DEVIATIONS * NOISE_STANDARD_DEVIATION;
        assert!(base
            .compose_centered(&gaussian)
            .iter()
            .all(|c| c.abs() <= bound));

        let uniform = RnsPoly::sample_uniform(&moduli, 256, &mut rng);
        assert!(uniform.is_well_formed());
        assert!(RnsPoly::sample_gaussian(&moduli, 4, f64::NAN, &mut rng).is_err());
    }
}
