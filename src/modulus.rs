//! Word-sized moduli, primality, and default modulus chains.

use std::collections::BTreeMap;

use num_integer::Integer;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest bit count accepted for any modulus.
pub const MAX_MODULUS_BITS: u32 = 61;
/// Largest bit count accepted for a coefficient-modulus prime.
pub const MAX_COEFF_MODULUS_BITS: u32 = 60;

/// Default 128-bit secure coefficient-modulus chains, keyed by polynomial degree.
const DEFAULT_COEFF_MODULUS_128: &[(usize, &[u64])] = &[
    (1024, &[0x7e0_0001]),
    (2048, &[0x3f_ffff_ff00_0001]),
    (4096, &[0xf_fffe_e001, 0xf_fffc_4001, 0x1f_fffe_0001]),
    (
        8192,
        &[
            0x7ff_fffd_8001,
            0x7ff_fffc_8001,
            0xfff_ffff_c001,
            0xfff_fff6_c001,
            0xfff_ffeb_c001,
        ],
    ),
    (
        16384,
        &[
            0xffff_fffd_8001,
            0xffff_fffa_0001,
            0xffff_fff0_0001,
            0x1_ffff_fff6_8001,
            0x1_ffff_fff5_0001,
            0x1_ffff_ffee_8001,
            0x1_ffff_ffea_0001,
            0x1_ffff_ffe8_8001,
            0x1_ffff_ffe4_8001,
        ],
    ),
];

/// Total coefficient-modulus bit budget for 128-bit security (HE standard, ternary secrets).
const MAX_BIT_COUNT_128: &[(usize, u32)] = &[
    (1024, 27),
    (2048, 54),
    (4096, 109),
    (8192, 218),
    (16384, 438),
    (32768, 881),
];

#[inline]
pub(crate) fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) % u128::from(modulus)) as u64
}

#[inline]
pub(crate) fn pow_mod(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    let mut result = 1 % modulus;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, modulus);
        }
        base = mul_mod(base, base, modulus);
        exp >>= 1;
    }
    result
}

/// Deterministic Miller-Rabin for every `u64`.
pub fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    if n < 2 {
        return false;
    }
    for p in WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    let s = (n - 1).trailing_zeros();
    let d = (n - 1) >> s;
    'witness: for a in WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// An integer modulus of at most 61 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Modulus(u64);

impl Modulus {
    /// Rejects values below 2 or wider than 61 bits.
    pub fn new(value: u64) -> Result<Self> {
        if value < 2 {
            return Err(Error::InvalidParameters(format!(
                "modulus {value} must be at least 2"
            )));
        }
        if 64 - value.leading_zeros() > MAX_MODULUS_BITS {
            return Err(Error::InvalidParameters(format!(
                "modulus {value} exceeds {MAX_MODULUS_BITS} bits"
            )));
        }
        Ok(Self(value))
    }

    /// The modulus as an integer.
    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }

    /// Significant bits.
    #[inline]
    pub fn bit_count(self) -> u32 {
        64 - self.0.leading_zeros()
    }

    /// Deterministic Miller-Rabin.
    pub fn is_prime(self) -> bool {
        is_prime(self.0)
    }

    /// x mod q
    #[inline]
    pub fn reduce(self, x: u64) -> u64 {
        x % self.0
    }

    /// Reduces a signed value into `[0, modulus)`.
    #[inline]
    pub fn reduce_i64(self, x: i64) -> u64 {
        x.rem_euclid(self.0 as i64) as u64
    }

    /// Inputs must already be reduced; same for `sub` and `neg`.
    #[inline]
    pub fn add(self, a: u64, b: u64) -> u64 {
        let sum = a + b;
        if sum >= self.0 {
            sum - self.0
        } else {
            sum
        }
    }

    /// (a - b) mod q
    #[inline]
    pub fn sub(self, a: u64, b: u64) -> u64 {
        if a >= b {
            a - b
        } else {
            a + self.0 - b
        }
    }

    /// -a mod q
    #[inline]
    pub fn neg(self, a: u64) -> u64 {
        if a == 0 {
            0
        } else {
            self.0 - a
        }
    }

    /// (a · b) mod q through a 128-bit product.
    #[inline]
    pub fn mul(self, a: u64, b: u64) -> u64 {
        mul_mod(a, b, self.0)
    }

    /// Square and multiply.
    #[inline]
    pub fn pow(self, base: u64, exp: u64) -> u64 {
        pow_mod(base, exp, self.0)
    }

    /// Multiplicative inverse, if `a` is a unit.
    pub fn inv(self, a: u64) -> Option<u64> {
        let m = i128::from(self.0);
        let egcd = i128::from(a % self.0).extended_gcd(&m);
        if egcd.gcd != 1 {
            return None;
        }
        Some(egcd.x.rem_euclid(m) as u64)
    }
}

/// Coefficient-modulus chain selection.
pub struct CoeffModulus;

impl CoeffModulus {
    /// Largest total bit count of the coefficient modulus that keeps 128-bit security.
    pub fn max_bit_count(poly_modulus_degree: usize) -> Option<u32> {
        MAX_BIT_COUNT_128
            .iter()
            .find(|(degree, _)| *degree == poly_modulus_degree)
            .map(|&(_, bits)| bits)
    }

    /// The default chain for `poly_modulus_degree` at 128-bit security.
    pub fn bfv_default(poly_modulus_degree: usize) -> Result<Vec<Modulus>> {
        let (_, primes) = DEFAULT_COEFF_MODULUS_128
            .iter()
            .find(|(degree, _)| *degree == poly_modulus_degree)
            .ok_or_else(|| {
                Error::InvalidParameters(format!(
                    "no default coefficient modulus for degree {poly_modulus_degree}"
                ))
            })?;
        primes.iter().map(|&p| Modulus::new(p)).collect()
    }

    /// Largest distinct primes `p ≡ 1 (mod 2N)` with the requested bit sizes, in request order.
    pub fn create(poly_modulus_degree: usize, bit_sizes: &[u32]) -> Result<Vec<Modulus>> {
        if !poly_modulus_degree.is_power_of_two() || poly_modulus_degree < 2 {
            return Err(Error::InvalidParameters(format!(
                "degree {poly_modulus_degree} is not a power of two"
            )));
        }
        if bit_sizes.is_empty() {
            return Err(Error::InvalidParameters(
                "at least one bit size is required".into(),
            ));
        }

        let mut requested: BTreeMap<u32, usize> = BTreeMap::new();
        for &bits in bit_sizes {
            if !(2..=MAX_COEFF_MODULUS_BITS).contains(&bits) {
                return Err(Error::InvalidParameters(format!(
                    "bit size {bits} is outside 2..={MAX_COEFF_MODULUS_BITS}"
                )));
            }
            *requested.entry(bits).or_default() += 1;
        }

        let factor = 2 * poly_modulus_degree as u64;
        let mut found: BTreeMap<u32, Vec<Modulus>> = BTreeMap::new();
        for (&bits, &count) in &requested {
            found.insert(bits, ntt_friendly_primes(factor, bits, count)?);
        }

        let mut taken: BTreeMap<u32, usize> = BTreeMap::new();
        Ok(bit_sizes
            .iter()
            .map(|bits| {
                let next = taken.entry(*bits).or_default();
                let prime = found[bits][*next];
                *next += 1;
                prime
            })
            .collect())
    }
}

/// Plaintext-modulus selection.
pub struct PlainModulus;

impl PlainModulus {
    /// A prime of `bit_size` bits that enables batching at `poly_modulus_degree`.
    pub fn batching(poly_modulus_degree: usize, bit_size: u32) -> Result<Modulus> {
        Ok(CoeffModulus::create(poly_modulus_degree, &[bit_size])?[0])
    }
}

/// Walks down from `2^bits` in steps of `factor` collecting primes.
fn ntt_friendly_primes(factor: u64, bits: u32, count: usize) -> Result<Vec<Modulus>> {
    let upper = 1u64 << bits;
    let lower = 1u64 << (bits - 1);
    let mut primes = Vec::with_capacity(count);
    if factor >= upper {
        return Err(Error::InvalidParameters(format!(
            "no {bits}-bit primes congruent to 1 mod {factor}"
        )));
    }

    let mut candidate = upper + 1 - factor;
    while primes.len() < count && candidate > lower {
        if is_prime(candidate) {
            primes.push(Modulus::new(candidate)?);
        }
        candidate -= factor;
    }

    if primes.len() < count {
        return Err(Error::InvalidParameters(format!(
            "found only {} of {count} {bits}-bit primes congruent to 1 mod {factor}",
            primes.len()
        )));
    }
    Ok(primes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_prime() {
        let primes = [2u64, 3, 17, 786_433, 1_032_193, 0xf_fffe_e001, 0x1f_fffe_0001];
        let composites = [0u64, 1, 4, 561, 786_435, 0xf_fffe_e003, u64::MAX];
        assert!(primes.iter().all(|&p| is_prime(p)));
        assert!(composites.iter().all(|&c| !is_prime(c)));
    }

    #[test]
    fn test_modular_arithmetic() {
        let q = Modulus::new(17).unwrap();
        assert_eq!(q.add(16, 5), 4);
        assert_eq!(q.sub(3, 5), 15);
        assert_eq!(q.neg(0), 0);
        assert_eq!(q.neg(1), 16);
        assert_eq!(q.mul(16, 16), 1);
        assert_eq!(q.pow(3, 16), 1);
        assert_eq!(q.reduce_i64(-1), 16);
        let inv = q.inv(5).unwrap();
        assert_eq!(q.mul(inv, 5), 1);
        assert_eq!(Modulus::new(16).unwrap().inv(4), None);
    }

    #[test]
    fn test_modulus_bounds() {
        assert!(Modulus::new(0).is_err());
        assert!(Modulus::new(1).is_err());
        assert!(Modulus::new(1 << 61).is_err());
        assert_eq!(Modulus::new((1 << 61) - 1).unwrap().bit_count(), 61);
    }

    #[test]
    fn test_default_chain_4096() {
        let chain = CoeffModulus::bfv_default(4096).unwrap();
        let values: Vec<u64> = chain.iter().map(|m| m.value()).collect();
        assert_eq!(values, vec![0xf_fffe_e001, 0xf_fffc_4001, 0x1f_fffe_0001]);
        let bits: u32 = chain.iter().map(|m| m.bit_count()).sum();
        assert_eq!(bits, 109);
    }

    #[test]
    fn test_default_chains_are_ntt_friendly() {
        for &(degree, _) in DEFAULT_COEFF_MODULUS_128 {
            let chain = CoeffModulus::bfv_default(degree).unwrap();
            let bits: u32 = chain.iter().map(|m| m.bit_count()).sum();
            assert!(bits <= CoeffModulus::max_bit_count(degree).unwrap());
            for q in chain {
                assert!(q.is_prime());
                assert_eq!(q.value() % (2 * degree as u64), 1);
            }
        }
        assert!(CoeffModulus::bfv_default(512).is_err());
    }

    #[test]
    fn test_create_matches_default_chain() {
        let created = CoeffModulus::create(4096, &[36, 36, 37]).unwrap();
        assert_eq!(created, CoeffModulus::bfv_default(4096).unwrap());
    }

    #[test]
    fn test_create_preserves_request_order() {
        let created = CoeffModulus::create(16, &[30, 17, 30]).unwrap();
        assert_eq!(created[0].value(), 1_073_741_441);
        assert_eq!(created[1].value(), 131_041);
        assert_eq!(created[2].value(), 1_073_740_609);
        assert!(CoeffModulus::create(16, &[61]).is_err());
        assert!(CoeffModulus::create(4096, &[12]).is_err());
    }

    #[test]
    fn test_batching_plain_modulus() {
        let t = PlainModulus::batching(4096, 20).unwrap();
        assert_eq!(t.value(), 1_032_193);
        assert_eq!(786_433 % 8192, 1);
    }
}
