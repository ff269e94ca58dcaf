//! Negacyclic NTT over Z_q[X]/(X^N + 1).

use crate::error::{Error, Result};
use crate::modulus::Modulus;

// ------------------------------------------------------------
// primitive-root search
// ------------------------------------------------------------
fn factorize(mut n: u64) -> Vec<u64> {
    let mut factors = Vec::new();
    let mut p = 2u64;
    while p * p <= n {
        if n % p == 0 {
            factors.push(p);
            while n % p == 0 {
                n /= p;
            }
        }
        p += if p == 2 { 1 } else { 2 };
    }
    if n > 1 {
        factors.push(n);
    }
    factors
}

fn is_generator(g: u64, modulus: Modulus, factors: &[u64]) -> bool {
    let phi = modulus.value() - 1;
    factors.iter().all(|&p| modulus.pow(g, phi / p) != 1)
}

/// Smallest generator of the multiplicative group of a prime field.
fn find_generator(modulus: Modulus) -> Result<u64> {
    let factors = factorize(modulus.value() - 1);
    (2..modulus.value())
        .find(|&g| is_generator(g, modulus, &factors))
        .ok_or_else(|| {
            Error::InvalidParameters(format!("no generator modulo {}", modulus.value()))
        })
}

/// A primitive `order`-th root of unity modulo a prime `q` with `order | q - 1`.
pub fn primitive_root(order: u64, modulus: Modulus) -> Result<u64> {
    let q = modulus.value();
    if !modulus.is_prime() || (q - 1) % order != 0 {
        return Err(Error::InvalidParameters(format!(
            "{q} has no primitive root of order {order}"
        )));
    }
    let g = find_generator(modulus)?;
    Ok(modulus.pow(g, (q - 1) / order))
}

// ------------------------------------------------------------
// bit-reverse & transform
// ------------------------------------------------------------
fn bit_reverse(values: &mut [u64]) {
    let n = values.len();
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            values.swap(i, j);
        }
    }
}

/// Precomputed twiddles for one prime and one degree.
#[derive(Clone, Debug)]
pub struct NttTables {
    modulus: Modulus,
    degree: usize,
    /// ψ^i, with ψ a primitive 2N-th root.
    psi_powers: Vec<u64>,
    /// ψ^{-i} · N^{-1}
    psi_inv_powers: Vec<u64>,
    /// Per butterfly stage: ω^{N/len} with ω = ψ².
    stage_roots: Vec<u64>,
    stage_inv_roots: Vec<u64>,
}

impl NttTables {
    /// Needs `modulus ≡ 1 mod 2·degree` so that a primitive 2N-th root exists.
    pub fn new(degree: usize, modulus: Modulus) -> Result<Self> {
        if !degree.is_power_of_two() || degree < 2 {
            return Err(Error::InvalidParameters(format!(
                "NTT degree {degree} is not a power of two"
            )));
        }
        let psi = primitive_root(2 * degree as u64, modulus)?;
        let psi_inv = modulus
            .inv(psi)
            .ok_or_else(|| Error::InvalidParameters(format!("{psi} is not invertible")))?;
        let n_inv = modulus.inv(degree as u64 % modulus.value()).ok_or_else(|| {
            Error::InvalidParameters(format!("{degree} is not invertible mod {}", modulus.value()))
        })?;

        let mut psi_powers = Vec::with_capacity(degree);
        let mut psi_inv_powers = Vec::with_capacity(degree);
        let (mut fwd, mut inv) = (1u64, n_inv);
        for _ in 0..degree {
            psi_powers.push(fwd);
            psi_inv_powers.push(inv);
            fwd = modulus.mul(fwd, psi);
            inv = modulus.mul(inv, psi_inv);
        }

        let omega = modulus.mul(psi, psi);
        let omega_inv = modulus.mul(psi_inv, psi_inv);
        let mut stage_roots = Vec::new();
        let mut stage_inv_roots = Vec::new();
        let mut len = 2;
        while len <= degree {
            let exp = (degree / len) as u64;
            stage_roots.push(modulus.pow(omega, exp));
            stage_inv_roots.push(modulus.pow(omega_inv, exp));
            len <<= 1;
        }

        Ok(Self {
            modulus,
            degree,
            psi_powers,
            psi_inv_powers,
            stage_roots,
            stage_inv_roots,
        })
    }

    /// Prime the tables were built for.
    #[inline]
    pub fn modulus(&self) -> Modulus {
        self.modulus
    }

    /// Transform length N.
    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Coefficients → evaluations at ψ^{2k+1}, k = 0..N.
    pub fn forward(&self, values: &mut [u64]) {
        debug_assert_eq!(values.len(), self.degree);
        for (x, &p) in values.iter_mut().zip(&self.psi_powers) {
            *x = self.modulus.mul(*x, p);
        }
        self.cyclic(values, &self.stage_roots);
    }

    /// Inverse of [`NttTables::forward`].
    pub fn inverse(&self, values: &mut [u64]) {
        debug_assert_eq!(values.len(), self.degree);
        self.cyclic(values, &self.stage_inv_roots);
        for (x, &p) in values.iter_mut().zip(&self.psi_inv_powers) {
            *x = self.modulus.mul(*x, p);
        }
    }

    fn cyclic(&self, a: &mut [u64], roots: &[u64]) {
        let q = self.modulus;
        let n = a.len();
        bit_reverse(a);

        let mut len = 2;
        for &w_len in roots {
            let half = len / 2;
            for start in (0..n).step_by(len) {
                let mut w = 1u64;
                for j in 0..half {
                    let u = a[start + j];
                    let v = q.mul(a[start + j + half], w);
                    a[start + j] = q.add(u, v);
                    a[start + j + half] = q.sub(u, v);
                    w = q.mul(w, w_len);
                }
            }
            len <<= 1;
        }
    }

    /// Negacyclic product of two coefficient vectors.
    pub fn multiply(&self, a: &[u64], b: &[u64]) -> Vec<u64> {
        let mut fa = a.to_vec();
        let mut fb = b.to_vec();
        self.forward(&mut fa);
        self.forward(&mut fb);
        for (x, y) in fa.iter_mut().zip(&fb) {
            *x = self.modulus.mul(*x, *y);
        }
        self.inverse(&mut fa);
        fa
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn schoolbook_negacyclic(a: &[u64], b: &[u64], q: Modulus) -> Vec<u64> {
        let n = a.len();
        let mut out = vec![0u64; n];
        for i in 0..n {
            for j in 0..n {
                let prod = q.mul(a[i], b[j]);
                let k = i + j;
                if k < n {
                    out[k] = q.add(out[k], prod);
                } else {
                    out[k - n] = q.sub(out[k - n], prod);
                }
            }
        }
        out
    }

    #[test]
    fn test_primitive_root_order() {
        let q = Modulus::new(786_433).unwrap();
        let psi = primitive_root(8192, q).unwrap();
        assert_eq!(q.pow(psi, 8192), 1);
        assert_eq!(q.pow(psi, 4096), 786_432);
        assert!(primitive_root(1 << 19, q).is_err());
        assert!(primitive_root(8, Modulus::new(91).unwrap()).is_err());
    }

    #[test]
    fn test_find_generator() {
        let q = Modulus::new(97).unwrap();
        let g = find_generator(q).unwrap();
        assert_eq!(g, 5);
        assert!(is_generator(g, q, &factorize(96)));
        // Z_2^* is trivial, so there is nothing to search
        assert!(find_generator(Modulus::new(2).unwrap()).is_err());
    }

    #[test]
    fn test_forward_inverse_identity() {
        let q = Modulus::new(0xf_fffe_e001).unwrap();
        let tables = NttTables::new(64, q).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let original: Vec<u64> = (0..64).map(|_| rng.gen_range(0..q.value())).collect();
        let mut values = original.clone();
        tables.forward(&mut values);
        assert_ne!(values, original);
        tables.inverse(&mut values);
        assert_eq!(values, original);
    }

    #[test]
    fn test_multiply_matches_schoolbook() {
        let q = Modulus::new(786_433).unwrap();
        let tables = NttTables::new(32, q).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let a: Vec<u64> = (0..32).map(|_| rng.gen_range(0..q.value())).collect();
        let b: Vec<u64> = (0..32).map(|_| rng.gen_range(0..q.value())).collect();
        assert_eq!(tables.multiply(&a, &b), schoolbook_negacyclic(&a, &b, q));
    }

    #[test]
    fn test_x_to_the_n_is_minus_one() {
        let q = Modulus::new(97).unwrap();
        let tables = NttTables::new(8, q).unwrap();
        // X^4 · X^4 = X^8 = -1
        let mut x4 = vec![0u64; 8];
        x4[4] = 1;
        let prod = tables.multiply(&x4, &x4);
        let mut expected = vec![0u64; 8];
        expected[0] = 96;
        assert_eq!(prod, expected);
    }
}
