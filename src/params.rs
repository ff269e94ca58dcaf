//! Encryption parameters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::modulus::Modulus;

/// The homomorphic-encryption scheme a parameter set is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemeType {
    /// Brakerski/Fan-Vercauteren, exact arithmetic mod t.
    Bfv,
    /// Cheon-Kim-Kim-Song, approximate arithmetic on reals.
    Ckks,
    /// Brakerski-Gentry-Vaikuntanathan, exact arithmetic mod t.
    Bgv,
}

impl SchemeType {
    /// Upper-case name used in reports and errors.
    pub fn name(self) -> &'static str {
        match self {
            SchemeType::Bfv => "BFV",
            SchemeType::Ckks => "CKKS",
            SchemeType::Bgv => "BGV",
        }
    }

    /// Whether the scheme works over Z_t (as opposed to approximate reals).
    pub fn is_exact(self) -> bool {
        !matches!(self, SchemeType::Ckks)
    }
}

impl fmt::Display for SchemeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Security requirement enforced when a context is created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityLevel {
    /// No bound on the coefficient modulus; only for tests and toy sizes.
    None,
    /// 128-bit classical security per the HE standard.
    #[default]
    Tc128,
}

/// Degree, coefficient modulus chain, and (for BFV/BGV) plaintext modulus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncryptionParameters {
    scheme: SchemeType,
    poly_modulus_degree: usize,
    coeff_modulus: Vec<Modulus>,
    plain_modulus: Option<Modulus>,
    security_level: SecurityLevel,
}

impl EncryptionParameters {
    /// Empty parameters: degree 0, no chain, no plain modulus.
    pub fn new(scheme: SchemeType) -> Self {
        Self {
            scheme,
            poly_modulus_degree: 0,
            coeff_modulus: Vec::new(),
            plain_modulus: None,
            security_level: SecurityLevel::default(),
        }
    }

    /// Ring degree N; must be a power of two.
    pub fn set_poly_modulus_degree(&mut self, degree: usize) -> &mut Self {
        self.poly_modulus_degree = degree;
        self
    }

    /// The last prime becomes the special prime when there is more than one.
    pub fn set_coeff_modulus(&mut self, coeff_modulus: Vec<Modulus>) -> &mut Self {
        self.coeff_modulus = coeff_modulus;
        self
    }

    /// Only meaningful for BFV and BGV; CKKS rejects it.
    pub fn set_plain_modulus(&mut self, value: u64) -> Result<&mut Self> {
        if self.scheme == SchemeType::Ckks {
            return Err(Error::UnsupportedScheme {
                scheme: self.scheme.name(),
                operation: "set_plain_modulus",
            });
        }
        self.plain_modulus = Some(Modulus::new(value)?);
        Ok(self)
    }

    /// Bounds the total chain size for the degree.
    pub fn set_security_level(&mut self, level: SecurityLevel) -> &mut Self {
        self.security_level = level;
        self
    }

    /// Scheme the parameters were created for.
    #[inline]
    pub fn scheme(&self) -> SchemeType {
        self.scheme
    }

    /// Ring degree N.
    #[inline]
    pub fn poly_modulus_degree(&self) -> usize {
        self.poly_modulus_degree
    }

    /// The coefficient modulus chain.
    #[inline]
    pub fn coeff_modulus(&self) -> &[Modulus] {
        &self.coeff_modulus
    }

    /// `None` for CKKS.
    #[inline]
    pub fn plain_modulus(&self) -> Option<Modulus> {
        self.plain_modulus
    }

    /// Security level the chain is checked against.
    #[inline]
    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    /// Sum of the bit counts of the coefficient-modulus primes.
    pub fn coeff_modulus_bit_count(&self) -> u32 {
        self.coeff_modulus.iter().map(|q| q.bit_count()).sum()
    }
}
