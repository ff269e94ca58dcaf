//! Validated parameters plus everything precomputed from them.

use num_bigint::BigUint;
use tracing::debug;

use crate::error::{Error, Result};
use crate::modulus::{CoeffModulus, Modulus, MAX_COEFF_MODULUS_BITS};
use crate::ntt::NttTables;
use crate::params::{EncryptionParameters, SchemeType, SecurityLevel};
use crate::polynomial::RnsBase;

const MAX_POLY_MODULUS_DEGREE: usize = 32768;

/// Keys live at the key level (whole chain); ciphertexts and CKKS plaintexts live at the
/// data level (chain without the last prime whenever the chain has more than one prime).
#[derive(Clone, Debug)]
pub struct Context {
    parms: EncryptionParameters,
    key_base: RnsBase,
    data_base: RnsBase,
    /// One table per key-level prime; the data level uses a prefix.
    ntt_tables: Vec<NttTables>,
    /// Present when the plaintext modulus supports batching.
    plain_ntt_tables: Option<NttTables>,
    /// floor(Q_data / t) modulo each data-level prime.
    delta: Vec<u64>,
}

impl Context {
    /// Validates `parms` and precomputes the RNS bases and NTT tables.
    ///
    /// Fails with `Error::InvalidParameters` when the degree, chain or plain modulus is unusable.
    pub fn new(parms: EncryptionParameters) -> Result<Self> {
        validate(&parms)?;
        let degree = parms.poly_modulus_degree();
        let chain = parms.coeff_modulus();
        let data_len = if chain.len() > 1 {
            chain.len() - 1
        } else {
            1
        };

        let key_base = RnsBase::new(chain)?;
        let data_base = RnsBase::new(&chain[..data_len])?;
        let ntt_tables = chain
            .iter()
            .map(|&q| NttTables::new(degree, q))
            .collect::<Result<Vec<_>>>()?;

        let mut plain_ntt_tables = None;
        let mut delta = Vec::new();
        if let Some(t) = parms.plain_modulus() {
            if t.is_prime() && (t.value() - 1) % (2 * degree as u64) == 0 {
                plain_ntt_tables = Some(NttTables::new(degree, t)?);
            }
            if data_base.product() <= &BigUint::from(t.value()) {
                return Err(Error::InvalidParameters(format!(
                    "plain modulus {} is not smaller than the data-level modulus",
                    t.value()
                )));
            }
            delta = data_base.decompose(&(data_base.product() / t.value()));
        }

        debug!(
            scheme = %parms.scheme(),
            degree,
            coeff_modulus_bits = parms.coeff_modulus_bit_count(),
            primes = chain.len(),
            batching = plain_ntt_tables.is_some(),
            "created encryption context"
        );

        Ok(Self {
            parms,
            key_base,
            data_base,
            ntt_tables,
            plain_ntt_tables,
            delta,
        })
    }

    /// The validated parameters.
    #[inline]
    pub fn parms(&self) -> &EncryptionParameters {
        &self.parms
    }

    /// Scheme of the parameters.
    #[inline]
    pub fn scheme(&self) -> SchemeType {
        self.parms.scheme()
    }

    /// Ring degree N.
    #[inline]
    pub fn poly_modulus_degree(&self) -> usize {
        self.parms.poly_modulus_degree()
    }

    /// The whole chain, used by keys.
    #[inline]
    pub fn key_moduli(&self) -> &[Modulus] {
        self.key_base.moduli()
    }

    /// The chain without its special prime, used by ciphertexts.
    #[inline]
    pub fn data_moduli(&self) -> &[Modulus] {
        self.data_base.moduli()
    }

    /// CRT data for the key level.
    #[inline]
    pub fn key_base(&self) -> &RnsBase {
        &self.key_base
    }

    /// CRT data for the data level.
    #[inline]
    pub fn data_base(&self) -> &RnsBase {
        &self.data_base
    }

    /// Whether a special prime sits above the data level.
    #[inline]
    pub fn has_special_prime(&self) -> bool {
        self.key_base.moduli().len() > self.data_base.moduli().len()
    }

    /// One table per key-level prime.
    #[inline]
    pub fn ntt_tables(&self) -> &[NttTables] {
        &self.ntt_tables
    }

    /// NTT modulo t, present only when batching is possible.
    #[inline]
    pub fn plain_ntt_tables(&self) -> Option<&NttTables> {
        self.plain_ntt_tables.as_ref()
    }

    /// Whether `BatchEncoder` can be built.
    #[inline]
    pub fn using_batching(&self) -> bool {
        self.plain_ntt_tables.is_some()
    }

    pub(crate) fn plain_modulus(&self) -> Result<Modulus> {
        self.parms.plain_modulus().ok_or(Error::UnsupportedScheme {
            scheme: self.scheme().name(),
            operation: "plain_modulus",
        })
    }

    #[inline]
    pub(crate) fn delta(&self) -> &[u64] {
        &self.delta
    }
}

fn validate(parms: &EncryptionParameters) -> Result<()> {
    let degree = parms.poly_modulus_degree();
    if degree < 2 || degree > MAX_POLY_MODULUS_DEGREE || !degree.is_power_of_two() {
        return Err(Error::InvalidParameters(format!(
            "poly_modulus_degree {degree} must be a power of two in 2..={MAX_POLY_MODULUS_DEGREE}"
        )));
    }

    let chain = parms.coeff_modulus();
    if chain.is_empty() {
        return Err(Error::InvalidParameters("coeff_modulus is empty".into()));
    }
    for (i, q) in chain.iter().enumerate() {
        if q.bit_count() > MAX_COEFF_MODULUS_BITS {
            return Err(Error::InvalidParameters(format!(
                "coeff_modulus prime {} exceeds {MAX_COEFF_MODULUS_BITS} bits",
                q.value()
            )));
        }
        if !q.is_prime() || (q.value() - 1) % (2 * degree as u64) != 0 {
            return Err(Error::InvalidParameters(format!(
                "coeff_modulus {} is not a prime congruent to 1 mod {}",
                q.value(),
                2 * degree
            )));
        }
        if chain[..i].contains(q) {
            return Err(Error::InvalidParameters(format!(
                "coeff_modulus {} appears twice",
                q.value()
            )));
        }
    }

    if parms.security_level() == SecurityLevel::Tc128 {
        let bound = CoeffModulus::max_bit_count(degree).ok_or_else(|| {
            Error::InvalidParameters(format!("degree {degree} is too small for 128-bit security"))
        })?;
        let bits = parms.coeff_modulus_bit_count();
        if bits > bound {
            return Err(Error::InvalidParameters(format!(
                "coeff_modulus has {bits} bits, more than the {bound} allowed at degree {degree}"
            )));
        }
    }

    match (parms.scheme(), parms.plain_modulus()) {
        (SchemeType::Ckks, Some(_)) => Err(Error::InvalidParameters(
            "CKKS does not use a plain modulus".into(),
        )),
        (SchemeType::Ckks, None) => Ok(()),
        (scheme, None) => Err(Error::InvalidParameters(format!(
            "{scheme} requires a plain modulus"
        ))),
        (_, Some(t)) => {
            if t.bit_count() > MAX_COEFF_MODULUS_BITS {
                return Err(Error::InvalidParameters(format!(
                    "plain modulus {} exceeds {MAX_COEFF_MODULUS_BITS} bits",
                    t.value()
                )));
            }
            if chain.iter().any(|q| q.value() % t.value() == 0) {
                return Err(Error::InvalidParameters(format!(
                    "plain modulus {} is not coprime to the coefficient modulus",
                    t.value()
                )));
            }
            Ok(())
        }
    }
}
