//! Per-scheme knobs of the benchmark pipeline.
//!
//! Everything that differs between BFV, CKKS and BGV (parameters, encoder, sample data) lives
//! behind [`SchemeDescriptor`]; the pipeline itself is written once.

use rand::Rng;

use crate::cipher::Plaintext;
use crate::config::HarnessConfig;
use crate::context::Context;
use crate::encoder::{BatchEncoder, CkksEncoder};
use crate::error::{Error, Result};
use crate::modulus::{CoeffModulus, Modulus};
use crate::params::{EncryptionParameters, SchemeType};

/// Step applied between consecutive CKKS samples.
pub const CKKS_SAMPLE_STEP: f64 = 1.001;

/// What differs between the three benchmark routines: parameters, encoder and sample data.
pub trait SchemeDescriptor {
    /// Name used in the report lines.
    const NAME: &'static str;
    /// Prefix of the `<prefix>_pt` / `<prefix>_ct` artifacts.
    const FILE_PREFIX: &'static str;
    /// Scheme the parameters are built for.
    const SCHEME: SchemeType;

    /// Encoder borrowing the context.
    type Encoder<'a>;
    /// One slot value.
    type Sample: Copy + PartialEq + std::fmt::Debug;

    /// Parameters for this scheme at the configured degree.
    fn build_parameters(config: &HarnessConfig) -> Result<EncryptionParameters>;
    /// Builds the scheme's encoder.
    fn encoder(context: &Context) -> Result<Self::Encoder<'_>>;
    /// Number of slots in one plaintext.
    fn slot_count(encoder: &Self::Encoder<'_>) -> usize;
    /// One sample per slot.
    fn generate_samples<R: Rng>(
        context: &Context,
        encoder: &Self::Encoder<'_>,
        rng: &mut R,
    ) -> Result<Vec<Self::Sample>>;
    /// Packs the samples into one plaintext.
    fn encode(
        context: &Context,
        encoder: &Self::Encoder<'_>,
        samples: &[Self::Sample],
    ) -> Result<Plaintext>;
    /// Inverse of `encode`, approximate for CKKS.
    fn decode(encoder: &Self::Encoder<'_>, plain: &Plaintext) -> Result<Vec<Self::Sample>>;
}

/// Batched BFV over Z_t.
pub struct Bfv;
/// CKKS over real slots.
pub struct Ckks;
/// Batched BGV over Z_t.
pub struct Bgv;

fn exact_parameters(scheme: SchemeType, config: &HarnessConfig) -> Result<EncryptionParameters> {
    let degree = config.poly_modulus_degree;
    let mut parms = EncryptionParameters::new(scheme);
    parms
        .set_poly_modulus_degree(degree)
        .set_coeff_modulus(CoeffModulus::bfv_default(degree)?);
    parms.set_plain_modulus(config.plain_modulus)?;
    Ok(parms)
}

fn plain_modulus(context: &Context) -> Result<Modulus> {
    context
        .parms()
        .plain_modulus()
        .ok_or_else(|| Error::InvalidParameters(format!("{} has no plain modulus", context.scheme())))
}

/// Uniform `u64` draws reduced modulo t, one per slot.
fn random_slots<R: Rng>(context: &Context, slots: usize, rng: &mut R) -> Result<Vec<u64>> {
    let t = plain_modulus(context)?;
    Ok((0..slots).map(|_| t.reduce(rng.gen::<u64>())).collect())
}

/// sqrt of the last prime of the chain.
pub fn ckks_scale(context: &Context) -> Result<f64> {
    context
        .key_moduli()
        .last()
        .map(|q| (q.value() as f64).sqrt())
        .ok_or_else(|| Error::InvalidParameters("empty coefficient modulus".into()))
}

macro_rules! impl_exact_descriptor {
    ($ty:ident, $scheme:expr, $name:literal, $prefix:literal) => {
        impl SchemeDescriptor for $ty {
            const NAME: &'static str = $name;
            const FILE_PREFIX: &'static str = $prefix;
            const SCHEME: SchemeType = $scheme;

            type Encoder<'a> = BatchEncoder<'a>;
            type Sample = u64;

            fn build_parameters(config: &HarnessConfig) -> Result<EncryptionParameters> {
                exact_parameters(Self::SCHEME, config)
            }

            fn encoder(context: &Context) -> Result<BatchEncoder<'_>> {
                BatchEncoder::new(context)
            }

            fn slot_count(encoder: &BatchEncoder<'_>) -> usize {
                encoder.slot_count()
            }

            fn generate_samples<R: Rng>(
                context: &Context,
                encoder: &BatchEncoder<'_>,
                rng: &mut R,
            ) -> Result<Vec<u64>> {
                random_slots(context, encoder.slot_count(), rng)
            }

            fn encode(
                _context: &Context,
                encoder: &BatchEncoder<'_>,
                samples: &[u64],
            ) -> Result<Plaintext> {
                encoder.encode(samples)
            }

            fn decode(encoder: &BatchEncoder<'_>, plain: &Plaintext) -> Result<Vec<u64>> {
                encoder.decode(plain)
            }
        }
    };
}

impl_exact_descriptor!(Bfv, SchemeType::Bfv, "BFV", "bfv");
impl_exact_descriptor!(Bgv, SchemeType::Bgv, "BGV", "bgv");

impl SchemeDescriptor for Ckks {
    const NAME: &'static str = "CKKS";
    const FILE_PREFIX: &'static str = "ckks";
    const SCHEME: SchemeType = SchemeType::Ckks;

    type Encoder<'a> = CkksEncoder<'a>;
    type Sample = f64;

    fn build_parameters(config: &HarnessConfig) -> Result<EncryptionParameters> {
        let degree = config.poly_modulus_degree;
        let mut parms = EncryptionParameters::new(SchemeType::Ckks);
        parms
            .set_poly_modulus_degree(degree)
            .set_coeff_modulus(CoeffModulus::bfv_default(degree)?);
        Ok(parms)
    }

    fn encoder(context: &Context) -> Result<CkksEncoder<'_>> {
        CkksEncoder::new(context)
    }

    fn slot_count(encoder: &CkksEncoder<'_>) -> usize {
        encoder.slot_count()
    }

    /// Deterministic ramp `1.001 · i`.
    fn generate_samples<R: Rng>(
        _context: &Context,
        encoder: &CkksEncoder<'_>,
        _rng: &mut R,
    ) -> Result<Vec<f64>> {
        Ok((0..encoder.slot_count())
            .map(|i| CKKS_SAMPLE_STEP * i as f64)
            .collect())
    }

    fn encode(context: &Context, encoder: &CkksEncoder<'_>, samples: &[f64]) -> Result<Plaintext> {
        encoder.encode(samples, ckks_scale(context)?)
    }

    fn decode(encoder: &CkksEncoder<'_>, plain: &Plaintext) -> Result<Vec<f64>> {
        encoder.decode(plain)
    }
}
