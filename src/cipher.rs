//! Plaintext and ciphertext containers and their native binary format.
//!
//! A saved object is a small header (magic, format version, object kind) followed by the
//! object itself, both encoded with `bincode`.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::params::SchemeType;
use crate::polynomial::RnsPoly;

const MAGIC: [u8; 4] = *b"HEBN";
const FORMAT_VERSION: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum ObjectKind {
    Plaintext,
    Ciphertext,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    magic: [u8; 4],
    version: u8,
    kind: ObjectKind,
}

impl Header {
    fn new(kind: ObjectKind) -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            kind,
        }
    }

    fn check(&self, expected: ObjectKind) -> Result<()> {
        if self.magic != MAGIC {
            return Err(Error::InvalidFormat("bad magic".into()));
        }
        if self.version != FORMAT_VERSION {
            return Err(Error::InvalidFormat(format!(
                "unsupported format version {}",
                self.version
            )));
        }
        if self.kind != expected {
            return Err(Error::InvalidFormat(format!(
                "expected a {expected:?}, found a {:?}",
                self.kind
            )));
        }
        Ok(())
    }
}

fn save_object<T: Serialize, W: Write>(kind: ObjectKind, object: &T, mut writer: W) -> Result<()> {
    bincode::serialize_into(&mut writer, &Header::new(kind))?;
    bincode::serialize_into(&mut writer, object)?;
    writer.flush()?;
    Ok(())
}

fn load_object<T: for<'de> Deserialize<'de>, R: Read>(kind: ObjectKind, mut reader: R) -> Result<T> {
    let header: Header = bincode::deserialize_from(&mut reader)?;
    header.check(kind)?;
    Ok(bincode::deserialize_from(&mut reader)?)
}

fn check_poly(context: &Context, poly: &RnsPoly, what: &str) -> Result<()> {
    if poly.degree() != context.poly_modulus_degree() || !poly.is_well_formed() {
        return Err(Error::ContextMismatch(format!(
            "{what} has the wrong shape for degree {}",
            context.poly_modulus_degree()
        )));
    }
    if poly.moduli() != context.data_moduli() {
        return Err(Error::ContextMismatch(format!(
            "{what} is not at the data level"
        )));
    }
    Ok(())
}

/// An encoded batch.
///
/// BFV/BGV: N coefficients modulo t. CKKS: N coefficients modulo every data-level prime,
/// together with the scale they were encoded at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plaintext {
    scheme: SchemeType,
    poly: RnsPoly,
    scale: f64,
}

impl Plaintext {
    pub(crate) fn new(scheme: SchemeType, poly: RnsPoly, scale: f64) -> Self {
        Self {
            scheme,
            poly,
            scale,
        }
    }

    /// Scheme the plaintext was encoded for.
    #[inline]
    pub fn scheme(&self) -> SchemeType {
        self.scheme
    }

    /// The encoded polynomial.
    #[inline]
    pub fn poly(&self) -> &RnsPoly {
        &self.poly
    }

    /// 1.0 for the exact schemes.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Number of stored words: N for BFV/BGV, N × data-level primes for CKKS.
    pub fn coeff_count(&self) -> usize {
        self.poly.coeff_count()
    }

    /// Whether every coefficient is zero.
    pub fn is_zero(&self) -> bool {
        self.poly.is_zero()
    }

    /// Checks scheme, moduli and shape against `context`.
    pub fn validate(&self, context: &Context) -> Result<()> {
        if self.scheme != context.scheme() {
            return Err(Error::ContextMismatch(format!(
                "{} plaintext used with a {} context",
                self.scheme,
                context.scheme()
            )));
        }
        if self.scheme.is_exact() {
            let t = context.plain_modulus()?;
            if self.poly.moduli() != [t]
                || self.poly.degree() != context.poly_modulus_degree()
                || !self.poly.is_well_formed()
            {
                return Err(Error::ContextMismatch(
                    "plaintext is not a polynomial modulo t".into(),
                ));
            }
            Ok(())
        } else {
            if !(self.scale.is_finite() && self.scale > 0.0) {
                return Err(Error::ContextMismatch(format!(
                    "plaintext scale {} is not positive",
                    self.scale
                )));
            }
            check_poly(context, &self.poly, "plaintext")
        }
    }

    /// Writes the native format: header, then the bincode body.
    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        save_object(ObjectKind::Plaintext, self, writer)
    }

    /// `save` into a buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.save(&mut bytes)?;
        Ok(bytes)
    }

    /// Reads a saved plaintext and checks it against `context`.
    pub fn load<R: Read>(context: &Context, reader: R) -> Result<Self> {
        let plain: Self = load_object(ObjectKind::Plaintext, reader)?;
        plain.validate(context)?;
        Ok(plain)
    }
}

/// A fresh two-component ciphertext (c0, c1) at the data level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ciphertext {
    scheme: SchemeType,
    c0: RnsPoly,
    c1: RnsPoly,
    scale: f64,
}

impl Ciphertext {
    pub(crate) fn new(scheme: SchemeType, c0: RnsPoly, c1: RnsPoly, scale: f64) -> Self {
        Self {
            scheme,
            c0,
            c1,
            scale,
        }
    }

    /// Scheme the ciphertext was produced under.
    #[inline]
    pub fn scheme(&self) -> SchemeType {
        self.scheme
    }

    /// Inherited from the plaintext; 1.0 for BFV/BGV.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Number of polynomials.
    #[inline]
    pub fn size(&self) -> usize {
        2
    }

    /// Number of primes at the ciphertext's level.
    #[inline]
    pub fn coeff_modulus_size(&self) -> usize {
        self.c0.moduli().len()
    }

    pub(crate) fn components(&self) -> (&RnsPoly, &RnsPoly) {
        (&self.c0, &self.c1)
    }

    /// Checks that both components live at the data level of `context`.
    pub fn validate(&self, context: &Context) -> Result<()> {
        if self.scheme != context.scheme() {
            return Err(Error::ContextMismatch(format!(
                "{} ciphertext used with a {} context",
                self.scheme,
                context.scheme()
            )));
        }
        check_poly(context, &self.c0, "ciphertext component c0")?;
        check_poly(context, &self.c1, "ciphertext component c1")
    }

    /// Writes the native format.
    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        save_object(ObjectKind::Ciphertext, self, writer)
    }

    /// `save` into a buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.save(&mut bytes)?;
        Ok(bytes)
    }

    /// Reads a saved ciphertext and checks it against `context`.
    pub fn load<R: Read>(context: &Context, reader: R) -> Result<Self> {
        let cipher: Self = load_object(ObjectKind::Ciphertext, reader)?;
        cipher.validate(context)?;
        Ok(cipher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulus::{CoeffModulus, Modulus};
    use crate::params::{EncryptionParameters, SecurityLevel};
    use rand::{SeedableRng, rngs::StdRng};

    fn toy_context(scheme: SchemeType) -> Context {
        let mut parms = EncryptionParameters::new(scheme);
        parms
            .set_poly_modulus_degree(16)
            .set_security_level(SecurityLevel::None)
            .set_coeff_modulus(CoeffModulus::create(16, &[30, 30]).unwrap());
        if scheme.is_exact() {
            parms.set_plain_modulus(257).unwrap();
        }
        Context::new(parms).unwrap()
    }

    #[test]
    fn test_plaintext_save_load() {
        let context = toy_context(SchemeType::Bfv);
        let t = Modulus::new(257).unwrap();
        let plain = Plaintext::new(
            SchemeType::Bfv,
            RnsPoly::from_unsigned(&[t], &(0..16).collect::<Vec<u64>>()),
            1.0,
        );
        let bytes = plain.to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"HEBN");
        let loaded = Plaintext::load(&context, bytes.as_slice()).unwrap();
        assert_eq!(loaded, plain);
        assert_eq!(loaded.coeff_count(), 16);
    }

    #[test]
    fn test_ciphertext_save_load() {
        let context = toy_context(SchemeType::Ckks);
        let mut rng = StdRng::seed_from_u64(5);
        let c0 = RnsPoly::sample_uniform(context.data_moduli(), 16, &mut rng);
        let c1 = RnsPoly::sample_uniform(context.data_moduli(), 16, &mut rng);
        let cipher = Ciphertext::new(SchemeType::Ckks, c0, c1, 1024.0);
        let bytes = cipher.to_bytes().unwrap();
        let loaded = Ciphertext::load(&context, bytes.as_slice()).unwrap();
        assert_eq!(loaded, cipher);
        assert_eq!(loaded.size(), 2);
        assert_eq!(loaded.coeff_modulus_size(), 1);
    }

    #[test]
    fn test_load_rejects_wrong_kind_and_context() {
        let context = toy_context(SchemeType::Ckks);
        let mut rng = StdRng::seed_from_u64(6);
        let c0 = RnsPoly::sample_uniform(context.data_moduli(), 16, &mut rng);
        let cipher = Ciphertext::new(SchemeType::Ckks, c0.clone(), c0, 1.0);
        let bytes = cipher.to_bytes().unwrap();

        assert!(matches!(
            Plaintext::load(&context, bytes.as_slice()),
            Err(Error::InvalidFormat(_))
        ));
        let bfv = toy_context(SchemeType::Bfv);
        assert!(matches!(
            Ciphertext::load(&bfv, bytes.as_slice()),
            Err(Error::ContextMismatch(_))
        ));

        let mut corrupted = bytes.clone();
        corrupted[0] = b'X';
        assert!(matches!(
            Ciphertext::load(&context, corrupted.as_slice()),
            Err(Error::InvalidFormat(_))
        ));
        assert!(Ciphertext::load(&context, &bytes[..bytes.len() / 2]).is_err());
    }
}
