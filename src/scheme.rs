//! Public-key encryption and secret-key decryption for BFV, CKKS and BGV.

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use rand::{CryptoRng, Rng};

use crate::cipher::{Ciphertext, Plaintext};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::keys::{PublicKey, SecretKey};
use crate::params::SchemeType;
use crate::polynomial::{RnsPoly, NOISE_STANDARD_DEVIATION};

fn check_key_poly(context: &Context, poly: &RnsPoly, what: &str) -> Result<()> {
    if poly.moduli() != context.key_moduli() || poly.degree() != context.poly_modulus_degree() {
        return Err(Error::ContextMismatch(format!(
            "{what} was not generated for this context"
        )));
    }
    Ok(())
}

/// Encrypts plaintexts under a public key.
pub struct Encryptor<'a> {
    context: &'a Context,
    public_key: &'a PublicKey,
}

impl<'a> Encryptor<'a> {
    /// Fails if the key was generated for a different context.
    pub fn new(context: &'a Context, public_key: &'a PublicKey) -> Result<Self> {
        check_key_poly(context, &public_key.p0, "public key")?;
        check_key_poly(context, &public_key.p1, "public key")?;
        Ok(Self {
            context,
            public_key,
        })
    }

    /// Produces a fresh ciphertext at the data level.
    pub fn encrypt<R: Rng + CryptoRng>(&self, plain: &Plaintext, rng: &mut R) -> Result<Ciphertext> {
        let context = self.context;
        plain.validate(context)?;

        match context.scheme() {
            SchemeType::Bfv => {
                let (c0, c1) = self.encrypt_zero(rng)?;
                let m = RnsPoly::from_unsigned(context.data_moduli(), plain.poly().residues(0));
                let scaled = m.mul_scalars(context.delta());
                Ok(Ciphertext::new(SchemeType::Bfv, c0 + scaled, c1, 1.0))
            }
            SchemeType::Ckks => {
                let (c0, c1) = self.encrypt_zero(rng)?;
                Ok(Ciphertext::new(
                    SchemeType::Ckks,
                    c0 + plain.poly(),
                    c1,
                    plain.scale(),
                ))
            }
            SchemeType::Bgv => self.encrypt_bgv(plain, rng),
        }
    }

    /// (p0·u + e1, p1·u + e2) at the key level, brought down to the data level.
    fn encrypt_zero<R: Rng + CryptoRng>(&self, rng: &mut R) -> Result<(RnsPoly, RnsPoly)> {
        let context = self.context;
        let moduli = context.key_moduli();
        let degree = context.poly_modulus_degree();
        let tables = context.ntt_tables();

        let u = RnsPoly::sample_ternary(moduli, degree, rng);
        let e1 = RnsPoly::sample_gaussian(moduli, degree, NOISE_STANDARD_DEVIATION, rng)?;
        let e2 = RnsPoly::sample_gaussian(moduli, degree, NOISE_STANDARD_DEVIATION, rng)?;
        let c0 = self.public_key.p0.multiply(&u, tables) + e1;
        let c1 = self.public_key.p1.multiply(&u, tables) + e2;

        if context.has_special_prime() {
            Ok((c0.divide_and_round_last()?, c1.divide_and_round_last()?))
        } else {
            Ok((c0, c1))
        }
    }

    /// Encrypts directly at the data level so that every noise term stays a multiple of t.
    fn encrypt_bgv<R: Rng + CryptoRng>(&self, plain: &Plaintext, rng: &mut R) -> Result<Ciphertext> {
        let context = self.context;
        let moduli = context.data_moduli();
        let degree = context.poly_modulus_degree();
        let tables = context.ntt_tables();
        let t = context.plain_modulus()?.value();

        let (p0, p1) = if context.has_special_prime() {
            (self.public_key.p0.drop_last(), self.public_key.p1.drop_last())
        } else {
            (self.public_key.p0.clone(), self.public_key.p1.clone())
        };

        let u = RnsPoly::sample_ternary(moduli, degree, rng);
        let e1 = RnsPoly::sample_gaussian(moduli, degree, NOISE_STANDARD_DEVIATION, rng)?;
        let e2 = RnsPoly::sample_gaussian(moduli, degree, NOISE_STANDARD_DEVIATION, rng)?;
        let m = RnsPoly::from_unsigned(moduli, plain.poly().residues(0));

        let c0 = p0.multiply(&u, tables) + e1.mul_scalar(t) + m;
        let c1 = p1.multiply(&u, tables) + e2.mul_scalar(t);
        Ok(Ciphertext::new(SchemeType::Bgv, c0, c1, 1.0))
    }
}

/// Decrypts ciphertexts with the secret key.
pub struct Decryptor<'a> {
    context: &'a Context,
    /// The secret key restricted to the data level.
    secret: RnsPoly,
}

impl<'a> Decryptor<'a> {
    /// Fails if the key was generated for a different context.
    pub fn new(context: &'a Context, secret_key: &SecretKey) -> Result<Self> {
        check_key_poly(context, &secret_key.poly, "secret key")?;
        let secret = if context.has_special_prime() {
            secret_key.poly.drop_last()
        } else {
            secret_key.poly.clone()
        };
        Ok(Self { context, secret })
    }

    /// Computes `v = c0 + c1·s` and maps it back to a plaintext.
    ///
    /// - BFV: `round(t·v / Q) mod t`
    /// - BGV: centered `v` mod t
    /// - CKKS: `v` itself, at the ciphertext's scale
    pub fn decrypt(&self, cipher: &Ciphertext) -> Result<Plaintext> {
        let context = self.context;
        cipher.validate(context)?;

        let (c0, c1) = cipher.components();
        let v = c0 + &c1.multiply(&self.secret, context.ntt_tables());

        match context.scheme() {
            SchemeType::Ckks => Ok(Plaintext::new(SchemeType::Ckks, v, cipher.scale())),
            scheme => {
                let t = context.plain_modulus()?;
                let q = context.data_base().product();
                let half = q >> 1u32;
                let coeffs = context
                    .data_base()
                    .compose(&v)
                    .into_iter()
                    .map(|x| {
                        let m = if scheme == SchemeType::Bfv {
                            // round(t·x / Q) mod t
                            (x * t.value() + &half) / q % t.value()
                        } else if x > half {
                            // [x]_Q is negative
                            BigUint::from(t.value()) - (q - x) % t.value()
                        } else {
                            x % t.value()
                        };
                        t.reduce(m.to_u64().unwrap_or(0))
                    })
                    .collect::<Vec<u64>>();
                Ok(Plaintext::new(
                    scheme,
                    RnsPoly::from_unsigned(&[t], &coeffs),
                    1.0,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{BatchEncoder, CkksEncoder};
    use crate::keys::KeyGenerator;
    use crate::modulus::CoeffModulus;
    use crate::params::EncryptionParameters;
    use rand::{SeedableRng, rngs::StdRng};

    const PLAIN_MODULUS: u64 = 786_433;

    fn context(scheme: SchemeType) -> Context {
        let mut parms = EncryptionParameters::new(scheme);
        parms
            .set_poly_modulus_degree(4096)
            .set_coeff_modulus(CoeffModulus::bfv_default(4096).unwrap());
        if scheme.is_exact() {
            parms.set_plain_modulus(PLAIN_MODULUS).unwrap();
        }
        Context::new(parms).unwrap()
    }

    fn exact_roundtrip(scheme: SchemeType) {
        let context = context(scheme);
        let mut rng = StdRng::seed_from_u64(11);
        let keygen = KeyGenerator::new(&context, &mut rng);
        let pk = keygen.create_public_key(&mut rng).unwrap();
        let encryptor = Encryptor::new(&context, &pk).unwrap();
        let decryptor = Decryptor::new(&context, keygen.secret_key()).unwrap();
        let encoder = BatchEncoder::new(&context).unwrap();

        let values: Vec<u64> = (0..4096).map(|_| rng.gen_range(0..PLAIN_MODULUS)).collect();
        let plain = encoder.encode(&values).unwrap();
        let cipher = encryptor.encrypt(&plain, &mut rng).unwrap();
        assert_eq!(cipher.coeff_modulus_size(), 2);

        let decrypted = decryptor.decrypt(&cipher).unwrap();
        assert_eq!(decrypted, plain);
        assert_eq!(encoder.decode(&decrypted).unwrap(), values);
    }

    #[test]
    fn test_bfv_roundtrip() {
        exact_roundtrip(SchemeType::Bfv);
    }

    #[test]
    fn test_bgv_roundtrip() {
        exact_roundtrip(SchemeType::Bgv);
    }

    /// Absolute slot errors of one CKKS round trip at scale sqrt(q_last).
    fn ckks_slot_errors(context: &Context, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let keygen = KeyGenerator::new(context, &mut rng);
        let pk = keygen.create_public_key(&mut rng).unwrap();
        let encryptor = Encryptor::new(context, &pk).unwrap();
        let decryptor = Decryptor::new(context, keygen.secret_key()).unwrap();
        let encoder = CkksEncoder::new(context).unwrap();

        let scale = (context.key_moduli()[2].value() as f64).sqrt();
        let values: Vec<f64> = (0..encoder.slot_count()).map(|i| 1.001 * i as f64).collect();
        let plain = encoder.encode(&values, scale).unwrap();
        let cipher = encryptor.encrypt(&plain, &mut rng).unwrap();
        assert_eq!(cipher.scale(), scale);

        let decoded = encoder.decode(&decryptor.decrypt(&cipher).unwrap()).unwrap();
        values.iter().zip(&decoded).map(|(a, b)| (a - b).abs()).collect()
    }

    #[test]
    fn test_ckks_roundtrip_error_over_many_keys() {
        let context = context(SchemeType::Ckks);
        for seed in 200..208 {
            let errors = ckks_slot_errors(&context, seed);
            let n = errors.len() as f64;
            let rms = (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt();
            let max = errors.iter().cloned().fold(0.0, f64::max);
            let within = errors.iter().filter(|&&e| e < 1e-2).count();

            // typical error is ~2e-3; a handful of slots can pass 1e-2
            assert!(rms < 5e-3, "seed {seed}: rms {rms}");
            assert!(within * 100 >= errors.len() * 99, "seed {seed}: {within} slots within 1e-2");
            assert!(max < 5e-2, "seed {seed}: max {max}");
        }
    }

    #[test]
    fn test_ciphertexts_are_randomized() {
        let context = context(SchemeType::Bfv);
        let mut rng = StdRng::seed_from_u64(13);
        let keygen = KeyGenerator::new(&context, &mut rng);
        let pk = keygen.create_public_key(&mut rng).unwrap();
        let encryptor = Encryptor::new(&context, &pk).unwrap();
        let plain = BatchEncoder::new(&context).unwrap().encode(&[5; 16]).unwrap();

        let first = encryptor.encrypt(&plain, &mut rng).unwrap();
        let second = encryptor.encrypt(&plain, &mut rng).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_rejects_foreign_objects() {
        let bfv = context(SchemeType::Bfv);
        let bgv = context(SchemeType::Bgv);
        let mut rng = StdRng::seed_from_u64(14);
        let keygen = KeyGenerator::new(&bfv, &mut rng);
        let pk = keygen.create_public_key(&mut rng).unwrap();

        let encryptor = Encryptor::new(&bfv, &pk).unwrap();
        let bgv_plain = BatchEncoder::new(&bgv).unwrap().encode(&[1, 2]).unwrap();
        assert!(matches!(
            encryptor.encrypt(&bgv_plain, &mut rng),
            Err(Error::ContextMismatch(_))
        ));

        let mut toy = EncryptionParameters::new(SchemeType::Bfv);
        toy.set_poly_modulus_degree(4096)
            .set_coeff_modulus(CoeffModulus::create(4096, &[36, 36]).unwrap());
        toy.set_plain_modulus(PLAIN_MODULUS).unwrap();
        let other = Context::new(toy).unwrap();
        assert!(Encryptor::new(&other, &pk).is_err());
        assert!(Decryptor::new(&other, keygen.secret_key()).is_err());
    }
}
