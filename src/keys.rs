//! Secret/public key generation.

use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Context;
use crate::error::Result;
use crate::params::SchemeType;
use crate::polynomial::{RnsPoly, NOISE_STANDARD_DEVIATION};

/// Ternary secret s at the key level. Deliberately not serializable.
#[derive(Clone)]
pub struct SecretKey {
    pub(crate) poly: RnsPoly,
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// (p0, p1) = (-(a·s + e), a), with e scaled by t under BGV.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub(crate) p0: RnsPoly,
    pub(crate) p1: RnsPoly,
}

/// Holds the secret key and derives public keys from it.
pub struct KeyGenerator<'a> {
    context: &'a Context,
    secret_key: SecretKey,
}

impl<'a> KeyGenerator<'a> {
    /// Samples a fresh secret key.
    pub fn new<R: Rng + CryptoRng>(context: &'a Context, rng: &mut R) -> Self {
        let poly = RnsPoly::sample_ternary(
            context.key_moduli(),
            context.poly_modulus_degree(),
            rng,
        );
        debug!(scheme = %context.scheme(), "sampled secret key");
        Self {
            context,
            secret_key: SecretKey { poly },
        }
    }

    /// The sampled secret key.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Samples a fresh `a` and `e` for each call.
    pub fn create_public_key<R: Rng + CryptoRng>(&self, rng: &mut R) -> Result<PublicKey> {
        let context = self.context;
        let moduli = context.key_moduli();
        let degree = context.poly_modulus_degree();

        let a = RnsPoly::sample_uniform(moduli, degree, rng);
        let mut e = RnsPoly::sample_gaussian(moduli, degree, NOISE_STANDARD_DEVIATION, rng)?;
        if context.scheme() == SchemeType::Bgv {
            e = e.mul_scalar(context.plain_modulus()?.value());
        }

        let a_s = a.multiply(&self.secret_key.poly, context.ntt_tables());
        let p0 = -(a_s + e);
        debug!(scheme = %context.scheme(), "created public key");
        Ok(PublicKey { p0, p1: a })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulus::CoeffModulus;
    use crate::params::{EncryptionParameters, SecurityLevel};
    use rand::{SeedableRng, rngs::StdRng};

    fn toy_context(scheme: SchemeType) -> Context {
        let mut parms = EncryptionParameters::new(scheme);
        parms
            .set_poly_modulus_degree(64)
            .set_security_level(SecurityLevel::None)
            .set_coeff_modulus(CoeffModulus::create(64, &[40, 40]).unwrap());
        if scheme.is_exact() {
            parms.set_plain_modulus(257).unwrap();
        }
        Context::new(parms).unwrap()
    }

    /// p0 + p1·s should be the (small) key noise.
    fn key_noise(context: &Context, keygen: &KeyGenerator<'_>, pk: &PublicKey) -> Vec<f64> {
        let s = &keygen.secret_key().poly;
        let v = &pk.p0 + &pk.p1.multiply(s, context.ntt_tables());
        context.key_base().compose_centered(&v)
    }

    #[test]
    fn test_public_key_is_rlwe_sample() {
        let context = toy_context(SchemeType::Bfv);
        let mut rng = StdRng::seed_from_u64(1);
        let keygen = KeyGenerator::new(&context, &mut rng);
        let pk = keygen.create_public_key(&mut rng).unwrap();
        let bound = 6.0 * NOISE_STANDARD_DEVIATION;
        assert!(key_noise(&context, &keygen, &pk)
            .iter()
            .all(|e| e.abs() <= bound));
        assert_eq!(pk.p0.moduli(), context.key_moduli());
    }

    #[test]
    fn test_bgv_key_noise_is_multiple_of_t() {
        let context = toy_context(SchemeType::Bgv);
        let mut rng = StdRng::seed_from_u64(2);
        let keygen = KeyGenerator::new(&context, &mut rng);
        let pk = keygen.create_public_key(&mut rng).unwrap();
        assert!(key_noise(&context, &keygen, &pk)
            .iter()
            .all(|e| e.rem_euclid(257.0) == 0.0));
    }

    #[test]
    fn test_secret_key_is_redacted() {
        let context = toy_context(SchemeType::Ckks);
        let mut rng = StdRng::seed_from_u64(3);
        let keygen = KeyGenerator::new(&context, &mut rng);
        assert_eq!(format!("{:?}", keygen.secret_key()), "SecretKey(<redacted>)");
    }
}
