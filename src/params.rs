//! The parameters shared by every party.
//!
//! These are generated once, by a trusted dealer, and then handed to every
//! party by reference. Nothing in the protocols holds global state.
use num_bigint::BigInt;
use num_traits::One;
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::commitment::{domain::PairingDomain, MasterPublicKey};
use crate::config::{ParameterConfig, MIN_MODULUS_BITS};
use crate::error::Error;
use crate::math;
use crate::paillier::{primes, DecryptionKey, EncryptionKey};

/// The auxiliary RSA modulus the range proofs commit with.
///
/// `h2` is a power of `h1`, and nobody should know the factorization of `Ñ`,
/// nor the logarithm relating the two generators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkSetup {
    pub n_tilde: BigInt,
    pub h1: BigInt,
    pub h2: BigInt,
}

impl ZkSetup {
    pub fn generate(rng: &mut impl CryptoRngCore, config: &ParameterConfig) -> Result<Self, Error> {
        let (p, q) = primes::prime_pair(rng, config.aux_modulus_bits, config.safe_aux_primes)?;
        let n_tilde = p * q;

        // Squaring lands us in the quadratic residues, which is the large subgroup.
        let f = math::sample_unit(rng, &n_tilde);
        let h1 = (&f * &f) % &n_tilde;
        let alpha = math::sample_below(rng, &n_tilde);
        let h2 = h1.modpow(&alpha, &n_tilde);

        Ok(Self { n_tilde, h1, h2 })
    }

    /// Compute `h1^a h2^b mod Ñ`, for non-negative exponents.
    pub fn commit(&self, a: &BigInt, b: &BigInt) -> BigInt {
        (self.h1.modpow(a, &self.n_tilde) * self.h2.modpow(b, &self.n_tilde)) % &self.n_tilde
    }

    /// Compute `h1^a h2^b mod Ñ`, for exponents of any sign.
    ///
    /// This fails if a negative power of a non invertible generator is needed.
    pub fn commit_signed(&self, a: &BigInt, b: &BigInt) -> Option<BigInt> {
        let x = math::pow_mod(&self.h1, a, &self.n_tilde)?;
        let y = math::pow_mod(&self.h2, b, &self.n_tilde)?;
        Some((x * y) % &self.n_tilde)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.n_tilde.bits() < MIN_MODULUS_BITS {
            return Err(Error::Parameter(format!(
                "auxiliary modulus has {} bits, need {MIN_MODULUS_BITS}",
                self.n_tilde.bits()
            )));
        }
        for (name, h) in [("h1", &self.h1), ("h2", &self.h2)] {
            if !math::is_unit(h, &self.n_tilde) || h.is_one() {
                return Err(Error::Parameter(format!(
                    "{name} is not a generator mod the auxiliary modulus"
                )));
            }
        }
        if self.h1 == self.h2 {
            return Err(Error::Parameter("h1 and h2 must differ".to_string()));
        }
        Ok(())
    }
}

/// Everything the parties need to agree on before running any protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolParameters {
    pub encryption_key: EncryptionKey,
    pub zk: ZkSetup,
    pub mpk: MasterPublicKey,
    pub domain: PairingDomain,
}

impl ProtocolParameters {
    /// Generate fresh parameters, returning the Paillier decryption key separately.
    ///
    /// The decryption key should only be handed to the parties allowed to finalize.
    pub fn generate(
        rng: &mut impl CryptoRngCore,
        config: &ParameterConfig,
    ) -> Result<(Self, DecryptionKey), Error> {
        config.validate()?;
        info!(
            paillier_bits = config.paillier_bits,
            aux_modulus_bits = config.aux_modulus_bits,
            safe_aux_primes = config.safe_aux_primes,
            "generating protocol parameters"
        );

        let decryption_key = DecryptionKey::generate(rng, config.paillier_bits)?;
        let zk = ZkSetup::generate(rng, config)?;
        let mpk = MasterPublicKey::setup(rng);

        let params = Self {
            encryption_key: decryption_key.encryption_key().clone(),
            zk,
            mpk,
            domain: PairingDomain::bls12_381(),
        };
        params.validate()?;
        Ok((params, decryption_key))
    }

    /// Check parameters received from elsewhere before using them.
    pub fn validate(&self) -> Result<(), Error> {
        self.domain.ensure_supported()?;
        let n = self.encryption_key.n();
        if n.bits() < MIN_MODULUS_BITS {
            return Err(Error::Parameter(format!(
                "paillier modulus has {} bits, need {MIN_MODULUS_BITS}",
                n.bits()
            )));
        }
        if n == &self.zk.n_tilde {
            return Err(Error::Parameter(
                "paillier and auxiliary moduli must differ".to_string(),
            ));
        }
        self.zk.validate()?;
        if !bool::from(self.mpk.h.is_torsion_free()) || bool::from(self.mpk.h.is_identity()) {
            return Err(Error::Parameter(
                "commitment key h is not in the prime order subgroup".to_string(),
            ));
        }
        if self.mpk.g1 != bls12_381::G1Affine::generator()
            || self.mpk.g2 != bls12_381::G2Affine::generator()
        {
            return Err(Error::Parameter(
                "commitment key uses non standard generators".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::fixture;

    #[test]
    fn test_fixture_is_valid() -> Result<(), Error> {
        fixture().params.validate()
    }

    #[test]
    fn test_generate_rejects_small_config() {
        let config = ParameterConfig {
            paillier_bits: 256,
            ..Default::default()
        };
        assert!(matches!(
            ProtocolParameters::generate(&mut rand_core::OsRng, &config),
            Err(Error::Parameter(_))
        ));
    }

    #[test]
    fn test_validate_catches_tampering() {
        let mut params = fixture().params.clone();
        params.zk.h2 = params.zk.h1.clone();
        assert!(params.validate().is_err());

        let mut params = fixture().params.clone();
        params.encryption_key = EncryptionKey::new(BigInt::from(3233u32));
        assert!(params.validate().is_err());

        let mut params = fixture().params.clone();
        params.zk.h1 = BigInt::one();
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_parameters_travel_as_json() -> Result<(), Box<dyn std::error::Error>> {
        let params = &fixture().params;
        let json = serde_json::to_string(params)?;
        let back: ProtocolParameters = serde_json::from_str(&json)?;
        back.validate()?;
        assert_eq!(back.encryption_key, params.encryption_key);
        assert_eq!(back.zk, params.zk);
        assert_eq!(back.mpk, params.mpk);
        assert_eq!(back.domain, params.domain);
        Ok(())
    }
}
