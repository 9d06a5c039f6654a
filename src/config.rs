use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The smallest Paillier modulus which leaves enough headroom.
///
/// During signing, plaintexts grow to roughly `n * q^3` before being reduced
/// mod `q`, with `q` the 256 bit curve order. They must never wrap around the
/// Paillier modulus, which needs a bit over 780 bits.
pub const MIN_MODULUS_BITS: u64 = 1024;

const DEFAULT_MODULUS_BITS: u64 = 2048;

/// How to generate fresh protocol parameters.
///
/// Anything using this struct after [ParameterConfig::validate] can trust the sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterConfig {
    /// Size of the Paillier modulus `N`.
    pub paillier_bits: u64,
    /// Size of the auxiliary modulus `Ñ` used by the range proofs.
    pub aux_modulus_bits: u64,
    /// Whether `Ñ` is a product of safe primes.
    ///
    /// This is much slower, but makes `h1` and `h2` generate a large subgroup.
    pub safe_aux_primes: bool,
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self {
            paillier_bits: DEFAULT_MODULUS_BITS,
            aux_modulus_bits: DEFAULT_MODULUS_BITS,
            safe_aux_primes: true,
        }
    }
}

impl ParameterConfig {
    pub fn validate(&self) -> Result<(), Error> {
        for (name, bits) in [
            ("paillier_bits", self.paillier_bits),
            ("aux_modulus_bits", self.aux_modulus_bits),
        ] {
            if bits < MIN_MODULUS_BITS {
                return Err(Error::Parameter(format!(
                    "{name} must be at least {MIN_MODULUS_BITS}, found {bits}"
                )));
            }
            if bits % 2 != 0 {
                return Err(Error::Parameter(format!(
                    "{name} must be even, found {bits}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ParameterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_missing_fields_take_defaults() -> Result<(), serde_json::Error> {
        let config: ParameterConfig = serde_json::from_str(r#"{"safe_aux_primes": false}"#)?;
        assert!(!config.safe_aux_primes);
        assert_eq!(config.paillier_bits, 2048);
        assert_eq!(config.aux_modulus_bits, 2048);
        Ok(())
    }

    #[test]
    fn test_small_moduli_are_rejected() {
        let config = ParameterConfig {
            paillier_bits: 512,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Parameter(_))));

        let config = ParameterConfig {
            aux_modulus_bits: 2049,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
