//! The Paillier cryptosystem, with generator `g = N + 1`.
//!
//! Ciphertexts are additively homomorphic:
//! ```text
//! Dec(add(Enc(a), Enc(b))) = a + b mod N
//! Dec(mul(Enc(a), k)) = k * a mod N
//! ```
//! This is what lets the parties compute on the encrypted private key without
//! anybody ever decrypting it.
//!
//! # Shortcomings
//!
//! None of the arithmetic here is constant time.
pub mod primes;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::math;

/// A Paillier ciphertext, an element of `Z_{N^2}^*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ciphertext(BigInt);

impl Ciphertext {
    pub fn as_int(&self) -> &BigInt {
        &self.0
    }

    /// Wrap an integer without checking it, use [EncryptionKey::validate] before trusting it.
    pub fn from_int(x: BigInt) -> Self {
        Self(x)
    }
}

/// The public half of a Paillier key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BigInt", into = "BigInt")]
pub struct EncryptionKey {
    n: BigInt,
    n_squared: BigInt,
}

impl From<BigInt> for EncryptionKey {
    fn from(n: BigInt) -> Self {
        Self::new(n)
    }
}

impl From<EncryptionKey> for BigInt {
    fn from(key: EncryptionKey) -> Self {
        key.n
    }
}

impl EncryptionKey {
    pub fn new(n: BigInt) -> Self {
        let n_squared = &n * &n;
        Self { n, n_squared }
    }

    /// The modulus `N`.
    pub fn n(&self) -> &BigInt {
        &self.n
    }

    /// The ciphertext modulus `N^2`.
    pub fn n_squared(&self) -> &BigInt {
        &self.n_squared
    }

    /// Check that a ciphertext lies in `(0, N^2)`, and is invertible.
    pub fn validate(&self, c: &Ciphertext) -> Result<(), Error> {
        if math::is_unit(&c.0, &self.n_squared) {
            Ok(())
        } else {
            Err(Error::InvalidCiphertext)
        }
    }

    /// Marshal a ciphertext as fixed width big endian bytes, one width per key.
    ///
    /// This is the form in which ciphertexts get committed to.
    pub fn ciphertext_bytes(&self, c: &Ciphertext) -> Result<Vec<u8>, Error> {
        self.validate(c)?;
        math::to_fixed_bytes(&c.0, math::byte_width(&self.n_squared))
    }

    /// Encrypt `m` using explicit randomness `r`, which must be a unit mod `N`.
    pub fn encrypt_with_randomness(&self, m: &BigInt, r: &BigInt) -> Result<Ciphertext, Error> {
        if m.is_negative() || m >= &self.n {
            return Err(Error::MessageTooLarge);
        }
        if !math::is_unit(r, &self.n) {
            return Err(Error::Parameter(
                "paillier randomness is not a unit".to_string(),
            ));
        }
        // g^m = (1 + N)^m = 1 + mN mod N^2
        let gm = (BigInt::one() + m * &self.n) % &self.n_squared;
        let rn = r.modpow(&self.n, &self.n_squared);
        Ok(Ciphertext((gm * rn) % &self.n_squared))
    }

    /// Encrypt `m` with fresh randomness, which is returned alongside the ciphertext.
    ///
    /// The randomness is needed as a witness by the proofs.
    pub fn encrypt(
        &self,
        rng: &mut impl CryptoRngCore,
        m: &BigInt,
    ) -> Result<(Ciphertext, BigInt), Error> {
        let r = math::sample_unit(rng, &self.n);
        let c = self.encrypt_with_randomness(m, &r)?;
        Ok((c, r))
    }

    /// Homomorphic addition of plaintexts.
    pub fn add(&self, c1: &Ciphertext, c2: &Ciphertext) -> Result<Ciphertext, Error> {
        self.validate(c1)?;
        self.validate(c2)?;
        Ok(Ciphertext((&c1.0 * &c2.0) % &self.n_squared))
    }

    /// Homomorphic multiplication of the plaintext by a known integer.
    ///
    /// Negative factors are allowed, and go through the inverse of `c`.
    pub fn mul(&self, c: &Ciphertext, k: &BigInt) -> Result<Ciphertext, Error> {
        self.validate(c)?;
        math::pow_mod(&c.0, k, &self.n_squared)
            .map(Ciphertext)
            .ok_or(Error::InvalidCiphertext)
    }

    /// Sum a list of ciphertexts, returning `None` for an empty list.
    pub fn sum<'c>(
        &self,
        cs: impl IntoIterator<Item = &'c Ciphertext>,
    ) -> Result<Option<Ciphertext>, Error> {
        let mut acc: Option<Ciphertext> = None;
        for c in cs {
            acc = Some(match acc {
                None => {
                    self.validate(c)?;
                    c.clone()
                }
                Some(acc) => self.add(&acc, c)?,
            });
        }
        Ok(acc)
    }
}

/// The private half of a Paillier key.
///
/// This is only held by the parties allowed to finalize signatures.
#[derive(Clone, Serialize, Deserialize)]
pub struct DecryptionKey {
    encryption_key: EncryptionKey,
    lambda: BigInt,
    mu: BigInt,
}

impl std::fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionKey")
            .field("n", self.encryption_key.n())
            .finish_non_exhaustive()
    }
}

impl DecryptionKey {
    /// Generate a fresh key whose modulus has exactly `bits` bits.
    pub fn generate(rng: &mut impl CryptoRngCore, bits: u64) -> Result<Self, Error> {
        let (p, q) = primes::prime_pair(rng, bits, false)?;
        Self::from_primes(&p, &q)
    }

    /// Build a key from two distinct primes.
    pub fn from_primes(p: &BigInt, q: &BigInt) -> Result<Self, Error> {
        let n = p * q;
        let lambda = (p - BigInt::one()) * (q - BigInt::one());
        let mu = lambda
            .modinv(&n)
            .ok_or_else(|| Error::Parameter("lambda is not invertible mod N".to_string()))?;
        Ok(Self {
            encryption_key: EncryptionKey::new(n),
            lambda,
            mu,
        })
    }

    pub fn encryption_key(&self) -> &EncryptionKey {
        &self.encryption_key
    }

    /// Decrypt a ciphertext, producing a plaintext in `[0, N)`.
    pub fn decrypt(&self, c: &Ciphertext) -> Result<BigInt, Error> {
        let ek = &self.encryption_key;
        ek.validate(c)?;
        let x = c.0.modpow(&self.lambda, ek.n_squared());
        // L(x) = (x - 1) / N, which is exact here
        let l = (x - BigInt::one()).div_floor(ek.n());
        Ok((l * &self.mu).mod_floor(ek.n()))
    }
}
