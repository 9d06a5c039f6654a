//! The textual description of the pairing group.
//!
//! Every party must agree on the pairing domain byte for byte, otherwise
//! their commitments won't verify for each other. The block looks like:
//! ```text
//! type bls12
//! q <base field modulus>
//! h <G1 cofactor>
//! r <group order>
//! exp5 63
//! ...
//! exp0 16
//! sign -1
//! ```
//! The curve parameter `x` is `sign * sum(2^exp_i)`, and the moduli must be
//! exactly the ones that the BLS12 family derives from `x`.
use std::collections::HashMap;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

const KIND: &str = "bls12";
const EXPONENTS: usize = 6;

/// The set bit positions of `|x|` for BLS12-381, highest first.
const BLS12_381_EXPONENTS: [u32; EXPONENTS] = [63, 62, 60, 57, 48, 16];

/// Exponents must stay below the size of the base field.
const MAX_EXPONENT: u32 = 384;

const FIELDS: [&str; 11] = [
    "type", "q", "h", "r", "exp5", "exp4", "exp3", "exp2", "exp1", "exp0", "sign",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingDomain {
    /// Base field modulus.
    pub q: BigInt,
    /// Cofactor of the first source group.
    pub h: BigInt,
    /// Order of the pairing groups.
    pub r: BigInt,
    pub exponents: [u32; EXPONENTS],
    pub sign: i8,
}

impl PairingDomain {
    /// The parameters of BLS12-381, the only curve we support.
    pub fn bls12_381() -> Self {
        Self::derive(BLS12_381_EXPONENTS, -1)
    }

    fn x(exponents: &[u32; EXPONENTS], sign: i8) -> BigInt {
        let abs = exponents
            .iter()
            .fold(BigInt::zero(), |acc, &e| acc + (BigInt::one() << e));
        if sign < 0 {
            -abs
        } else {
            abs
        }
    }

    fn derive(exponents: [u32; EXPONENTS], sign: i8) -> Self {
        let x = Self::x(&exponents, sign);
        let x2 = &x * &x;
        let r = &x2 * &x2 - &x2 + BigInt::one();
        let x_minus_one_squared = (&x - BigInt::one()) * (&x - BigInt::one());
        let h = x_minus_one_squared.div_floor(&BigInt::from(3u8));
        let q = (&x_minus_one_squared * &r).div_floor(&BigInt::from(3u8)) + &x;
        Self {
            q,
            h,
            r,
            exponents,
            sign,
        }
    }

    /// Render the canonical text block.
    pub fn to_text(&self) -> String {
        let mut out = format!("type {KIND}\nq {}\nh {}\nr {}\n", self.q, self.h, self.r);
        for (i, e) in self.exponents.iter().enumerate() {
            out.push_str(&format!("exp{} {}\n", EXPONENTS - 1 - i, e));
        }
        out.push_str(&format!("sign {}\n", self.sign));
        out
    }

    /// Parse and validate a text block.
    ///
    /// This rejects unknown, missing, duplicated, or out of order fields, as well
    /// as moduli which don't match the curve parameter.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let bad = |msg: String| Error::Parameter(format!("pairing domain: {msg}"));

        let mut values: HashMap<&str, &str> = HashMap::new();
        let mut order = Vec::with_capacity(FIELDS.len());
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let (key, value) = line
                .trim()
                .split_once(' ')
                .ok_or_else(|| bad(format!("malformed line {line:?}")))?;
            if !FIELDS.contains(&key) {
                return Err(bad(format!("unknown field {key:?}")));
            }
            if values.insert(key, value.trim()).is_some() {
                return Err(bad(format!("duplicated field {key:?}")));
            }
            order.push(key);
        }
        for field in FIELDS {
            if !values.contains_key(field) {
                return Err(bad(format!("missing field {field:?}")));
            }
        }
        if order != FIELDS {
            return Err(bad("fields are out of order".to_string()));
        }

        if values["type"] != KIND {
            return Err(bad(format!("unsupported type {:?}", values["type"])));
        }
        let int = |key: &str| -> Result<BigInt, Error> {
            values[key]
                .parse::<BigInt>()
                .map_err(|_| bad(format!("field {key:?} is not an integer")))
        };
        let mut exponents = [0u32; EXPONENTS];
        for (i, e) in exponents.iter_mut().enumerate() {
            let key = FIELDS[4 + i];
            *e = values[key]
                .parse()
                .map_err(|_| bad(format!("field {key:?} is not an exponent")))?;
        }
        let sign: i8 = match values["sign"] {
            "1" => 1,
            "-1" => -1,
            other => return Err(bad(format!("sign must be 1 or -1, found {other:?}"))),
        };
        if let Some(e) = exponents.iter().find(|&&e| e >= MAX_EXPONENT) {
            return Err(bad(format!("exponent {e} must be below {MAX_EXPONENT}")));
        }
        if exponents.windows(2).any(|w| w[0] <= w[1]) {
            return Err(bad("exponents must be strictly decreasing".to_string()));
        }

        let derived = Self::derive(exponents, sign);
        for (key, value) in [("q", &derived.q), ("h", &derived.h), ("r", &derived.r)] {
            if &int(key)? != value {
                return Err(bad(format!("field {key:?} does not match the curve parameter")));
            }
        }
        Ok(derived)
    }

    /// Check that this is the domain our pairing implementation uses.
    pub fn ensure_supported(&self) -> Result<(), Error> {
        if *self == Self::bls12_381() {
            Ok(())
        } else {
            Err(Error::Parameter(
                "pairing domain is not BLS12-381".to_string(),
            ))
        }
    }
}

impl Serialize for PairingDomain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for PairingDomain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
