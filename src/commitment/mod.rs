//! A trapdoor commitment over the BLS12-381 pairing.
//!
//! The master public key holds a point `h` in G2 whose discrete logarithm
//! nobody knows. To commit to a list of secrets, we hash them into a scalar
//! `d`, sample fresh `e, r`, and publish:
//! ```text
//! a = d * g2 + r * (h + e * g2)
//! ```
//! Opening reveals `r` and the secrets, and the verifier checks
//! ```text
//! e(r * g1, h + e * g2) = e(g1, a - d * g2)
//! ```
//! Binding reduces to the discrete logarithm of `h`, and hiding comes
//! from `e` and `r` being fresh for every commitment.
pub mod domain;

use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use ff::Field;
use rand_core::CryptoRngCore;

use crate::crypto::hash_wide;
use crate::wire::{impl_wire_serde, FieldTag, Reader, WireError, WireFormat, Writer};

/// The domain separator for hashing secrets.
const DIGEST_DOMAIN: &[u8] = b"notary-mpc commitment digest";

/// The public parameters of the commitment scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterPublicKey {
    pub g1: G1Affine,
    pub g2: G2Affine,
    pub h: G2Affine,
}

impl MasterPublicKey {
    /// Run the one time setup.
    ///
    /// The point `h` is found by decoding random bytes as a point on the curve,
    /// and clearing the cofactor. This never involves a known scalar.
    pub fn setup(rng: &mut impl CryptoRngCore) -> Self {
        let h = loop {
            let mut bytes = [0u8; 96];
            rng.fill_bytes(&mut bytes);
            // Set the compression flag, and clear the infinity flag.
            bytes[0] = (bytes[0] | 0x80) & !0x40;
            let candidate: Option<G2Affine> = G2Affine::from_compressed_unchecked(&bytes).into();
            if let Some(candidate) = candidate {
                let cleared = G2Projective::from(candidate).clear_cofactor();
                if !bool::from(cleared.is_identity()) {
                    break G2Affine::from(cleared);
                }
            }
        };
        Self {
            g1: G1Affine::generator(),
            g2: G2Affine::generator(),
            h,
        }
    }
}

impl WireFormat for MasterPublicKey {
    fn write_to(&self, w: &mut Writer) {
        w.g1(&self.g1);
        w.g2(&self.g2);
        w.g2(&self.h);
    }

    fn read_from(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            g1: r.g1()?,
            g2: r.g2()?,
            h: r.g2()?,
        })
    }
}

impl_wire_serde!(MasterPublicKey);

/// A commitment to a list of secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commitment {
    pub e: Scalar,
    pub a: G2Affine,
}

impl WireFormat for Commitment {
    fn write_to(&self, w: &mut Writer) {
        w.zr(&self.e);
        w.g2(&self.a);
    }

    fn read_from(r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            e: r.zr()?,
            a: r.g2()?,
        })
    }
}

impl_wire_serde!(Commitment);

/// The information needed to open a commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Open {
    pub r: Scalar,
    pub secrets: Vec<Vec<u8>>,
}

impl WireFormat for Open {
    fn write_to(&self, w: &mut Writer) {
        w.zr(&self.r);
        w.int(&self.secrets.len().into());
        for secret in &self.secrets {
            w.bytes(secret);
        }
    }

    fn read_from(r: &mut Reader<'_>) -> Result<Self, WireError> {
        let rand = r.zr()?;
        let count: usize = r
            .int()?
            .try_into()
            .map_err(|_| WireError::InvalidElement(FieldTag::Int))?;
        // Each secret needs at least a record header, so this bounds allocation.
        let mut secrets = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            secrets.push(r.bytes()?);
        }
        Ok(Self { r: rand, secrets })
    }
}

impl_wire_serde!(Open);

fn digest(secrets: &[Vec<u8>]) -> Scalar {
    let parts: Vec<&[u8]> = secrets.iter().map(|s| s.as_slice()).collect();
    Scalar::from_bytes_wide(&hash_wide(DIGEST_DOMAIN, &parts))
}

/// Commit to a list of secrets.
pub fn commit(
    rng: &mut impl CryptoRngCore,
    mpk: &MasterPublicKey,
    secrets: Vec<Vec<u8>>,
) -> (Commitment, Open) {
    let e = Scalar::random(&mut *rng);
    let r = Scalar::random(&mut *rng);
    let d = digest(&secrets);

    let g2 = G2Projective::from(mpk.g2);
    let he = G2Projective::from(mpk.h) + g2 * e;
    let a = g2 * d + he * r;

    (
        Commitment {
            e,
            a: G2Affine::from(a),
        },
        Open { r, secrets },
    )
}

/// Check that an opening matches a commitment.
#[must_use]
pub fn verify(commitment: &Commitment, open: &Open, mpk: &MasterPublicKey) -> bool {
    let d = digest(&open.secrets);
    let g2 = G2Projective::from(mpk.g2);

    let big_a = G1Affine::from(G1Projective::from(mpk.g1) * open.r);
    let big_b = G2Affine::from(G2Projective::from(mpk.h) + g2 * commitment.e);
    let big_c = G2Affine::from(G2Projective::from(commitment.a) - g2 * d);

    pairing(&big_a, &big_b) == pairing(&mpk.g1, &big_c)
}
