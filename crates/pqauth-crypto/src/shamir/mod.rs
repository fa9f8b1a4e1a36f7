//! Threshold secret sharing over GF(2^521 - 1).
//!
//! A secret of up to 64 bytes is embedded as the big-endian integer `0x01 || secret`, which
//! keeps leading zero bytes intact and stays below the field modulus. [`split`] hides it as the
//! constant term of a random polynomial of degree `k - 1` and hands out its values at
//! `x = 1..=n`. Any `k` shares recover it through Lagrange interpolation at zero; fewer carry no
//! information about it.
//!
//! # Example
//!
//! ```
//! use pqauth_crypto::shamir::{reconstruct, split};
//!
//! let shares = split(b"wrapping key material", 3, 5).unwrap();
//! let recovered = reconstruct(&[shares[0].clone(), shares[1].clone(), shares[3].clone()]).unwrap();
//! assert_eq!(&recovered[..], b"wrapping key material");
//! ```

mod field;

pub use field::FieldElement;

use crate::{constants::*, errors::*};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use std::collections::HashSet;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Marker byte prepended to the secret before it is mapped into the field.
const LENGTH_MARKER: u8 = 0x01;

/// Encoded share: `x || threshold || y`
const SHARE_ENCODED_SIZE: usize = 2 + FIELD_ELEMENT_SIZE;

/// One point on the sharing polynomial. The value is wiped when the share is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretShare {
    /// Evaluation point, `1..=n`
    pub x: u8,
    /// Number of shares needed to reconstruct
    pub threshold: u8,
    /// Polynomial value at `x`
    pub y: FieldElement,
}

impl SecretShare {
    /// Raw encoding: `x || threshold || y` (68 bytes).
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Zeroizing::new(Vec::with_capacity(SHARE_ENCODED_SIZE));
        bytes.push(self.x);
        bytes.push(self.threshold);
        bytes.extend_from_slice(&self.y.to_bytes());
        bytes
    }

    /// Parse the raw encoding produced by [`SecretShare::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SHARE_ENCODED_SIZE {
            return Err(CryptoError::InvalidShareEncoding(format!(
                "expected {} bytes, got {}",
                SHARE_ENCODED_SIZE,
                bytes.len()
            )));
        }
        if bytes[0] == 0 {
            return Err(CryptoError::InvalidShareEncoding(
                "share index cannot be 0".to_string(),
            ));
        }
        if bytes[1] < 2 {
            return Err(CryptoError::InvalidShareEncoding(
                "threshold must be at least 2".to_string(),
            ));
        }
        let y = FieldElement::from_bytes(&bytes[2..]).ok_or_else(|| {
            CryptoError::InvalidShareEncoding("share value is not a field element".to_string())
        })?;
        Ok(Self {
            x: bytes[0],
            threshold: bytes[1],
            y,
        })
    }

    /// Hex transport encoding.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&*self.to_bytes()))
    }

    /// Parse a hex transport encoding.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(encoded.trim())
                .map_err(|_| CryptoError::InvalidShareEncoding("invalid hex".to_string()))?,
        );
        Self::from_bytes(&bytes)
    }
}

/// Split `secret` into `total` shares, any `threshold` of which reconstruct it.
pub fn split(secret: &[u8], threshold: u8, total: u8) -> Result<Vec<SecretShare>> {
    split_with_rng(&mut OsRng, secret, threshold, total)
}

/// [`split`] with a caller-provided random source.
pub fn split_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
    secret: &[u8],
    threshold: u8,
    total: u8,
) -> Result<Vec<SecretShare>> {
    if threshold < 2 || threshold > total {
        return Err(CryptoError::InvalidThreshold {
            threshold: threshold as usize,
            total: total as usize,
        });
    }
    let constant = embed_secret(secret)?;

    let mut coefficients = Zeroizing::new(Vec::with_capacity(threshold as usize));
    coefficients.push(constant);
    for _ in 1..threshold {
        coefficients.push(FieldElement::random(rng));
    }

    let shares = (1..=total)
        .map(|x| SecretShare {
            x,
            threshold,
            y: evaluate(&coefficients, &FieldElement::from_u64(x as u64)),
        })
        .collect();
    Ok(shares)
}

/// Recover the secret from at least `threshold` shares of one sharing.
pub fn reconstruct(shares: &[SecretShare]) -> Result<Zeroizing<Vec<u8>>> {
    let first = shares
        .first()
        .ok_or_else(|| CryptoError::ShareQuorum("no shares supplied".to_string()))?;
    let threshold = first.threshold;
    if threshold < 2 {
        return Err(CryptoError::ShareQuorum(format!("invalid threshold {threshold}")));
    }

    let mut seen = HashSet::with_capacity(shares.len());
    for share in shares {
        if share.threshold != threshold {
            return Err(CryptoError::ShareQuorum(
                "shares come from different sharings".to_string(),
            ));
        }
        if share.x == 0 {
            return Err(CryptoError::ShareQuorum("share index cannot be 0".to_string()));
        }
        if !seen.insert(share.x) {
            return Err(CryptoError::ShareQuorum(format!(
                "duplicate share index {}",
                share.x
            )));
        }
    }
    if shares.len() < threshold as usize {
        return Err(CryptoError::ShareQuorum(format!(
            "need {} shares, got {}",
            threshold,
            shares.len()
        )));
    }

    let quorum = &shares[..threshold as usize];
    let mut constant = interpolate_at_zero(quorum);
    let secret = extract_secret(&constant);
    constant.zeroize();
    secret
}

/// Horner evaluation of `coefficients` (constant term first) at `x`.
fn evaluate(coefficients: &[FieldElement], x: &FieldElement) -> FieldElement {
    coefficients
        .iter()
        .rev()
        .fold(FieldElement::ZERO, |acc, c| acc.mul(x).add(c))
}

/// `sum_i y_i * prod_{j != i} x_j / (x_j - x_i)`
fn interpolate_at_zero(shares: &[SecretShare]) -> FieldElement {
    let mut acc = FieldElement::ZERO;
    for (i, share_i) in shares.iter().enumerate() {
        let xi = FieldElement::from_u64(share_i.x as u64);
        let mut numerator = FieldElement::ONE;
        let mut denominator = FieldElement::ONE;
        for (j, share_j) in shares.iter().enumerate() {
            if i == j {
                continue;
            }
            let xj = FieldElement::from_u64(share_j.x as u64);
            numerator = numerator.mul(&xj);
            denominator = denominator.mul(&xj.sub(&xi));
        }
        let basis = numerator.mul(&denominator.invert());
        acc = acc.add(&share_i.y.mul(&basis));
    }
    acc
}

fn embed_secret(secret: &[u8]) -> Result<FieldElement> {
    if secret.is_empty() {
        return Err(CryptoError::EmptySecret);
    }
    if secret.len() > MAX_SHARED_SECRET_SIZE {
        return Err(CryptoError::SecretTooLarge {
            size: secret.len(),
            max: MAX_SHARED_SECRET_SIZE,
        });
    }
    let mut framed = Zeroizing::new(Vec::with_capacity(secret.len() + 1));
    framed.push(LENGTH_MARKER);
    framed.extend_from_slice(secret);
    FieldElement::from_bytes(&framed).ok_or(CryptoError::MalformedSecret)
}

fn extract_secret(element: &FieldElement) -> Result<Zeroizing<Vec<u8>>> {
    let bytes = Zeroizing::new(element.to_bytes());
    let start = bytes
        .iter()
        .position(|&b| b != 0)
        .ok_or(CryptoError::MalformedSecret)?;
    if bytes[start] != LENGTH_MARKER || start + 1 == bytes.len() {
        return Err(CryptoError::MalformedSecret);
    }
    Ok(Zeroizing::new(bytes[start + 1..].to_vec()))
}
