//! Arithmetic in GF(p) for the Mersenne prime p = 2^521 - 1.
//!
//! Elements are nine little-endian 64-bit limbs holding a canonical value in `[0, p)`. All
//! operations run a fixed instruction sequence; reduction uses `2^521 = 1 (mod p)` and a masked
//! final subtraction.

use crate::constants::FIELD_ELEMENT_SIZE;
use rand::{CryptoRng, RngCore};
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

const LIMBS: usize = 9;
const TOP_BITS: u32 = 521 - 64 * 8;
const TOP_MASK: u64 = (1 << TOP_BITS) - 1;

const P: [u64; LIMBS] = [
    u64::MAX,
    u64::MAX,
    u64::MAX,
    u64::MAX,
    u64::MAX,
    u64::MAX,
    u64::MAX,
    u64::MAX,
    TOP_MASK,
];

/// Element of GF(2^521 - 1)
#[derive(Clone, Copy, Default, Zeroize)]
pub struct FieldElement([u64; LIMBS]);

impl std::fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FieldElement([REDACTED])")
    }
}

impl ConstantTimeEq for FieldElement {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0[..].ct_eq(&other.0[..])
    }
}

impl PartialEq for FieldElement {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for FieldElement {}

/// Subtract `p` when `r >= p`; `r` must be below `2p`.
fn conditional_sub_p(r: [u64; LIMBS]) -> [u64; LIMBS] {
    let mut t = [0u64; LIMBS];
    let mut borrow = 0u64;
    for i in 0..LIMBS {
        let (d, b1) = r[i].overflowing_sub(P[i]);
        let (d, b2) = d.overflowing_sub(borrow);
        t[i] = d;
        borrow = (b1 | b2) as u64;
    }
    // borrow set means r < p: keep r
    let keep = 0u64.wrapping_sub(borrow);
    let mut out = [0u64; LIMBS];
    for i in 0..LIMBS {
        out[i] = (r[i] & keep) | (t[i] & !keep);
    }
    out
}

/// Reduce a value below `2^522` into `[0, p)`.
fn fold(mut r: [u64; LIMBS]) -> [u64; LIMBS] {
    let mut carry = r[LIMBS - 1] >> TOP_BITS;
    r[LIMBS - 1] &= TOP_MASK;
    for limb in r.iter_mut() {
        let (s, c) = limb.overflowing_add(carry);
        *limb = s;
        carry = c as u64;
    }
    conditional_sub_p(r)
}

fn add_limbs(a: &[u64; LIMBS], b: &[u64; LIMBS]) -> [u64; LIMBS] {
    let mut r = [0u64; LIMBS];
    let mut carry = 0u64;
    for i in 0..LIMBS {
        let (s, c1) = a[i].overflowing_add(b[i]);
        let (s, c2) = s.overflowing_add(carry);
        r[i] = s;
        carry = (c1 | c2) as u64;
    }
    r
}

impl FieldElement {
    /// Additive identity
    pub const ZERO: Self = Self([0; LIMBS]);

    /// Multiplicative identity
    pub const ONE: Self = Self([1, 0, 0, 0, 0, 0, 0, 0, 0]);

    /// Element from a small integer.
    pub fn from_u64(v: u64) -> Self {
        let mut limbs = [0u64; LIMBS];
        limbs[0] = v;
        Self(limbs)
    }

    /// Sum
    pub fn add(&self, other: &Self) -> Self {
        Self(fold(add_limbs(&self.0, &other.0)))
    }

    /// Difference
    pub fn sub(&self, other: &Self) -> Self {
        // p - b is the bitwise complement of b within 521 bits
        let mut neg = [0u64; LIMBS];
        for i in 0..LIMBS {
            neg[i] = P[i] ^ other.0[i];
        }
        Self(fold(add_limbs(&self.0, &neg)))
    }

    /// Product
    pub fn mul(&self, other: &Self) -> Self {
        let mut wide = [0u64; 2 * LIMBS];
        for i in 0..LIMBS {
            let mut carry = 0u128;
            for j in 0..LIMBS {
                let t = wide[i + j] as u128 + (self.0[i] as u128) * (other.0[j] as u128) + carry;
                wide[i + j] = t as u64;
                carry = t >> 64;
            }
            wide[i + LIMBS] = carry as u64;
        }

        let mut lo = [0u64; LIMBS];
        lo.copy_from_slice(&wide[..LIMBS]);
        lo[LIMBS - 1] &= TOP_MASK;

        let mut hi = [0u64; LIMBS];
        for i in 0..LIMBS {
            hi[i] = (wide[LIMBS - 1 + i] >> TOP_BITS) | (wide[LIMBS + i] << (64 - TOP_BITS));
        }

        let out = Self(fold(add_limbs(&lo, &hi)));
        wide.zeroize();
        lo.zeroize();
        hi.zeroize();
        out
    }

    fn square(&self) -> Self {
        self.mul(self)
    }

    /// Multiplicative inverse via `a^(p-2)`; zero maps to zero.
    pub fn invert(&self) -> Self {
        // p - 2 = 2^521 - 3: bits 520..2 set, bit 1 clear, bit 0 set
        let mut acc = Self::ONE;
        for bit in (0..521).rev() {
            acc = acc.square();
            if bit != 1 {
                acc = acc.mul(self);
            }
        }
        acc
    }

    /// Whether this is the zero element.
    pub fn is_zero(&self) -> Choice {
        self.ct_eq(&Self::ZERO)
    }

    /// Uniformly random element.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut buf = [0u8; FIELD_ELEMENT_SIZE];
        loop {
            rng.fill_bytes(&mut buf);
            buf[0] &= 0x01;
            if let Some(element) = Self::from_bytes(&buf) {
                buf.zeroize();
                return element;
            }
        }
    }

    /// Canonical 66-byte big-endian encoding.
    pub fn to_bytes(&self) -> [u8; FIELD_ELEMENT_SIZE] {
        let mut wide = [0u8; 8 * LIMBS];
        for (i, limb) in self.0.iter().enumerate() {
            let end = wide.len() - 8 * i;
            wide[end - 8..end].copy_from_slice(&limb.to_be_bytes());
        }
        let mut out = [0u8; FIELD_ELEMENT_SIZE];
        out.copy_from_slice(&wide[8 * LIMBS - FIELD_ELEMENT_SIZE..]);
        wide.zeroize();
        out
    }

    /// Parse a big-endian encoding of at most 66 bytes; `None` unless the value is below `p`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > FIELD_ELEMENT_SIZE {
            return None;
        }
        let mut wide = [0u8; 8 * LIMBS];
        wide[8 * LIMBS - bytes.len()..].copy_from_slice(bytes);

        let mut limbs = [0u64; LIMBS];
        for (i, limb) in limbs.iter_mut().enumerate() {
            let end = wide.len() - 8 * i;
            let mut chunk = [0u8; 8];
            chunk.copy_from_slice(&wide[end - 8..end]);
            *limb = u64::from_be_bytes(chunk);
        }
        wide.zeroize();

        if limbs[LIMBS - 1] > TOP_MASK || limbs == P {
            return None;
        }
        Some(Self(limbs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p_minus(v: u64) -> FieldElement {
        FieldElement::ZERO.sub(&FieldElement::from_u64(v))
    }

    #[test]
    fn test_add_wraps_at_modulus() {
        let minus_one = p_minus(1);
        assert_eq!(minus_one.add(&FieldElement::ONE), FieldElement::ZERO);
        assert_eq!(minus_one.add(&minus_one), p_minus(2));
    }

    #[test]
    fn test_sub_and_negation() {
        let a = FieldElement::from_u64(5);
        let b = FieldElement::from_u64(9);
        assert_eq!(a.sub(&b), p_minus(4));
        assert_eq!(a.sub(&b).add(&b), a);
        assert_eq!(a.sub(&FieldElement::ZERO), a);
    }

    #[test]
    fn test_mul_small_and_wraparound() {
        let a = FieldElement::from_u64(1 << 40);
        let b = FieldElement::from_u64(1 << 50);
        let mut expected = [0u64; LIMBS];
        expected[1] = 1 << 26;
        assert_eq!(a.mul(&b), FieldElement(expected));

        // (-1) * (-1) = 1
        assert_eq!(p_minus(1).mul(&p_minus(1)), FieldElement::ONE);
        // 2^520 * 2 = 2^521 = 1
        let mut top = [0u64; LIMBS];
        top[LIMBS - 1] = 1 << (TOP_BITS - 1);
        assert_eq!(FieldElement(top).mul(&FieldElement::from_u64(2)), FieldElement::ONE);
    }

    #[test]
    fn test_invert() {
        for v in [1u64, 2, 3, 255, 0xDEAD_BEEF] {
            let a = FieldElement::from_u64(v);
            assert_eq!(a.mul(&a.invert()), FieldElement::ONE);
        }
        let a = p_minus(12345);
        assert_eq!(a.mul(&a.invert()), FieldElement::ONE);
        assert_eq!(FieldElement::ZERO.invert(), FieldElement::ZERO);
    }

    #[test]
    fn test_bytes_roundtrip_and_canonical_check() {
        let mut rng = rand::thread_rng();
        let a = FieldElement::random(&mut rng);
        assert_eq!(FieldElement::from_bytes(&a.to_bytes()), Some(a));

        let mut p_bytes = [0xFFu8; FIELD_ELEMENT_SIZE];
        p_bytes[0] = 0x01;
        assert!(FieldElement::from_bytes(&p_bytes).is_none());
        p_bytes[0] = 0x02;
        assert!(FieldElement::from_bytes(&p_bytes).is_none());
        assert!(FieldElement::from_bytes(&[0u8; FIELD_ELEMENT_SIZE + 1]).is_none());

        assert_eq!(FieldElement::from_bytes(&[0x01, 0x00]), Some(FieldElement::from_u64(256)));
    }

    #[test]
    fn test_is_zero() {
        assert!(bool::from(FieldElement::ZERO.is_zero()));
        assert!(!bool::from(FieldElement::ONE.is_zero()));
    }
}
