//! Arithmetic, sampling and rounding over Z_q[X]/(X^256 + 1), q = 8380417.
//!
//! Coefficients are stored reduced in `[0, q)`; signed quantities are recovered with
//! [`centered`] when they are packed or norm-checked.

use crate::xof;
use sha3::digest::XofReader;

pub(crate) const N: usize = 256;
pub(crate) const Q: u32 = 8_380_417;
pub(crate) const D: u32 = 13;
pub(crate) const ETA: u32 = 4;
pub(crate) const TAU: usize = 49;
pub(crate) const GAMMA1: u32 = 1 << 19;
pub(crate) const GAMMA2: u32 = (Q - 1) / 32;
pub(crate) const BETA: u32 = 196;

/// 256^-1 mod q
const INV_256: u32 = 8_347_681;

pub(crate) type Poly = [u32; N];

const fn bitrev8(i: usize) -> usize {
    let mut r = 0;
    let mut j = 0;
    while j < 8 {
        r |= ((i >> j) & 1) << (7 - j);
        j += 1;
    }
    r
}

const fn pow_mod(base: u64, mut exp: usize) -> u32 {
    let q = Q as u64;
    let mut result = 1u64;
    let mut b = base % q;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result * b % q;
        }
        b = b * b % q;
        exp >>= 1;
    }
    result as u32
}

/// 1753^bitrev8(i) mod q
const ZETAS: [u32; 256] = {
    let mut z = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        z[i] = pow_mod(1753, bitrev8(i));
        i += 1;
    }
    z
};

/// Map `a` in `[0, 2q)` to `[0, q)` without branching.
#[inline(always)]
fn csub(a: u32) -> u32 {
    let r = a.wrapping_sub(Q);
    r.wrapping_add(Q & 0u32.wrapping_sub(r >> 31))
}

#[inline(always)]
pub(crate) fn add(a: u32, b: u32) -> u32 {
    csub(a + b)
}

#[inline(always)]
pub(crate) fn sub(a: u32, b: u32) -> u32 {
    csub(a + Q - b)
}

/// floor(2^48 / q); Barrett quotient estimates are at most one short for products below q^2.
const BARRETT_MUL: u128 = (1u128 << 48) / Q as u128;

/// Modular product by Barrett reduction, so no hardware division sees secret operands.
#[inline(always)]
pub(crate) fn mul(a: u32, b: u32) -> u32 {
    let x = a as u64 * b as u64;
    let quotient = ((x as u128 * BARRETT_MUL) >> 48) as u64;
    csub((x - quotient * Q as u64) as u32)
}

/// Signed representative in `(-(q-1)/2, (q-1)/2]`.
#[inline(always)]
pub(crate) fn centered(a: u32) -> i32 {
    let a = a as i32;
    let t = ((Q - 1) / 2) as i32 - a;
    a - ((t >> 31) & Q as i32)
}

/// Reduce a signed value in `(-q, q)` into `[0, q)`.
#[inline(always)]
pub(crate) fn from_signed(a: i32) -> u32 {
    (a + ((a >> 31) & Q as i32)) as u32
}

pub(crate) fn poly_add(a: &Poly, b: &Poly) -> Poly {
    let mut r = [0u32; N];
    for i in 0..N {
        r[i] = add(a[i], b[i]);
    }
    r
}

pub(crate) fn poly_sub(a: &Poly, b: &Poly) -> Poly {
    let mut r = [0u32; N];
    for i in 0..N {
        r[i] = sub(a[i], b[i]);
    }
    r
}

/// Coefficient-wise product in the NTT domain.
pub(crate) fn pointwise(a: &Poly, b: &Poly) -> Poly {
    let mut r = [0u32; N];
    for i in 0..N {
        r[i] = mul(a[i], b[i]);
    }
    r
}

/// Infinity norm of the centered coefficients.
pub(crate) fn inf_norm(p: &Poly) -> u32 {
    p.iter()
        .map(|&c| centered(c).unsigned_abs())
        .max()
        .unwrap_or(0)
}

/// Forward number-theoretic transform, in place.
pub(crate) fn ntt(w: &mut Poly) {
    let mut m = 0;
    let mut len = 128;
    while len >= 1 {
        for start in (0..N).step_by(2 * len) {
            m += 1;
            let zeta = ZETAS[m];
            for j in start..start + len {
                let t = mul(zeta, w[j + len]);
                w[j + len] = sub(w[j], t);
                w[j] = add(w[j], t);
            }
        }
        len /= 2;
    }
}

/// Inverse number-theoretic transform, in place.
pub(crate) fn ntt_inverse(w: &mut Poly) {
    let mut m = 256;
    let mut len = 1;
    while len < N {
        for start in (0..N).step_by(2 * len) {
            m -= 1;
            let zeta = Q - ZETAS[m];
            for j in start..start + len {
                let t = w[j];
                w[j] = add(t, w[j + len]);
                w[j + len] = mul(zeta, sub(t, w[j + len]));
            }
        }
        len *= 2;
    }
    for c in w.iter_mut() {
        *c = mul(*c, INV_256);
    }
}

/// Split `a` into `(a1, a0)` with `a = a1 * 2^d + a0`, `a0` in `(-2^(d-1), 2^(d-1)]`.
pub(crate) fn power2round(a: u32) -> (u32, i32) {
    let a1 = (a + (1 << (D - 1)) - 1) >> D;
    (a1, a as i32 - (a1 << D) as i32)
}

/// Split `a` into high and low parts modulo `2 * gamma2`.
pub(crate) fn decompose(a: u32) -> (u32, i32) {
    let a = a as i32;
    let mut a1 = (a + 127) >> 7;
    a1 = (a1 * 1025 + (1 << 21)) >> 22;
    a1 &= 15;
    let mut a0 = a - a1 * 2 * GAMMA2 as i32;
    a0 -= ((((Q - 1) / 2) as i32 - a0) >> 31) & Q as i32;
    (a1 as u32, a0)
}

#[inline(always)]
pub(crate) fn high_bits(a: u32) -> u32 {
    decompose(a).0
}

#[inline(always)]
pub(crate) fn low_bits(a: u32) -> i32 {
    decompose(a).1
}

/// Correct the high bits of `r` with hint bit `hint`.
pub(crate) fn use_hint(hint: bool, r: u32) -> u32 {
    let (r1, r0) = decompose(r);
    if !hint {
        r1
    } else if r0 > 0 {
        (r1 + 1) & 15
    } else {
        r1.wrapping_sub(1) & 15
    }
}

/// Uniform NTT-domain polynomial from SHAKE128(rho || s || r).
pub(crate) fn rej_ntt_poly(rho: &[u8; 32], s: u8, r: u8) -> Poly {
    let mut reader = xof::shake128(&[&rho[..], &[s, r]]);
    let mut a = [0u32; N];
    let mut count = 0;
    let mut buf = [0u8; 168];
    while count < N {
        reader.read(&mut buf);
        for chunk in buf.chunks_exact(3) {
            let v = chunk[0] as u32 | (chunk[1] as u32) << 8 | (chunk[2] as u32 & 0x7F) << 16;
            if v < Q && count < N {
                a[count] = v;
                count += 1;
            }
        }
    }
    a
}

/// Polynomial with coefficients in `[-eta, eta]` from SHAKE256(rho' || nonce).
pub(crate) fn rej_bounded_poly(rho_prime: &[u8; 64], nonce: u16) -> Poly {
    let mut reader = xof::shake256(&[&rho_prime[..], &nonce.to_le_bytes()]);
    let mut a = [0u32; N];
    let mut count = 0;
    let mut buf = [0u8; 136];
    while count < N {
        reader.read(&mut buf);
        for &byte in buf.iter() {
            for half in [byte & 0x0F, byte >> 4] {
                if (half as u32) < 2 * ETA + 1 && count < N {
                    a[count] = sub(ETA, half as u32);
                    count += 1;
                }
            }
        }
    }
    zeroize::Zeroize::zeroize(&mut buf);
    a
}

/// Masking polynomial with coefficients in `(-gamma1, gamma1]`.
pub(crate) fn expand_mask_poly(rho_pp: &[u8; 64], nonce: u16) -> Poly {
    let mut buf = [0u8; 640];
    xof::shake256_into(&[&rho_pp[..], &nonce.to_le_bytes()], &mut buf);
    let raw = super::packing::unpack_bits(&buf, 20);
    let mut y = [0u32; N];
    for i in 0..N {
        y[i] = sub(GAMMA1, raw[i]);
    }
    zeroize::Zeroize::zeroize(&mut buf);
    y
}

/// Challenge polynomial with exactly `tau` coefficients in `{-1, 1}`.
pub(crate) fn sample_in_ball(c_tilde: &[u8]) -> Poly {
    let mut reader = xof::shake256(&[c_tilde]);
    let mut sign_bytes = [0u8; 8];
    reader.read(&mut sign_bytes);
    let mut signs = u64::from_le_bytes(sign_bytes);

    let mut c = [0u32; N];
    let mut byte = [0u8; 1];
    for i in N - TAU..N {
        let j = loop {
            reader.read(&mut byte);
            if byte[0] as usize <= i {
                break byte[0] as usize;
            }
        };
        c[i] = c[j];
        c[j] = if signs & 1 == 0 { 1 } else { Q - 1 };
        signs >>= 1;
    }
    c
}
