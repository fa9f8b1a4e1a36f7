//! Polynomial arithmetic over Z_q[X]/(X^256 + 1), q = 3329.
//!
//! Coefficients are kept fully reduced in `[0, q)`. Reductions use Barrett multiplication and
//! a branch-free conditional subtraction so timing does not depend on coefficient values.

use crate::xof;
use sha3::digest::XofReader;

pub(crate) const N: usize = 256;
pub(crate) const Q: u16 = 3329;
const Q32: u32 = Q as u32;

/// floor(2^32 / q)
const BARRETT_M: u64 = 1_290_167;

/// 128^-1 mod q, the scaling factor of the inverse transform
const INV_128: u16 = 3303;

pub(crate) type Poly = [u16; N];

const fn bitrev7(i: usize) -> usize {
    let mut r = 0;
    let mut j = 0;
    while j < 7 {
        r |= ((i >> j) & 1) << (6 - j);
        j += 1;
    }
    r
}

const fn pow_mod(base: u32, mut exp: usize) -> u16 {
    let mut result = 1u32;
    let mut b = base % Q32;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result * b % Q32;
        }
        b = b * b % Q32;
        exp >>= 1;
    }
    result as u16
}

/// 17^bitrev7(i) mod q
const ZETAS: [u16; 128] = {
    let mut z = [0u16; 128];
    let mut i = 0;
    while i < 128 {
        z[i] = pow_mod(17, bitrev7(i));
        i += 1;
    }
    z
};

/// 17^(2 * bitrev7(i) + 1) mod q
const GAMMAS: [u16; 128] = {
    let mut g = [0u16; 128];
    let mut i = 0;
    while i < 128 {
        g[i] = pow_mod(17, 2 * bitrev7(i) + 1);
        i += 1;
    }
    g
};

/// Map `a` in `[0, 2q)` to `[0, q)` without branching.
#[inline(always)]
fn csub(a: u16) -> u16 {
    let r = a.wrapping_sub(Q);
    // top bit of r is set iff a < q
    let mask = 0u16.wrapping_sub(r >> 15);
    r.wrapping_add(Q & mask)
}

/// Barrett reduction of a product of two reduced coefficients.
#[inline(always)]
fn reduce(a: u32) -> u16 {
    let t = ((a as u64 * BARRETT_M) >> 32) as u32;
    csub((a - t * Q32) as u16)
}

#[inline(always)]
pub(crate) fn add(a: u16, b: u16) -> u16 {
    csub(a + b)
}

#[inline(always)]
pub(crate) fn sub(a: u16, b: u16) -> u16 {
    csub(a + Q - b)
}

#[inline(always)]
pub(crate) fn mul(a: u16, b: u16) -> u16 {
    reduce(a as u32 * b as u32)
}

pub(crate) fn poly_add(a: &Poly, b: &Poly) -> Poly {
    let mut r = [0u16; N];
    for i in 0..N {
        r[i] = add(a[i], b[i]);
    }
    r
}

pub(crate) fn poly_sub(a: &Poly, b: &Poly) -> Poly {
    let mut r = [0u16; N];
    for i in 0..N {
        r[i] = sub(a[i], b[i]);
    }
    r
}

/// Forward number-theoretic transform, in place.
pub(crate) fn ntt(f: &mut Poly) {
    let mut i = 1;
    let mut len = 128;
    while len >= 2 {
        for start in (0..N).step_by(2 * len) {
            let zeta = ZETAS[i];
            i += 1;
            for j in start..start + len {
                let t = mul(zeta, f[j + len]);
                f[j + len] = sub(f[j], t);
                f[j] = add(f[j], t);
            }
        }
        len /= 2;
    }
}

/// Inverse number-theoretic transform, in place.
pub(crate) fn ntt_inverse(f: &mut Poly) {
    let mut i = 127;
    let mut len = 2;
    while len <= 128 {
        for start in (0..N).step_by(2 * len) {
            let zeta = ZETAS[i];
            i -= 1;
            for j in start..start + len {
                let t = f[j];
                f[j] = add(t, f[j + len]);
                f[j + len] = mul(zeta, sub(f[j + len], t));
            }
        }
        len *= 2;
    }
    for c in f.iter_mut() {
        *c = mul(*c, INV_128);
    }
}

/// Product of two polynomials in the NTT domain.
pub(crate) fn multiply_ntts(f: &Poly, g: &Poly) -> Poly {
    let mut h = [0u16; N];
    for i in 0..128 {
        let (a0, a1) = (f[2 * i], f[2 * i + 1]);
        let (b0, b1) = (g[2 * i], g[2 * i + 1]);
        h[2 * i] = add(mul(a0, b0), mul(mul(a1, b1), GAMMAS[i]));
        h[2 * i + 1] = add(mul(a0, b1), mul(a1, b0));
    }
    h
}

/// Accumulate `acc += f * g` in the NTT domain.
pub(crate) fn multiply_accumulate(acc: &mut Poly, f: &Poly, g: &Poly) {
    let product = multiply_ntts(f, g);
    for i in 0..N {
        acc[i] = add(acc[i], product[i]);
    }
}

/// Pack `d`-bit coefficients little-endian into `32 * d` bytes.
pub(crate) fn byte_encode(f: &Poly, d: usize, out: &mut [u8]) {
    debug_assert_eq!(out.len(), 32 * d);
    let mut acc = 0u32;
    let mut bits = 0;
    let mut idx = 0;
    for &c in f.iter() {
        acc |= (c as u32) << bits;
        bits += d;
        while bits >= 8 {
            out[idx] = acc as u8;
            idx += 1;
            acc >>= 8;
            bits -= 8;
        }
    }
}

/// Unpack `d`-bit coefficients; 12-bit values are reduced mod q.
pub(crate) fn byte_decode(bytes: &[u8], d: usize) -> Poly {
    debug_assert_eq!(bytes.len(), 32 * d);
    let mask = (1u32 << d) - 1;
    let mut f = [0u16; N];
    let mut acc = 0u32;
    let mut bits = 0;
    let mut idx = 0;
    for c in f.iter_mut() {
        while bits < d {
            acc |= (bytes[idx] as u32) << bits;
            idx += 1;
            bits += 8;
        }
        let value = (acc & mask) as u16;
        acc >>= d;
        bits -= d;
        *c = if d == 12 { csub(value) } else { value };
    }
    f
}

/// floor(2^33 / q) + 1; `t * DIV_Q_MUL >> 33 == t / q` for every `t < q * 2^11`.
const DIV_Q_MUL: u64 = 2_580_335;
const DIV_Q_SHIFT: u32 = 33;

/// Compress every coefficient to `d` bits: round(2^d / q * x) mod 2^d.
///
/// The division by q is a fixed multiply-shift so the running time does not depend on the
/// coefficient, which is secret during decryption.
pub(crate) fn compress(f: &Poly, d: usize) -> Poly {
    debug_assert!(d <= 11);
    let mask = (1u64 << d) - 1;
    let mut r = [0u16; N];
    for i in 0..N {
        let t = ((f[i] as u64) << d) + (Q32 / 2) as u64;
        r[i] = (((t * DIV_Q_MUL) >> DIV_Q_SHIFT) & mask) as u16;
    }
    r
}

/// Decompress `d`-bit values: round(q / 2^d * y).
pub(crate) fn decompress(f: &Poly, d: usize) -> Poly {
    let mut r = [0u16; N];
    for i in 0..N {
        r[i] = ((f[i] as u32 * Q32 + (1 << (d - 1))) >> d) as u16;
    }
    r
}

/// Uniform sampling of an NTT-domain polynomial from SHAKE128(rho || j || i).
pub(crate) fn sample_ntt(rho: &[u8; 32], j: u8, i: u8) -> Poly {
    let mut reader = xof::shake128(&[&rho[..], &[j, i]]);
    let mut a = [0u16; N];
    let mut count = 0;
    let mut buf = [0u8; 168];
    while count < N {
        reader.read(&mut buf);
        for chunk in buf.chunks_exact(3) {
            let d1 = chunk[0] as u16 | ((chunk[1] as u16 & 0x0F) << 8);
            let d2 = (chunk[1] as u16 >> 4) | ((chunk[2] as u16) << 4);
            if d1 < Q && count < N {
                a[count] = d1;
                count += 1;
            }
            if d2 < Q && count < N {
                a[count] = d2;
                count += 1;
            }
        }
    }
    a
}

/// Centered binomial sample with parameter `eta` from PRF(seed, nonce) = SHAKE256(seed || nonce).
pub(crate) fn sample_cbd(seed: &[u8; 32], nonce: u8, eta: usize) -> Poly {
    let mut buf = vec![0u8; 64 * eta];
    xof::shake256_into(&[&seed[..], &[nonce]], &mut buf);
    let bit = |k: usize| ((buf[k / 8] >> (k % 8)) & 1) as u16;
    let mut f = [0u16; N];
    for (i, c) in f.iter_mut().enumerate() {
        let mut x = 0u16;
        let mut y = 0u16;
        for j in 0..eta {
            x += bit(2 * i * eta + j);
            y += bit(2 * i * eta + eta + j);
        }
        *c = sub(x, y);
    }
    zeroize::Zeroize::zeroize(&mut buf);
    f
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeta_table_endpoints() {
        assert_eq!(ZETAS[0], 1);
        assert_eq!(ZETAS[1], 1729);
        assert_eq!(ZETAS[2], 2580);
        assert_eq!(ZETAS[127], 2154);
        assert_eq!(GAMMAS[0], 17);
    }

    #[test]
    fn test_reduce_matches_modulo() {
        for a in [0u32, 1, 3328, 3329, 3330, 3328 * 3328, 11_082_241] {
            assert_eq!(reduce(a) as u32, a % Q32, "a = {a}");
        }
    }

    #[test]
    fn test_ntt_roundtrip() {
        let mut f = [0u16; N];
        for (i, c) in f.iter_mut().enumerate() {
            *c = (i as u16 * 13 + 7) % Q;
        }
        let original = f;
        ntt(&mut f);
        assert_ne!(f, original);
        ntt_inverse(&mut f);
        assert_eq!(f, original);
    }

    #[test]
    fn test_ntt_multiplication_matches_schoolbook() {
        let mut a = [0u16; N];
        let mut b = [0u16; N];
        for i in 0..N {
            a[i] = (i as u16 * 31 + 5) % Q;
            b[i] = (i as u16 * 7 + 1000) % Q;
        }

        // Negacyclic schoolbook product
        let mut expected = [0i64; N];
        for i in 0..N {
            for j in 0..N {
                let p = a[i] as i64 * b[j] as i64;
                if i + j < N {
                    expected[i + j] += p;
                } else {
                    expected[i + j - N] -= p;
                }
            }
        }

        let (mut ah, mut bh) = (a, b);
        ntt(&mut ah);
        ntt(&mut bh);
        let mut product = multiply_ntts(&ah, &bh);
        ntt_inverse(&mut product);

        for i in 0..N {
            assert_eq!(product[i] as i64, expected[i].rem_euclid(Q as i64));
        }
    }

    #[test]
    fn test_compress_decompress_error_bound() {
        let mut f = [0u16; N];
        for (i, c) in f.iter_mut().enumerate() {
            *c = (i as u16 * 13) % Q;
        }
        let back = decompress(&compress(&f, 10), 10);
        for i in 0..N {
            let diff = (f[i] as i32 - back[i] as i32).rem_euclid(Q as i32);
            let dist = diff.min(Q as i32 - diff);
            assert!(dist <= 2, "coefficient {i} drifted by {dist}");
        }
    }

    #[test]
    fn test_compress_matches_exact_rounding() {
        for d in [1usize, 4, 5, 10, 11] {
            let mut f = [0u16; N];
            for start in (0..Q).step_by(N) {
                for (i, c) in f.iter_mut().enumerate() {
                    *c = (start + i as u16).min(Q - 1);
                }
                let r = compress(&f, d);
                for i in 0..N {
                    // round(x * 2^d / q) with ties up, reduced mod 2^d
                    let x = f[i] as u64;
                    let expected = ((x << (d + 1)) + Q as u64) / (2 * Q as u64) % (1 << d);
                    assert_eq!(r[i] as u64, expected, "x = {x}, d = {d}");
                }
            }
        }
    }

    #[test]
    fn test_byte_encode_decode_roundtrip() {
        let mut f = [0u16; N];
        for (i, c) in f.iter_mut().enumerate() {
            *c = (i as u16 * 97) % Q;
        }
        let mut out = [0u8; 384];
        byte_encode(&f, 12, &mut out);
        assert_eq!(byte_decode(&out, 12), f);
    }

    #[test]
    fn test_cbd_coefficients_are_small() {
        let f = sample_cbd(&[9u8; 32], 0, 2);
        for &c in f.iter() {
            assert!(c <= 2 || c >= Q - 2);
        }
    }
}
