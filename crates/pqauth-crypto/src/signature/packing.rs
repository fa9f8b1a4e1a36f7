//! Byte encodings of ML-DSA-65 keys and signatures.

use super::poly::{self, Poly, D, ETA, GAMMA1, N};
use super::{K, L, OMEGA};
use crate::constants::*;
use zeroize::{Zeroize, Zeroizing};

pub(crate) const C_TILDE_SIZE: usize = 48;
const T1_BYTES: usize = 320;
const ETA_BYTES: usize = 128;
const T0_BYTES: usize = 416;
const Z_BYTES: usize = 640;
pub(crate) const W1_BYTES: usize = 128;

/// Pack values below `2^bits` little-endian into `32 * bits` bytes.
pub(crate) fn pack_bits(f: &[u32; N], bits: usize, out: &mut [u8]) {
    let mut acc = 0u64;
    let mut filled = 0;
    let mut idx = 0;
    for &c in f.iter() {
        acc |= (c as u64) << filled;
        filled += bits;
        while filled >= 8 {
            out[idx] = acc as u8;
            idx += 1;
            acc >>= 8;
            filled -= 8;
        }
    }
}

/// Inverse of [`pack_bits`].
pub(crate) fn unpack_bits(bytes: &[u8], bits: usize) -> [u32; N] {
    let mask = (1u64 << bits) - 1;
    let mut f = [0u32; N];
    let mut acc = 0u64;
    let mut filled = 0;
    let mut idx = 0;
    for c in f.iter_mut() {
        while filled < bits {
            acc |= (bytes[idx] as u64) << filled;
            idx += 1;
            filled += 8;
        }
        *c = (acc & mask) as u32;
        acc >>= bits;
        filled -= bits;
    }
    f
}

/// Pack a polynomial with centered coefficients in `[-a, b]` as `b - x`.
fn pack_offset(p: &Poly, b: u32, bits: usize, out: &mut [u8]) {
    let mut shifted = [0u32; N];
    for i in 0..N {
        shifted[i] = (b as i32 - poly::centered(p[i])) as u32;
    }
    pack_bits(&shifted, bits, out);
    shifted.zeroize();
}

fn unpack_offset(bytes: &[u8], b: u32, bits: usize) -> Poly {
    let mut raw = unpack_bits(bytes, bits);
    let mut p = [0u32; N];
    for i in 0..N {
        p[i] = poly::from_signed(b as i32 - raw[i] as i32);
    }
    raw.zeroize();
    p
}

pub(crate) fn pk_encode(rho: &[u8; 32], t1: &[Poly; K]) -> Vec<u8> {
    let mut pk = vec![0u8; SIGNATURE_PUBLIC_KEY_SIZE];
    pk[..32].copy_from_slice(rho);
    for (i, p) in t1.iter().enumerate() {
        pack_bits(p, 10, &mut pk[32 + i * T1_BYTES..32 + (i + 1) * T1_BYTES]);
    }
    pk
}

pub(crate) fn pk_decode(pk: &[u8]) -> ([u8; 32], [Poly; K]) {
    let mut rho = [0u8; 32];
    rho.copy_from_slice(&pk[..32]);
    let mut t1 = [[0u32; N]; K];
    for (i, p) in t1.iter_mut().enumerate() {
        *p = unpack_bits(&pk[32 + i * T1_BYTES..32 + (i + 1) * T1_BYTES], 10);
    }
    (rho, t1)
}

/// Decoded signing key. Every field is wiped on drop.
pub(crate) struct SecretKeyParts {
    pub rho: [u8; 32],
    pub key: Zeroizing<[u8; 32]>,
    pub tr: [u8; 64],
    pub s1: Zeroizing<[Poly; L]>,
    pub s2: Zeroizing<[Poly; K]>,
    pub t0: Zeroizing<[Poly; K]>,
}

pub(crate) fn sk_encode(parts: &SecretKeyParts) -> Vec<u8> {
    let mut sk = vec![0u8; SIGNATURE_SECRET_KEY_SIZE];
    sk[..32].copy_from_slice(&parts.rho);
    sk[32..64].copy_from_slice(&parts.key[..]);
    sk[64..128].copy_from_slice(&parts.tr);
    let mut offset = 128;
    for p in parts.s1.iter().chain(parts.s2.iter()) {
        pack_offset(p, ETA, 4, &mut sk[offset..offset + ETA_BYTES]);
        offset += ETA_BYTES;
    }
    for p in parts.t0.iter() {
        pack_offset(p, 1 << (D - 1), 13, &mut sk[offset..offset + T0_BYTES]);
        offset += T0_BYTES;
    }
    sk
}

pub(crate) fn sk_decode(sk: &[u8]) -> SecretKeyParts {
    let mut parts = SecretKeyParts {
        rho: [0u8; 32],
        key: Zeroizing::new([0u8; 32]),
        tr: [0u8; 64],
        s1: Zeroizing::new([[0u32; N]; L]),
        s2: Zeroizing::new([[0u32; N]; K]),
        t0: Zeroizing::new([[0u32; N]; K]),
    };
    parts.rho.copy_from_slice(&sk[..32]);
    parts.key.copy_from_slice(&sk[32..64]);
    parts.tr.copy_from_slice(&sk[64..128]);
    let mut offset = 128;
    for p in parts.s1.iter_mut().chain(parts.s2.iter_mut()) {
        *p = unpack_offset(&sk[offset..offset + ETA_BYTES], ETA, 4);
        offset += ETA_BYTES;
    }
    for p in parts.t0.iter_mut() {
        *p = unpack_offset(&sk[offset..offset + T0_BYTES], 1 << (D - 1), 13);
        offset += T0_BYTES;
    }
    parts
}

pub(crate) fn w1_encode(w1: &[Poly; K]) -> [u8; W1_BYTES * K] {
    let mut out = [0u8; W1_BYTES * K];
    for (i, p) in w1.iter().enumerate() {
        pack_bits(p, 4, &mut out[i * W1_BYTES..(i + 1) * W1_BYTES]);
    }
    out
}

pub(crate) fn sig_encode(c_tilde: &[u8; C_TILDE_SIZE], z: &[Poly; L], h: &[[bool; N]; K]) -> Vec<u8> {
    let mut sig = vec![0u8; SIGNATURE_SIZE];
    sig[..C_TILDE_SIZE].copy_from_slice(c_tilde);
    let mut offset = C_TILDE_SIZE;
    for p in z.iter() {
        pack_offset(p, GAMMA1, 20, &mut sig[offset..offset + Z_BYTES]);
        offset += Z_BYTES;
    }

    let hints = &mut sig[offset..];
    let mut index = 0;
    for (i, row) in h.iter().enumerate() {
        for (j, &bit) in row.iter().enumerate() {
            if bit {
                hints[index] = j as u8;
                index += 1;
            }
        }
        hints[OMEGA + i] = index as u8;
    }
    sig
}

/// Decoded signature components.
pub(crate) struct DecodedSignature {
    pub c_tilde: [u8; C_TILDE_SIZE],
    pub z: [Poly; L],
    pub h: [[bool; N]; K],
}

/// Parse a signature; `None` for wrong lengths or non-canonical hint encodings.
pub(crate) fn sig_decode(sig: &[u8]) -> Option<DecodedSignature> {
    if sig.len() != SIGNATURE_SIZE {
        return None;
    }
    let mut c_tilde = [0u8; C_TILDE_SIZE];
    c_tilde.copy_from_slice(&sig[..C_TILDE_SIZE]);

    let mut z = [[0u32; N]; L];
    let mut offset = C_TILDE_SIZE;
    for p in z.iter_mut() {
        *p = unpack_offset(&sig[offset..offset + Z_BYTES], GAMMA1, 20);
        offset += Z_BYTES;
    }

    let hints = &sig[offset..];
    let mut h = [[false; N]; K];
    let mut index = 0usize;
    for (i, row) in h.iter_mut().enumerate() {
        let end = hints[OMEGA + i] as usize;
        if end < index || end > OMEGA {
            return None;
        }
        let first = index;
        while index < end {
            if index > first && hints[index - 1] >= hints[index] {
                return None;
            }
            row[hints[index] as usize] = true;
            index += 1;
        }
    }
    if hints[index..OMEGA].iter().any(|&b| b != 0) {
        return None;
    }

    Some(DecodedSignature { c_tilde, z, h })
}
