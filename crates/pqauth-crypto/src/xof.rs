//! SHA-3 family helpers shared by the lattice schemes.
//!
//! `Digest` and `Update` both define `update` for fixed-output hashers, so calls are spelled
//! out with the trait path.

use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Digest, Sha3_256, Sha3_512, Shake128, Shake256};

/// SHA3-256 over the concatenation of `parts`
pub(crate) fn sha3_256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    for part in parts {
        Digest::update(&mut hasher, part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&Digest::finalize(hasher));
    out
}

/// SHA3-512 over the concatenation of `parts`
pub(crate) fn sha3_512(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Sha3_512::new();
    for part in parts {
        Digest::update(&mut hasher, part);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&Digest::finalize(hasher));
    out
}

/// SHAKE128 stream over the concatenation of `parts`
pub(crate) fn shake128(parts: &[&[u8]]) -> impl XofReader {
    let mut hasher = Shake128::default();
    for part in parts {
        Update::update(&mut hasher, part);
    }
    hasher.finalize_xof()
}

/// SHAKE256 stream over the concatenation of `parts`
pub(crate) fn shake256(parts: &[&[u8]]) -> impl XofReader {
    let mut hasher = Shake256::default();
    for part in parts {
        Update::update(&mut hasher, part);
    }
    hasher.finalize_xof()
}

/// Fill `out` with SHAKE256 output over the concatenation of `parts`
pub(crate) fn shake256_into(parts: &[&[u8]], out: &mut [u8]) {
    shake256(parts).read(out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha3_256_empty_vector() {
        assert_eq!(
            hex::encode(sha3_256(&[])),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    #[test]
    fn test_parts_are_concatenated() {
        assert_eq!(sha3_512(&[&b"ab"[..], b"c"]), sha3_512(&[&b"abc"[..]]));

        let mut a = [0u8; 40];
        let mut b = [0u8; 40];
        shake256_into(&[&b"a"[..], b"bc"], &mut a);
        shake256_into(&[&b"abc"[..]], &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_shake128_empty_vector() {
        let mut out = [0u8; 16];
        shake128(&[]).read(&mut out);
        assert_eq!(hex::encode(out), "7f9c2ba4e88f827d616045507605853e");
    }
}
