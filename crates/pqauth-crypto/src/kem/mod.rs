//! ML-KEM-768 key encapsulation (FIPS 203).
//!
//! Key generation expands a 32-byte seed into the public matrix `A` and samples secret and
//! error vectors from a centered binomial distribution; encapsulation binds the shared secret
//! to `H(ek)`; decapsulation re-encrypts and falls back to an implicit-rejection key selected
//! in constant time, so a malformed ciphertext is indistinguishable from a valid one.
//!
//! ```
//! use pqauth_crypto::kem;
//!
//! let keypair = kem::generate_keypair().unwrap();
//! let (ciphertext, sender_secret) = kem::encapsulate(keypair.public_key()).unwrap();
//! let receiver_secret = kem::decapsulate(&ciphertext, keypair.secret_key()).unwrap();
//! assert_eq!(sender_secret, receiver_secret);
//! ```

mod poly;

use crate::{constants::*, errors::*, hashing::constant_time_compare, utils, xof};
use poly::{Poly, N};
use serde::{Deserialize, Serialize};
use subtle::{ConditionallySelectable, ConstantTimeEq};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const K: usize = 3;
const ETA1: usize = 2;
const ETA2: usize = 2;
const DU: usize = 10;
const DV: usize = 4;

const POLY_BYTES: usize = 384;
const PKE_SECRET_BYTES: usize = POLY_BYTES * K;
const C1_BYTES: usize = 32 * DU * K;

type PolyVec = [Poly; K];

/// ML-KEM-768 encapsulation key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KemPublicKey(Vec<u8>);

impl KemPublicKey {
    /// Parse an encapsulation key, checking its length and coefficient encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEM_PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidKeySize {
                expected: KEM_PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        if !modulus_check(bytes) {
            return Err(CryptoError::InvalidPublicKey);
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hex encoding for transport
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// ML-KEM-768 decapsulation key, zeroized on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KemSecretKey(Vec<u8>);

impl KemSecretKey {
    /// Wrap raw decapsulation key bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEM_SECRET_KEY_SIZE {
            return Err(CryptoError::InvalidKeySize {
                expected: KEM_SECRET_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Get a reference to the key bytes
    ///
    /// # Security
    ///
    /// Never log or persist these bytes unwrapped.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for KemSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KemSecretKey([REDACTED])")
    }
}

/// ML-KEM-768 ciphertext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KemCiphertext(Vec<u8>);

impl KemCiphertext {
    /// Parse a ciphertext, checking its length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEM_CIPHERTEXT_SIZE {
            return Err(CryptoError::InvalidCiphertext {
                expected: KEM_CIPHERTEXT_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Raw ciphertext bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// 32-byte shared secret; equality is constant time.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; KEM_SHARED_SECRET_SIZE]);

impl SharedSecret {
    /// Wrap raw bytes
    pub fn from_bytes(bytes: [u8; KEM_SHARED_SECRET_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get a reference to the secret bytes
    pub fn as_bytes(&self) -> &[u8; KEM_SHARED_SECRET_SIZE] {
        &self.0
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        constant_time_compare(&self.0, &other.0)
    }
}

impl Eq for SharedSecret {}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

/// Encapsulation/decapsulation key pair
#[derive(Debug)]
pub struct KemKeyPair {
    public_key: KemPublicKey,
    secret_key: KemSecretKey,
}

impl KemKeyPair {
    /// Encapsulation key
    pub fn public_key(&self) -> &KemPublicKey {
        &self.public_key
    }

    /// Decapsulation key
    pub fn secret_key(&self) -> &KemSecretKey {
        &self.secret_key
    }

    /// Split into owned halves, transferring secret ownership to the caller.
    pub fn into_parts(self) -> (KemPublicKey, KemSecretKey) {
        (self.public_key, self.secret_key)
    }
}

/// Generate a key pair from the OS random source.
pub fn generate_keypair() -> Result<KemKeyPair> {
    let d = Zeroizing::new(utils::random_array::<SEED_SIZE>()?);
    let z = Zeroizing::new(utils::random_array::<SEED_SIZE>()?);
    Ok(generate_keypair_from_seed(&d, &z))
}

/// Deterministic key generation from the seeds `d` and `z` (ML-KEM.KeyGen_internal).
pub fn generate_keypair_from_seed(d: &[u8; 32], z: &[u8; 32]) -> KemKeyPair {
    let (ek, dk_pke) = pke_keygen(d);
    let h = xof::sha3_256(&[ek.as_slice()]);

    let mut dk = Vec::with_capacity(KEM_SECRET_KEY_SIZE);
    dk.extend_from_slice(&dk_pke);
    dk.extend_from_slice(&ek);
    dk.extend_from_slice(&h);
    dk.extend_from_slice(z);

    KemKeyPair {
        public_key: KemPublicKey(ek),
        secret_key: KemSecretKey(dk),
    }
}

/// Encapsulate a fresh shared secret against `public_key`.
pub fn encapsulate(public_key: &KemPublicKey) -> Result<(KemCiphertext, SharedSecret)> {
    let m = Zeroizing::new(utils::random_array::<32>()?);
    encapsulate_with_randomness(public_key, &m)
}

/// Deterministic encapsulation with message `m` (ML-KEM.Encaps_internal).
pub fn encapsulate_with_randomness(
    public_key: &KemPublicKey,
    m: &[u8; 32],
) -> Result<(KemCiphertext, SharedSecret)> {
    let ek = public_key.as_bytes();
    if !modulus_check(ek) {
        return Err(CryptoError::InvalidPublicKey);
    }

    let h = xof::sha3_256(&[ek]);
    let g = Zeroizing::new(xof::sha3_512(&[&m[..], &h[..]]));
    let mut shared = [0u8; 32];
    shared.copy_from_slice(&g[..32]);
    let mut r = Zeroizing::new([0u8; 32]);
    r.copy_from_slice(&g[32..]);

    let c = pke_encrypt(ek, m, &r);
    Ok((KemCiphertext(c), SharedSecret(shared)))
}

/// Recover the shared secret from `ciphertext`.
///
/// A ciphertext that does not re-encrypt identically yields the implicit-rejection secret
/// `SHAKE256(z || c)` rather than an error.
pub fn decapsulate(ciphertext: &KemCiphertext, secret_key: &KemSecretKey) -> Result<SharedSecret> {
    let dk = secret_key.as_bytes();
    let c = ciphertext.as_bytes();
    if c.len() != KEM_CIPHERTEXT_SIZE {
        return Err(CryptoError::InvalidCiphertext {
            expected: KEM_CIPHERTEXT_SIZE,
            actual: c.len(),
        });
    }

    let dk_pke = &dk[..PKE_SECRET_BYTES];
    let ek = &dk[PKE_SECRET_BYTES..PKE_SECRET_BYTES + KEM_PUBLIC_KEY_SIZE];
    let h = &dk[PKE_SECRET_BYTES + KEM_PUBLIC_KEY_SIZE..PKE_SECRET_BYTES + KEM_PUBLIC_KEY_SIZE + 32];
    let z = &dk[PKE_SECRET_BYTES + KEM_PUBLIC_KEY_SIZE + 32..];

    if !constant_time_compare(&xof::sha3_256(&[ek]), h) {
        return Err(CryptoError::InvalidSecretKey);
    }

    let m_prime = Zeroizing::new(pke_decrypt(dk_pke, c));
    let g = Zeroizing::new(xof::sha3_512(&[&m_prime[..], h]));
    let mut r_prime = Zeroizing::new([0u8; 32]);
    r_prime.copy_from_slice(&g[32..]);

    let mut rejection = [0u8; 32];
    xof::shake256_into(&[z, c], &mut rejection);

    let c_prime = pke_encrypt(ek, &m_prime, &r_prime);
    let matches = c.ct_eq(&c_prime[..]);

    let mut shared = [0u8; 32];
    for i in 0..32 {
        shared[i] = u8::conditional_select(&rejection[i], &g[i], matches);
    }
    rejection.zeroize();
    Ok(SharedSecret(shared))
}

/// ByteEncode12(ByteDecode12(ek)) == ek for the encoded vector `t`.
fn modulus_check(ek: &[u8]) -> bool {
    if ek.len() != KEM_PUBLIC_KEY_SIZE {
        return false;
    }
    let mut buf = [0u8; POLY_BYTES];
    ek[..PKE_SECRET_BYTES]
        .chunks_exact(POLY_BYTES)
        .all(|chunk| {
            poly::byte_encode(&poly::byte_decode(chunk, 12), 12, &mut buf);
            buf[..] == chunk[..]
        })
}

fn expand_matrix(rho: &[u8; 32]) -> [PolyVec; K] {
    let mut a = [[[0u16; N]; K]; K];
    for (i, row) in a.iter_mut().enumerate() {
        for (j, entry) in row.iter_mut().enumerate() {
            *entry = poly::sample_ntt(rho, j as u8, i as u8);
        }
    }
    a
}

/// K-PKE.KeyGen: returns (ek, dk_pke).
fn pke_keygen(d: &[u8; 32]) -> (Vec<u8>, Zeroizing<Vec<u8>>) {
    let g = Zeroizing::new(xof::sha3_512(&[&d[..], &[K as u8][..]]));
    let mut rho = [0u8; 32];
    rho.copy_from_slice(&g[..32]);
    let mut sigma = Zeroizing::new([0u8; 32]);
    sigma.copy_from_slice(&g[32..]);

    let a = expand_matrix(&rho);

    let mut s: Zeroizing<PolyVec> = Zeroizing::new([[0u16; N]; K]);
    let mut e: Zeroizing<PolyVec> = Zeroizing::new([[0u16; N]; K]);
    let mut nonce = 0u8;
    for p in s.iter_mut() {
        *p = poly::sample_cbd(&sigma, nonce, ETA1);
        poly::ntt(p);
        nonce += 1;
    }
    for p in e.iter_mut() {
        *p = poly::sample_cbd(&sigma, nonce, ETA1);
        poly::ntt(p);
        nonce += 1;
    }

    let mut ek = vec![0u8; KEM_PUBLIC_KEY_SIZE];
    for i in 0..K {
        let mut t = e[i];
        for j in 0..K {
            poly::multiply_accumulate(&mut t, &a[i][j], &s[j]);
        }
        poly::byte_encode(&t, 12, &mut ek[i * POLY_BYTES..(i + 1) * POLY_BYTES]);
    }
    ek[PKE_SECRET_BYTES..].copy_from_slice(&rho);

    let mut dk = Zeroizing::new(vec![0u8; PKE_SECRET_BYTES]);
    for i in 0..K {
        poly::byte_encode(&s[i], 12, &mut dk[i * POLY_BYTES..(i + 1) * POLY_BYTES]);
    }
    (ek, dk)
}

/// K-PKE.Encrypt
fn pke_encrypt(ek: &[u8], m: &[u8; 32], r: &[u8; 32]) -> Vec<u8> {
    let mut t_hat = [[0u16; N]; K];
    for (i, t) in t_hat.iter_mut().enumerate() {
        *t = poly::byte_decode(&ek[i * POLY_BYTES..(i + 1) * POLY_BYTES], 12);
    }
    let mut rho = [0u8; 32];
    rho.copy_from_slice(&ek[PKE_SECRET_BYTES..]);
    let a = expand_matrix(&rho);

    let mut y: Zeroizing<PolyVec> = Zeroizing::new([[0u16; N]; K]);
    let mut nonce = 0u8;
    for p in y.iter_mut() {
        *p = poly::sample_cbd(r, nonce, ETA1);
        poly::ntt(p);
        nonce += 1;
    }
    let mut e1: Zeroizing<PolyVec> = Zeroizing::new([[0u16; N]; K]);
    for p in e1.iter_mut() {
        *p = poly::sample_cbd(r, nonce, ETA2);
        nonce += 1;
    }
    let e2 = Zeroizing::new(poly::sample_cbd(r, nonce, ETA2));

    let mut c = vec![0u8; KEM_CIPHERTEXT_SIZE];

    // u = NTT^-1(A^T * y) + e1
    for i in 0..K {
        let mut u = [0u16; N];
        for j in 0..K {
            poly::multiply_accumulate(&mut u, &a[j][i], &y[j]);
        }
        poly::ntt_inverse(&mut u);
        let u = poly::poly_add(&u, &e1[i]);
        poly::byte_encode(
            &poly::compress(&u, DU),
            DU,
            &mut c[i * 32 * DU..(i + 1) * 32 * DU],
        );
    }

    // v = NTT^-1(t^T * y) + e2 + Decompress1(m)
    let mut v = [0u16; N];
    for j in 0..K {
        poly::multiply_accumulate(&mut v, &t_hat[j], &y[j]);
    }
    poly::ntt_inverse(&mut v);
    let mu = Zeroizing::new(poly::decompress(&poly::byte_decode(m, 1), 1));
    let v = Zeroizing::new(poly::poly_add(&poly::poly_add(&v, &e2), &mu));
    poly::byte_encode(&poly::compress(&v, DV), DV, &mut c[C1_BYTES..]);
    c
}

/// K-PKE.Decrypt
fn pke_decrypt(dk_pke: &[u8], c: &[u8]) -> [u8; 32] {
    let mut s_hat: Zeroizing<PolyVec> = Zeroizing::new([[0u16; N]; K]);
    for (i, s) in s_hat.iter_mut().enumerate() {
        *s = poly::byte_decode(&dk_pke[i * POLY_BYTES..(i + 1) * POLY_BYTES], 12);
    }

    let mut acc = [0u16; N];
    for i in 0..K {
        let mut u = poly::decompress(
            &poly::byte_decode(&c[i * 32 * DU..(i + 1) * 32 * DU], DU),
            DU,
        );
        poly::ntt(&mut u);
        poly::multiply_accumulate(&mut acc, &s_hat[i], &u);
    }
    poly::ntt_inverse(&mut acc);

    let v = poly::decompress(&poly::byte_decode(&c[C1_BYTES..], DV), DV);
    let w = Zeroizing::new(poly::poly_sub(&v, &acc));
    acc.zeroize();

    let mut m = [0u8; 32];
    poly::byte_encode(&poly::compress(&w, 1), 1, &mut m);
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_and_ciphertext_sizes() {
        let keypair = generate_keypair().unwrap();
        assert_eq!(keypair.public_key().as_bytes().len(), KEM_PUBLIC_KEY_SIZE);
        assert_eq!(keypair.secret_key().as_bytes().len(), KEM_SECRET_KEY_SIZE);

        let (ct, _) = encapsulate(keypair.public_key()).unwrap();
        assert_eq!(ct.as_bytes().len(), KEM_CIPHERTEXT_SIZE);
    }

    #[test]
    fn test_encapsulate_decapsulate_agree() {
        for _ in 0..8 {
            let keypair = generate_keypair().unwrap();
            let (ct, ss) = encapsulate(keypair.public_key()).unwrap();
            let recovered = decapsulate(&ct, keypair.secret_key()).unwrap();
            assert_eq!(ss, recovered);
        }
    }

    #[test]
    fn test_known_answer_seed_0_to_63() {
        // Cross-checked against an independent FIPS 203 implementation
        let seed: Vec<u8> = (0u8..64).collect();
        let mut d = [0u8; 32];
        let mut z = [0u8; 32];
        d.copy_from_slice(&seed[..32]);
        z.copy_from_slice(&seed[32..]);

        let keypair = generate_keypair_from_seed(&d, &z);
        let (ct, ss) = encapsulate_with_randomness(keypair.public_key(), &[0x42; 32]).unwrap();

        assert_eq!(
            hex::encode(xof::sha3_256(&[keypair.public_key().as_bytes()])),
            "a24e16d8f8f9383a95b77050f4d9fd2f5733eec1d63ef3c23ebf9918173669a7"
        );
        assert_eq!(
            hex::encode(xof::sha3_256(&[keypair.secret_key().as_bytes()])),
            "1149f17c3c4ac6ab1e3e2d9d8bd0171355ac0fa31bb8855c48ceade874c0864b"
        );
        assert_eq!(
            hex::encode(xof::sha3_256(&[ct.as_bytes()])),
            "e9a0824664dba3f8f3c86ecb43a0c889030947ff01d276d04d46c204b62fc221"
        );
        assert_eq!(
            hex::encode(ss.as_bytes()),
            "b83e7f23b33f909715c7a50b0d4b1f6684d53e1f4b9056f803b29f058ccb5566"
        );
        assert_eq!(decapsulate(&ct, keypair.secret_key()).unwrap(), ss);
    }

    #[test]
    fn test_keygen_is_deterministic_in_seed() {
        let a = generate_keypair_from_seed(&[1u8; 32], &[2u8; 32]);
        let b = generate_keypair_from_seed(&[1u8; 32], &[2u8; 32]);
        let c = generate_keypair_from_seed(&[3u8; 32], &[2u8; 32]);
        assert_eq!(a.public_key(), b.public_key());
        assert_ne!(a.public_key(), c.public_key());
    }

    #[test]
    fn test_tampered_ciphertext_yields_implicit_rejection() {
        let keypair = generate_keypair_from_seed(&[7u8; 32], &[8u8; 32]);
        let (ct, ss) = encapsulate_with_randomness(keypair.public_key(), &[9u8; 32]).unwrap();

        let mut tampered = ct.as_bytes().to_vec();
        tampered[0] ^= 0x01;
        let tampered = KemCiphertext::from_bytes(&tampered).unwrap();

        let rejected = decapsulate(&tampered, keypair.secret_key()).unwrap();
        assert_ne!(rejected, ss);

        // The rejection key is a deterministic function of z and the ciphertext
        let mut expected = [0u8; 32];
        let dk = keypair.secret_key().as_bytes();
        xof::shake256_into(&[&dk[KEM_SECRET_KEY_SIZE - 32..], tampered.as_bytes()], &mut expected);
        assert_eq!(rejected.as_bytes(), &expected);
    }

    #[test]
    fn test_wrong_secret_key_disagrees() {
        let alice = generate_keypair().unwrap();
        let mallory = generate_keypair().unwrap();
        let (ct, ss) = encapsulate(alice.public_key()).unwrap();
        assert_ne!(decapsulate(&ct, mallory.secret_key()).unwrap(), ss);
    }

    #[test]
    fn test_public_key_modulus_check() {
        let keypair = generate_keypair().unwrap();
        let mut bytes = keypair.public_key().as_bytes().to_vec();
        // Coefficient 0 of t becomes 0xFFF >= q
        bytes[0] = 0xFF;
        bytes[1] |= 0x0F;
        assert!(matches!(
            KemPublicKey::from_bytes(&bytes),
            Err(CryptoError::InvalidPublicKey)
        ));
        assert!(matches!(
            KemPublicKey::from_bytes(&bytes[..100]),
            Err(CryptoError::InvalidKeySize { .. })
        ));
    }

    #[test]
    fn test_corrupted_secret_key_hash_is_detected() {
        let keypair = generate_keypair().unwrap();
        let (ct, _) = encapsulate(keypair.public_key()).unwrap();
        let mut dk = keypair.secret_key().as_bytes().to_vec();
        dk[PKE_SECRET_BYTES + 5] ^= 0xFF;
        let corrupted = KemSecretKey::from_bytes(&dk).unwrap();
        assert!(matches!(
            decapsulate(&ct, &corrupted),
            Err(CryptoError::InvalidSecretKey)
        ));
    }

    #[test]
    fn test_ciphertext_length_is_checked() {
        assert!(matches!(
            KemCiphertext::from_bytes(&[0u8; 10]),
            Err(CryptoError::InvalidCiphertext { .. })
        ));
    }
}
