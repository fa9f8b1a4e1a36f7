//! ML-DSA-65 digital signatures (FIPS 204).
//!
//! Signing is hedged: every call mixes 32 fresh random bytes into the mask seed, so two
//! signatures over the same message differ while verification stays deterministic. The
//! Fiat-Shamir-with-aborts loop is capped at [`MAX_SIGNING_ATTEMPTS`]; running out of attempts
//! is reported as [`CryptoError::SigningExhausted`] instead of retrying forever.

mod packing;
mod poly;

use crate::{constants::*, errors::*, hashing::constant_time_compare, utils, xof};
use packing::{SecretKeyParts, C_TILDE_SIZE, W1_BYTES};
use poly::{Poly, BETA, D, GAMMA1, GAMMA2, N};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub(crate) const K: usize = 6;
pub(crate) const L: usize = 5;
pub(crate) const OMEGA: usize = 55;

/// ML-DSA-65 verification key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePublicKey(Vec<u8>);

impl SignaturePublicKey {
    /// Parse a verification key, checking its length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidKeySize {
                expected: SIGNATURE_PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// ML-DSA-65 signing key, zeroized on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SignatureSecretKey(Vec<u8>);

impl SignatureSecretKey {
    /// Wrap raw signing key bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_SECRET_KEY_SIZE {
            return Err(CryptoError::InvalidKeySize {
                expected: SIGNATURE_SECRET_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Parse a hex-encoded signing key.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(encoded).map_err(|e| CryptoError::InvalidInput(e.to_string()))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Get a reference to the key bytes
    ///
    /// # Security
    ///
    /// Never log or persist these bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hex encoding for one-time delivery to the credential holder.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.0))
    }
}

impl std::fmt::Debug for SignatureSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SignatureSecretKey([REDACTED])")
    }
}

/// Encoded signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// Wrap raw signature bytes. Malformed input is rejected by [`verify`], not here.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Parse a hex-encoded signature.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        hex::decode(encoded)
            .map(Self)
            .map_err(|e| CryptoError::InvalidInput(e.to_string()))
    }

    /// Raw signature bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// Signing key pair
#[derive(Debug)]
pub struct SignatureKeyPair {
    public_key: SignaturePublicKey,
    secret_key: SignatureSecretKey,
}

impl SignatureKeyPair {
    /// Verification key
    pub fn public_key(&self) -> &SignaturePublicKey {
        &self.public_key
    }

    /// Signing key
    pub fn secret_key(&self) -> &SignatureSecretKey {
        &self.secret_key
    }

    /// Split into owned halves, transferring secret ownership to the caller.
    pub fn into_parts(self) -> (SignaturePublicKey, SignatureSecretKey) {
        (self.public_key, self.secret_key)
    }
}

fn expand_matrix(rho: &[u8; 32]) -> Box<[[Poly; L]; K]> {
    let mut a = Box::new([[[0u32; N]; L]; K]);
    for (r, row) in a.iter_mut().enumerate() {
        for (s, entry) in row.iter_mut().enumerate() {
            *entry = poly::rej_ntt_poly(rho, s as u8, r as u8);
        }
    }
    a
}

/// `A * v` for `v` in the NTT domain; result in the NTT domain.
fn matrix_vector(a: &[[Poly; L]; K], v: &[Poly; L]) -> [Poly; K] {
    let mut out = [[0u32; N]; K];
    for (row, acc) in a.iter().zip(out.iter_mut()) {
        for (entry, vs) in row.iter().zip(v.iter()) {
            *acc = poly::poly_add(acc, &poly::pointwise(entry, vs));
        }
    }
    out
}

/// Generate a key pair from the OS random source.
pub fn generate_keypair() -> Result<SignatureKeyPair> {
    let xi = Zeroizing::new(utils::random_array::<SEED_SIZE>()?);
    Ok(generate_keypair_from_seed(&xi))
}

/// Deterministic key generation from seed `xi` (ML-DSA.KeyGen_internal).
pub fn generate_keypair_from_seed(xi: &[u8; 32]) -> SignatureKeyPair {
    let mut expanded = Zeroizing::new([0u8; 128]);
    xof::shake256_into(&[&xi[..], &[K as u8, L as u8][..]], &mut expanded[..]);

    let mut rho = [0u8; 32];
    rho.copy_from_slice(&expanded[..32]);
    let mut rho_prime = Zeroizing::new([0u8; 64]);
    rho_prime.copy_from_slice(&expanded[32..96]);
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&expanded[96..]);

    let a = expand_matrix(&rho);

    let mut s1: Zeroizing<[Poly; L]> = Zeroizing::new([[0u32; N]; L]);
    let mut s2: Zeroizing<[Poly; K]> = Zeroizing::new([[0u32; N]; K]);
    for (r, p) in s1.iter_mut().enumerate() {
        *p = poly::rej_bounded_poly(&rho_prime, r as u16);
    }
    for (r, p) in s2.iter_mut().enumerate() {
        *p = poly::rej_bounded_poly(&rho_prime, (r + L) as u16);
    }

    let mut s1_hat: Zeroizing<[Poly; L]> = Zeroizing::new(*s1);
    for p in s1_hat.iter_mut() {
        poly::ntt(p);
    }
    let mut t = Zeroizing::new(matrix_vector(&a, &s1_hat));

    let mut t1 = [[0u32; N]; K];
    let mut t0: Zeroizing<[Poly; K]> = Zeroizing::new([[0u32; N]; K]);
    for i in 0..K {
        poly::ntt_inverse(&mut t[i]);
        let ti = poly::poly_add(&t[i], &s2[i]);
        for j in 0..N {
            let (hi, lo) = poly::power2round(ti[j]);
            t1[i][j] = hi;
            t0[i][j] = poly::from_signed(lo);
        }
    }

    let pk = packing::pk_encode(&rho, &t1);
    let mut tr = [0u8; 64];
    xof::shake256_into(&[&pk[..]], &mut tr);

    let sk = packing::sk_encode(&SecretKeyParts {
        rho,
        key,
        tr,
        s1,
        s2,
        t0,
    });

    SignatureKeyPair {
        public_key: SignaturePublicKey(pk),
        secret_key: SignatureSecretKey(sk),
    }
}

/// Sign `message` with an empty context string.
pub fn sign(message: &[u8], secret_key: &SignatureSecretKey) -> Result<Signature> {
    sign_with_context(message, &[], secret_key)
}

/// Sign `message` under `context` (at most 255 bytes).
pub fn sign_with_context(
    message: &[u8],
    context: &[u8],
    secret_key: &SignatureSecretKey,
) -> Result<Signature> {
    let rnd = Zeroizing::new(utils::random_array::<32>()?);
    sign_with_randomness(message, context, secret_key, &rnd)
}

/// Sign with caller-supplied randomness; all-zero `rnd` gives the deterministic variant.
pub fn sign_with_randomness(
    message: &[u8],
    context: &[u8],
    secret_key: &SignatureSecretKey,
    rnd: &[u8; 32],
) -> Result<Signature> {
    sign_internal(message, context, secret_key, rnd, MAX_SIGNING_ATTEMPTS)
}

fn message_representative(tr: &[u8; 64], message: &[u8], context: &[u8]) -> Result<[u8; 64]> {
    if context.len() > MAX_CONTEXT_SIZE {
        return Err(CryptoError::ContextTooLong(context.len()));
    }
    let mut mu = [0u8; 64];
    xof::shake256_into(
        &[&tr[..], &[0u8, context.len() as u8][..], context, message],
        &mut mu,
    );
    Ok(mu)
}

fn sign_internal(
    message: &[u8],
    context: &[u8],
    secret_key: &SignatureSecretKey,
    rnd: &[u8; 32],
    max_attempts: u32,
) -> Result<Signature> {
    let sk = packing::sk_decode(secret_key.as_bytes());
    let mu = message_representative(&sk.tr, message, context)?;

    let mut s1_hat = Zeroizing::new(*sk.s1);
    let mut s2_hat = Zeroizing::new(*sk.s2);
    let mut t0_hat = Zeroizing::new(*sk.t0);
    s1_hat.iter_mut().for_each(poly::ntt);
    s2_hat.iter_mut().for_each(poly::ntt);
    t0_hat.iter_mut().for_each(poly::ntt);

    let a = expand_matrix(&sk.rho);

    let mut rho_pp = Zeroizing::new([0u8; 64]);
    xof::shake256_into(&[&sk.key[..], &rnd[..], &mu[..]], &mut rho_pp[..]);

    let mut kappa: u16 = 0;
    for _ in 0..max_attempts {
        let mut y: Zeroizing<[Poly; L]> = Zeroizing::new([[0u32; N]; L]);
        for (r, p) in y.iter_mut().enumerate() {
            *p = poly::expand_mask_poly(&rho_pp, kappa.wrapping_add(r as u16));
        }
        kappa = kappa.wrapping_add(L as u16);

        let mut y_hat = Zeroizing::new(*y);
        y_hat.iter_mut().for_each(poly::ntt);
        let mut w = Zeroizing::new(matrix_vector(&a, &y_hat));
        w.iter_mut().for_each(poly::ntt_inverse);

        let mut w1 = [[0u32; N]; K];
        for i in 0..K {
            for j in 0..N {
                w1[i][j] = poly::high_bits(w[i][j]);
            }
        }

        let mut c_tilde = [0u8; C_TILDE_SIZE];
        xof::shake256_into(&[&mu[..], &packing::w1_encode(&w1)[..]], &mut c_tilde);
        let mut c_hat = poly::sample_in_ball(&c_tilde);
        poly::ntt(&mut c_hat);

        let mut z: Zeroizing<[Poly; L]> = Zeroizing::new([[0u32; N]; L]);
        for i in 0..L {
            let mut cs1 = poly::pointwise(&c_hat, &s1_hat[i]);
            poly::ntt_inverse(&mut cs1);
            z[i] = poly::poly_add(&y[i], &cs1);
            cs1.zeroize();
        }
        if z.iter().any(|p| poly::inf_norm(p) >= GAMMA1 - BETA) {
            continue;
        }

        // r = w - c*s2; its low bits must stay clear of the rounding boundary
        let mut r: Zeroizing<[Poly; K]> = Zeroizing::new([[0u32; N]; K]);
        for i in 0..K {
            let mut cs2 = poly::pointwise(&c_hat, &s2_hat[i]);
            poly::ntt_inverse(&mut cs2);
            r[i] = poly::poly_sub(&w[i], &cs2);
            cs2.zeroize();
        }
        let low_ok = r
            .iter()
            .all(|p| p.iter().all(|&c| poly::low_bits(c).unsigned_abs() < GAMMA2 - BETA));
        if !low_ok {
            continue;
        }

        let mut h = [[false; N]; K];
        let mut hint_count = 0usize;
        let mut ct0_ok = true;
        for i in 0..K {
            let mut ct0 = poly::pointwise(&c_hat, &t0_hat[i]);
            poly::ntt_inverse(&mut ct0);
            if poly::inf_norm(&ct0) >= GAMMA2 {
                ct0_ok = false;
            }
            for j in 0..N {
                let with_ct0 = poly::add(r[i][j], ct0[j]);
                let hint = poly::high_bits(with_ct0) != poly::high_bits(r[i][j]);
                h[i][j] = hint;
                hint_count += hint as usize;
            }
            ct0.zeroize();
        }
        if !ct0_ok || hint_count > OMEGA {
            continue;
        }

        return Ok(Signature(packing::sig_encode(&c_tilde, &z, &h)));
    }

    Err(CryptoError::SigningExhausted {
        attempts: max_attempts,
    })
}

/// Verify `signature` over `message` with an empty context string.
pub fn verify(message: &[u8], signature: &Signature, public_key: &SignaturePublicKey) -> bool {
    verify_with_context(message, &[], signature, public_key)
}

/// Verify `signature` over `message` under `context`.
///
/// Never panics: malformed keys, signatures or oversized contexts verify as `false`.
pub fn verify_with_context(
    message: &[u8],
    context: &[u8],
    signature: &Signature,
    public_key: &SignaturePublicKey,
) -> bool {
    let pk = public_key.as_bytes();
    if pk.len() != SIGNATURE_PUBLIC_KEY_SIZE {
        return false;
    }
    let Some(sig) = packing::sig_decode(signature.as_bytes()) else {
        return false;
    };
    if sig.z.iter().any(|p| poly::inf_norm(p) >= GAMMA1 - BETA) {
        return false;
    }

    let (rho, t1) = packing::pk_decode(pk);
    let mut tr = [0u8; 64];
    xof::shake256_into(&[pk], &mut tr);
    let Ok(mu) = message_representative(&tr, message, context) else {
        return false;
    };

    let a = expand_matrix(&rho);
    let mut c_hat = poly::sample_in_ball(&sig.c_tilde);
    poly::ntt(&mut c_hat);

    let mut z_hat = sig.z;
    z_hat.iter_mut().for_each(poly::ntt);
    let az = matrix_vector(&a, &z_hat);

    let mut w1 = [[0u32; N]; K];
    for i in 0..K {
        let mut t1_scaled = [0u32; N];
        for j in 0..N {
            t1_scaled[j] = t1[i][j] << D;
        }
        poly::ntt(&mut t1_scaled);
        let mut w_approx = poly::poly_sub(&az[i], &poly::pointwise(&c_hat, &t1_scaled));
        poly::ntt_inverse(&mut w_approx);
        for j in 0..N {
            w1[i][j] = poly::use_hint(sig.h[i][j], w_approx[j]);
        }
    }

    let mut c_tilde = [0u8; C_TILDE_SIZE];
    let encoded: [u8; W1_BYTES * K] = packing::w1_encode(&w1);
    xof::shake256_into(&[&mu[..], &encoded[..]], &mut c_tilde);
    constant_time_compare(&c_tilde, &sig.c_tilde)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_and_signature_sizes() {
        let keypair = generate_keypair().unwrap();
        assert_eq!(keypair.public_key().as_bytes().len(), SIGNATURE_PUBLIC_KEY_SIZE);
        assert_eq!(keypair.secret_key().as_bytes().len(), SIGNATURE_SECRET_KEY_SIZE);

        let sig = sign(b"message", keypair.secret_key()).unwrap();
        assert_eq!(sig.as_bytes().len(), SIGNATURE_SIZE);
    }

    #[test]
    fn test_sign_verify() {
        let keypair = generate_keypair().unwrap();
        let message = b"0123456789abcdef:1700000000000";

        let sig = sign(message, keypair.secret_key()).unwrap();
        assert!(verify(message, &sig, keypair.public_key()));
    }

    #[test]
    fn test_known_answer_seed_0_to_31() {
        // Public key cross-checked against an independent FIPS 203/204 implementation
        let xi: [u8; 32] = core::array::from_fn(|i| i as u8);
        let keypair = generate_keypair_from_seed(&xi);

        assert_eq!(
            hex::encode(xof::sha3_256(&[keypair.public_key().as_bytes()])),
            "1800725067e388d837d911fe4f66101cc1961b1bb755030dc574272cfb00013f"
        );
        assert_eq!(
            hex::encode(xof::sha3_256(&[keypair.secret_key().as_bytes()])),
            "4ecfbd119980b1090a7feda39c225539ffa3ef3ff673b239b60189bfd4541170"
        );

        let sig = sign_with_randomness(b"pqauth", &[], keypair.secret_key(), &[0u8; 32]).unwrap();
        assert_eq!(
            hex::encode(xof::sha3_256(&[sig.as_bytes()])),
            "1af059bc39d72fe3800749735754da1eaae663f4a73037062cfc6858ca31a48d"
        );
        assert!(verify(b"pqauth", &sig, keypair.public_key()));
    }

    #[test]
    fn test_attempt_budget_exhaustion_is_fatal() {
        // This key/message/rnd needs 13 iterations of the rejection loop
        let xi: [u8; 32] = core::array::from_fn(|i| i as u8);
        let keypair = generate_keypair_from_seed(&xi);

        let result = sign_internal(b"pqauth", &[], keypair.secret_key(), &[0u8; 32], 5);
        assert!(matches!(
            result,
            Err(CryptoError::SigningExhausted { attempts: 5 })
        ));

        let sig = sign_internal(b"pqauth", &[], keypair.secret_key(), &[0u8; 32], 64).unwrap();
        assert!(verify(b"pqauth", &sig, keypair.public_key()));
    }

    #[test]
    fn test_signatures_are_randomized() {
        let keypair = generate_keypair().unwrap();
        let a = sign(b"same", keypair.secret_key()).unwrap();
        let b = sign(b"same", keypair.secret_key()).unwrap();
        assert_ne!(a, b);
        assert!(verify(b"same", &a, keypair.public_key()));
        assert!(verify(b"same", &b, keypair.public_key()));
    }

    #[test]
    fn test_modified_message_fails() {
        let keypair = generate_keypair().unwrap();
        let sig = sign(b"original", keypair.secret_key()).unwrap();
        assert!(!verify(b"originaL", &sig, keypair.public_key()));
    }

    #[test]
    fn test_bit_flips_in_signature_fail() {
        let keypair = generate_keypair().unwrap();
        let sig = sign(b"message", keypair.secret_key()).unwrap();
        for position in [0, 47, 48, 1000, 3200, SIGNATURE_SIZE - 1] {
            let mut bytes = sig.as_bytes().to_vec();
            bytes[position] ^= 0x01;
            assert!(
                !verify(b"message", &Signature::from_bytes(&bytes), keypair.public_key()),
                "flip at {position} still verified"
            );
        }
    }

    #[test]
    fn test_mismatched_public_key_fails() {
        let alice = generate_keypair().unwrap();
        let bob = generate_keypair().unwrap();
        let sig = sign(b"message", alice.secret_key()).unwrap();
        assert!(!verify(b"message", &sig, bob.public_key()));
    }

    #[test]
    fn test_malformed_inputs_return_false() {
        let keypair = generate_keypair().unwrap();
        assert!(!verify(b"m", &Signature::from_bytes(&[]), keypair.public_key()));
        assert!(!verify(b"m", &Signature::from_bytes(&[0xFF; SIGNATURE_SIZE]), keypair.public_key()));

        let sig = sign(b"m", keypair.secret_key()).unwrap();
        let truncated_pk = SignaturePublicKey(keypair.public_key().as_bytes()[..100].to_vec());
        assert!(!verify(b"m", &sig, &truncated_pk));
    }

    #[test]
    fn test_context_separates_signatures() {
        let keypair = generate_keypair().unwrap();
        let sig = sign_with_context(b"m", b"pqauth", keypair.secret_key()).unwrap();
        assert!(verify_with_context(b"m", b"pqauth", &sig, keypair.public_key()));
        assert!(!verify(b"m", &sig, keypair.public_key()));

        let long_context = [0u8; MAX_CONTEXT_SIZE + 1];
        assert!(matches!(
            sign_with_context(b"m", &long_context, keypair.secret_key()),
            Err(CryptoError::ContextTooLong(256))
        ));
        assert!(!verify_with_context(b"m", &long_context, &sig, keypair.public_key()));
    }

    #[test]
    fn test_secret_key_hex_roundtrip() {
        let keypair = generate_keypair().unwrap();
        let encoded = keypair.secret_key().to_hex();
        let decoded = SignatureSecretKey::from_hex(&encoded).unwrap();
        assert_eq!(decoded.as_bytes(), keypair.secret_key().as_bytes());
    }
}
