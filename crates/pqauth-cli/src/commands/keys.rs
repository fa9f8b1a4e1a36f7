/*!
 * Key generation and primitive self-tests
 */

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::*;
use pqauth_crypto::{
    kem, signature, KemCiphertext, KEM_ALGORITHM, SIGNATURE_ALGORITHM,
};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyKind {
    /// ML-KEM-768 encapsulation key pair
    Kem,
    /// ML-DSA-65 signing key pair
    Dsa,
}

pub fn keygen(kind: KeyKind, reveal_secret: bool) -> Result<()> {
    let (algorithm, public_key, secret_key) = match kind {
        KeyKind::Kem => {
            let (public_key, secret_key) = kem::generate_keypair()?.into_parts();
            (
                KEM_ALGORITHM,
                public_key.to_hex(),
                hex::encode(secret_key.as_bytes()),
            )
        }
        KeyKind::Dsa => {
            let (public_key, secret_key) = signature::generate_keypair()?.into_parts();
            (
                SIGNATURE_ALGORITHM,
                hex::encode(public_key.as_bytes()),
                secret_key.to_hex().as_str().to_owned(),
            )
        }
    };

    println!("{}", format!("=== {algorithm} Key Pair ===").bold().cyan());
    println!("\n{}", "Public key:".bold());
    println!("{public_key}");

    if reveal_secret {
        println!("\n{}", "Secret key (store securely):".bold().red());
        println!("{secret_key}");
    } else {
        println!(
            "\n{}",
            "Secret key withheld; pass --reveal-secret to print it".yellow()
        );
    }
    Ok(())
}

/// Round-trip both primitives and time them.
pub fn kem_selftest(rounds: u32) -> Result<()> {
    println!("{}", "=== Primitive Self-Test ===".bold().cyan());
    println!();

    println!("{}", format!("Step 1: {KEM_ALGORITHM} key generation...").yellow());
    let started = Instant::now();
    let keypair = kem::generate_keypair()?;
    println!(
        "{}",
        format!("✓ Key pair generated in {:?}", started.elapsed()).green()
    );
    println!();

    println!(
        "{}",
        format!("Step 2: {rounds} encapsulate/decapsulate rounds...").yellow()
    );
    let started = Instant::now();
    for round in 1..=rounds {
        let (ciphertext, sent) = kem::encapsulate(keypair.public_key())?;
        let received = kem::decapsulate(&ciphertext, keypair.secret_key())?;
        if sent != received {
            anyhow::bail!("Shared secrets disagree in round {round}");
        }
    }
    println!(
        "{}",
        format!("✓ {rounds} rounds agreed in {:?}", started.elapsed()).green()
    );
    println!();

    println!("{}", "Step 3: Implicit rejection...".yellow());
    let (ciphertext, sent) = kem::encapsulate(keypair.public_key())?;
    let mut tampered = ciphertext.as_bytes().to_vec();
    tampered[0] ^= 0x01;
    let tampered = KemCiphertext::from_bytes(&tampered).context("Tampered ciphertext rejected")?;
    let rejected = kem::decapsulate(&tampered, keypair.secret_key())?;
    if rejected == sent {
        anyhow::bail!("Tampered ciphertext decapsulated to the original secret");
    }
    println!(
        "{}",
        "✓ Tampered ciphertext yields an unrelated secret".green()
    );
    println!();

    println!(
        "{}",
        format!("Step 4: {SIGNATURE_ALGORITHM} sign/verify...").yellow()
    );
    let started = Instant::now();
    let signing = signature::generate_keypair()?;
    let message = b"pqauth self-test";
    let sig = signature::sign(message, signing.secret_key())?;
    if !signature::verify(message, &sig, signing.public_key()) {
        anyhow::bail!("Fresh signature failed verification");
    }
    if signature::verify(b"pqauth self-tesT", &sig, signing.public_key()) {
        anyhow::bail!("Signature verified over a different message");
    }
    println!(
        "{}",
        format!("✓ Signature verified in {:?}", started.elapsed()).green()
    );
    println!();

    println!("{}", "✓ All primitive checks passed".bold().green());
    Ok(())
}
