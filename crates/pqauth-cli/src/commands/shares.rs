/*!
 * Threshold split and combine commands
 */

use anyhow::{Context, Result};
use colored::*;
use pqauth_crypto::{shamir, SecretShare};
use zeroize::Zeroizing;

pub fn split(secret_hex: &str, threshold: u8, total: u8) -> Result<()> {
    let secret = Zeroizing::new(hex::decode(secret_hex.trim()).context("Secret must be hex")?);
    let shares = shamir::split(&secret, threshold, total)
        .map_err(|e| anyhow::anyhow!("Failed to split secret: {}", e))?;

    println!(
        "{}",
        format!("=== {threshold}-of-{total} Secret Shares ===").bold().cyan()
    );
    println!();
    for share in &shares {
        println!("  {} {}", format!("Share {}:", share.x).bold(), share.to_hex().as_str());
    }
    println!();
    println!(
        "{}",
        format!("Any {threshold} shares reconstruct the secret; fewer reveal nothing.").yellow()
    );
    Ok(())
}

pub fn combine(shares_hex: &[String]) -> Result<()> {
    let shares = parse_shares(shares_hex)?;
    let secret = shamir::reconstruct(&shares)
        .map_err(|e| anyhow::anyhow!("Failed to combine shares: {}", e))?;

    println!("{}", "=== Reconstructed Secret ===".bold().cyan());
    println!();
    println!("{}", hex::encode(&secret[..]));
    Ok(())
}

fn parse_shares(shares_hex: &[String]) -> Result<Vec<SecretShare>> {
    shares_hex
        .iter()
        .enumerate()
        .map(|(i, hex_str)| {
            SecretShare::from_hex(hex_str.trim())
                .map_err(|e| anyhow::anyhow!("Invalid share {}: {}", i + 1, e))
        })
        .collect()
}
