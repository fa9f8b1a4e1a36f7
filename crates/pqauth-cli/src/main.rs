/*!
 * pqauth operator CLI
 *
 * Drives the post-quantum credential pipeline from a terminal:
 * 1. Run the full generate → sign → authenticate → validate → revoke flow in memory
 * 2. Generate ML-KEM-768 or ML-DSA-65 key pairs
 * 3. Split a secret into threshold shares and combine them again
 * 4. Self-test the KEM and signature primitives
 *
 * Usage:
 *   cargo run -p pqauth-cli -- demo
 *   cargo run -p pqauth-cli -- keygen --kind dsa
 *   cargo run -p pqauth-cli -- split <hex-secret> -k 3 -n 5
 *   cargo run -p pqauth-cli -- combine -S <share> -S <share> -S <share>
 *   cargo run -p pqauth-cli -- kem-selftest --rounds 20
 */

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::keys::KeyKind;

#[derive(Parser)]
#[command(name = "pqauth")]
#[command(about = "Operator CLI for post-quantum API credentials")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full credential lifecycle against in-memory storage
    Demo {
        /// Client identifier for the demo credential
        #[arg(short, long, default_value = "demo-client-0001")]
        client_id: String,

        /// Permission to grant (repeatable)
        #[arg(short, long = "permission", default_value = "READ_METRICS")]
        permissions: Vec<String>,

        /// Location reported by the demo device
        #[arg(short, long)]
        location: Option<String>,

        /// Device integrity attestation (PASS or FAIL)
        #[arg(short = 'i', long, default_value = "PASS")]
        device_integrity: String,
    },
    /// Generate a key pair and print it hex encoded
    Keygen {
        /// Algorithm family
        #[arg(short, long, value_enum, default_value_t = KeyKind::Kem)]
        kind: KeyKind,

        /// Also print the secret key
        #[arg(long)]
        reveal_secret: bool,
    },
    /// Split a hex secret into threshold shares
    Split {
        /// Secret to split, hex encoded (at most 64 bytes)
        secret: String,

        /// Shares needed to reconstruct
        #[arg(short = 'k', long, default_value_t = 3)]
        threshold: u8,

        /// Shares to produce
        #[arg(short = 'n', long, default_value_t = 5)]
        shares: u8,
    },
    /// Reconstruct a secret from hex shares
    Combine {
        /// Hex encoded share (repeat once per share)
        #[arg(short = 'S', long = "share", required = true, num_args = 1..)]
        shares: Vec<String>,
    },
    /// Exercise ML-KEM-768 and ML-DSA-65 end to end
    KemSelftest {
        /// Number of encapsulation rounds
        #[arg(short, long, default_value_t = 10)]
        rounds: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pqauth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            client_id,
            permissions,
            location,
            device_integrity,
        } => commands::demo::run(&client_id, permissions, location, &device_integrity).await?,

        Commands::Keygen {
            kind,
            reveal_secret,
        } => commands::keys::keygen(kind, reveal_secret)?,

        Commands::Split {
            secret,
            threshold,
            shares,
        } => commands::shares::split(&secret, threshold, shares)?,

        Commands::Combine { shares } => commands::shares::combine(&shares)?,

        Commands::KemSelftest { rounds } => commands::keys::kem_selftest(rounds)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_combine_shares() {
        let cli = Cli::try_parse_from(["pqauth", "combine", "-S", "aa", "-S", "bb"]).unwrap();
        match cli.command {
            Commands::Combine { shares } => assert_eq!(shares, vec!["aa", "bb"]),
            _ => panic!("expected combine"),
        }
    }

    #[test]
    fn test_split_defaults_to_three_of_five() {
        let cli = Cli::try_parse_from(["pqauth", "split", "00ff"]).unwrap();
        match cli.command {
            Commands::Split {
                threshold, shares, ..
            } => assert_eq!((threshold, shares), (3, 5)),
            _ => panic!("expected split"),
        }
    }

    #[test]
    fn test_keygen_kind() {
        let cli = Cli::try_parse_from(["pqauth", "keygen", "--kind", "dsa"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Keygen {
                kind: KeyKind::Dsa,
                ..
            }
        ));
    }
}
