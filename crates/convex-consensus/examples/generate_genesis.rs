//! Generate a genesis configuration for a local devnet.
//!
//! Peers use deterministic keys from `Keypair::from_seed(0..n)`, so local
//! tooling can recreate the matching keypairs.
//!
//! Usage:
//!   cargo run --example generate_genesis -- [peer-count] > genesis.json

use convex_consensus::generate_devnet_genesis;

fn main() -> anyhow::Result<()> {
    let peers = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 4,
    };

    // Fixed timestamp for reproducibility
    let genesis = generate_devnet_genesis(peers, 1_703_116_800_000);
    genesis.validate()?;

    println!("{}", serde_json::to_string_pretty(&genesis)?);
    Ok(())
}
