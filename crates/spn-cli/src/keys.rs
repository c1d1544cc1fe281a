//! # Key Subcommands
//!
//! `keygen` prints a fresh 32-byte seed suitable for `SPN_SIGNING_KEY`;
//! `address` re-derives the public identity of a seed.

use anyhow::Context;
use clap::Args;
use rand::RngCore;
use serde_json::{json, Value};
use spn_crypto::{operator_address_for, Ed25519KeyPair};

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Also print the seed. Without this flag only the public half is shown
    /// and the seed goes to stderr.
    #[arg(long)]
    pub show_seed: bool,
}

#[derive(Args, Debug)]
pub struct AddressArgs {
    /// Hex-encoded 32-byte Ed25519 seed.
    #[arg(long)]
    pub seed: String,
}

fn identity_json(keypair: &Ed25519KeyPair) -> Value {
    let public_key = keypair.public_key();
    json!({
        "operator_address": operator_address_for(&public_key).as_str(),
        "public_key": public_key.to_hex(),
    })
}

pub fn run_keygen(args: &KeygenArgs) -> anyhow::Result<Value> {
    let mut seed = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut seed);
    let seed_hex = hex::encode(seed);
    let keypair = Ed25519KeyPair::from_seed(&seed);

    let mut out = identity_json(&keypair);
    if args.show_seed {
        out["seed"] = Value::String(seed_hex);
    } else {
        eprintln!("seed: {seed_hex}");
    }
    Ok(out)
}

pub fn run_address(args: &AddressArgs) -> anyhow::Result<Value> {
    let keypair = Ed25519KeyPair::from_seed_hex(&args.seed).context("parsing signing seed")?;
    Ok(identity_json(&keypair))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_seed_reproduces_its_address() {
        let generated = run_keygen(&KeygenArgs { show_seed: true }).unwrap();
        let seed = generated["seed"].as_str().unwrap().to_string();
        assert_eq!(seed.len(), 64);

        let derived = run_address(&AddressArgs { seed }).unwrap();
        assert_eq!(derived["operator_address"], generated["operator_address"]);
        assert_eq!(derived["public_key"], generated["public_key"]);
    }

    #[test]
    fn seed_is_hidden_by_default() {
        let generated = run_keygen(&KeygenArgs { show_seed: false }).unwrap();
        assert!(generated.get("seed").is_none());
    }

    #[test]
    fn address_rejects_bad_seed() {
        assert!(run_address(&AddressArgs { seed: "xyz".into() }).is_err());
    }

    #[test]
    fn address_is_stable() {
        let seed = hex::encode([4u8; 32]);
        let a = run_address(&AddressArgs { seed: seed.clone() }).unwrap();
        let b = run_address(&AddressArgs { seed }).unwrap();
        assert_eq!(a, b);
        assert!(a["operator_address"].as_str().unwrap().starts_with("0x"));
    }
}
