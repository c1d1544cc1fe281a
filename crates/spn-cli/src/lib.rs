//! # spn-cli: Storage-Provider Operator CLI
//!
//! ## Subcommands
//!
//! - `keygen`: new Ed25519 signing seed with its operator address
//! - `address`: operator address and public key of an existing seed
//! - `piece-size`: segment and piece sizes of an object layout
//! - `task-key`: deterministic task keys, for grepping logs
//!
//! ## Crate Policy
//!
//! - Argument parsing lives in the `*Args` types; `run_*` functions return
//!   the JSON document to print and never touch stdout themselves.
//! - Sizing and key derivation delegate to `spn-core` and `spn-task`.

pub mod keys;
pub mod piece;
pub mod task;
