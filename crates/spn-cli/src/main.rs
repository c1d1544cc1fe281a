//! # spn CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use clap::Parser;

/// Storage-provider node operator toolchain.
#[derive(Parser, Debug)]
#[command(name = "spn", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Generate a new signing seed.
    Keygen(spn_cli::keys::KeygenArgs),
    /// Derive the operator address of a signing seed.
    Address(spn_cli::keys::AddressArgs),
    /// Compute segment and piece sizes for an object.
    PieceSize(spn_cli::piece::PieceSizeArgs),
    /// Build the deterministic key of a task.
    TaskKey(spn_cli::task::TaskKeyArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, "dispatching");

    let output = match cli.command {
        Commands::Keygen(args) => spn_cli::keys::run_keygen(&args)?,
        Commands::Address(args) => spn_cli::keys::run_address(&args)?,
        Commands::PieceSize(args) => spn_cli::piece::run_piece_size(&args)?,
        Commands::TaskKey(args) => spn_cli::task::run_task_key(&args)?,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
