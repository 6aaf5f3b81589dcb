//! Command-line surface: `init`, `run`, and `test <seed>`.
//!
//! Grounded on the teacher's `cli.rs` (`clap`-derived `Cli`/`Commands`),
//! replaced with the three subcommands the original's `cmd/` package exposes.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dsn", about = "Peer-to-peer storage overlay node", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override DSN_PORT for this invocation.
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Override DSN_NAMESPACE for this invocation.
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Override DSN_DATA_DIR for this invocation.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a fresh node identity and an empty bootstrap file under the
    /// configured data directory, then exit.
    Init,

    /// Start the node: load or create identity, join the network, and serve
    /// the configured protocols until interrupted.
    Run,

    /// Start a node with a deterministic identity derived from `seed`, for
    /// reproducible local test networks.
    Test {
        /// Seed string; the node's Ed25519 key is derived from its SHA-256 digest.
        seed: String,
    },
}
