//! Entry point for the peer-to-peer storage overlay node.
//!
//! Grounded on the teacher's `main.rs` startup sequence (logging, CLI
//! parsing, network/actor construction, run-until-interrupted), trimmed down
//! to the three subcommands this node actually exposes.

use std::sync::Arc;

use clap::Parser;
use libp2p::identity::Keypair;
use tracing::info;

use dsn::cli::{Cli, Commands};
use dsn::config::{self, Config};
use dsn::connectivity::ConnectivityHandle;
use dsn::error::DfsResult;
use dsn::persistence::SqliteSink;
use dsn::streams::Framework;
use dsn::{bootstrap_store, handlers, identity, logging, metrics};

#[tokio::main]
async fn main() {
    logging::init_logging_safe();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> DfsResult<()> {
    let mut config = Config::from_env()?;
    config.apply_overrides(cli.port, cli.namespace.clone(), cli.data_dir.clone());
    config.validate()?;
    config::ensure_data_dir(&config.data_dir)?;

    match cli.command {
        Commands::Init => {
            let keypair = identity::load_or_create(&config.id_file_path())?;
            bootstrap_store::ensure_exists(&config.bootstrap_file_path())?;
            info!(
                "initialized node {} under {}",
                libp2p::PeerId::from(keypair.public()),
                config.data_dir.display()
            );
            Ok(())
        }
        Commands::Run => {
            let keypair = identity::load_or_create(&config.id_file_path())?;
            start_node(config, keypair).await
        }
        Commands::Test { seed } => {
            let keypair = identity::from_seed(&seed)?;
            info!("starting test node with deterministic identity from seed {seed}");
            start_node(config, keypair).await
        }
    }
}

async fn start_node(config: Config, keypair: Keypair) -> DfsResult<()> {
    let config = Arc::new(config);
    let connectivity = ConnectivityHandle::spawn(config.clone(), keypair).await?;

    info!("node started, peer id {}", connectivity.local_peer_id);

    own_multiaddr_into_bootstrap(&config, &connectivity)?;

    let sink = Arc::new(SqliteSink::open(&config.data_dir.join("dsn.db"))?);

    let mut framework = Framework::new(connectivity.control.clone());
    framework.register(Arc::new(handlers::PrintHandler))?;
    framework.register(Arc::new(handlers::StoreHandler::new(sink)))?;
    framework.register(Arc::new(handlers::UploadHandler::new(connectivity.clone())))?;

    tokio::spawn(metrics::serve(connectivity.clone(), config.metrics_port));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| dsn::error::DfsError::Io(e.to_string()))?;
    info!("shutdown signal received");
    connectivity.stop();
    Ok(())
}

fn own_multiaddr_into_bootstrap(
    config: &Config,
    connectivity: &ConnectivityHandle,
) -> DfsResult<()> {
    bootstrap_store::ensure_exists(&config.bootstrap_file_path())?;
    let own_addr = if config.has_announce_addresses() {
        format!(
            "{}/p2p/{}",
            config.announce_addresses[0], connectivity.local_peer_id
        )
    } else {
        format!(
            "/ip4/127.0.0.1/tcp/{}/p2p/{}",
            config.port, connectivity.local_peer_id
        )
    };
    bootstrap_store::append_self(&config.bootstrap_file_path(), &own_addr)
}
