use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize the structured logging system for the node.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            EnvFilter::new("dsn=debug,libp2p=info")
        } else {
            EnvFilter::new("dsn=info,libp2p=warn")
        }
    });

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)?;

    info!("logging initialized");
    Ok(())
}

/// Initialize logging, falling back to eprintln if the subscriber can't be installed.
pub fn init_logging_safe() {
    if let Err(e) = init_logging() {
        eprintln!("warning: failed to set up structured logging: {e}, continuing with defaults");
    }
}

pub fn log_network_event(event: &str, details: &str) {
    info!(target: "dsn::network", "{}: {}", event, details);
}

pub fn log_dispersal_event(operation: &str, hash: &str, details: &str) {
    info!(target: "dsn::dispersal", "{} {}: {}", operation, hash, details);
}

pub fn log_error_with_context(context: &str, error: &dyn std::error::Error) {
    error!(target: "dsn::error", "{}: {}", context, error);
}
