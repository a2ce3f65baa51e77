//! Donations Server
//!
//! HTTP service recording donation pledges and issuing SBP transfer
//! references.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use donations_core::config::{CliOverrides, apply_cli_overrides, load_config};
use donations_core::tracing_init::init_tracing;
use donations_core::{PaymentReferenceFormatter, StatusPolicy};
use donations_server::envelope::Dispatcher;
use donations_server::registry::DonationRegistry;
use donations_server::routes::build_router;
use donations_server::storage::DonationDatabase;

#[derive(Parser, Debug)]
#[command(name = "donations-server")]
#[command(version, about = "Donations server - pledge registry and SBP payment references")]
struct Args {
    /// Address to listen on (overrides config).
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Path to SQLite database file (overrides config and
    /// `DONATIONS_DATABASE_PATH` / `DATABASE_PATH`). Without one, donation
    /// requests fail with "Database not configured".
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JSON config file layered over the global settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Status update policy: `open` or `guarded`.
    #[arg(long)]
    status_policy: Option<StatusPolicy>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            addr: self.addr.as_ref().map(ToString::to_string),
            database_path: self.db_path.clone(),
            status_policy: self.status_policy,
            log_json: self.log_json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    apply_cli_overrides(&mut config, args.overrides());

    init_tracing("donations_server=info", config.server.log_json)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.server.addr,
        policy = ?config.registry.status_policy,
        "Starting donations-server"
    );

    let registry = match &config.server.database_path {
        Some(path) => {
            info!(path = %path.display(), "Opening donations database");
            let db = DonationDatabase::open(path).await?;
            Some(DonationRegistry::new(
                Arc::new(db),
                config.registry.status_policy,
            ))
        }
        None => {
            warn!("No database path configured; donation requests will fail");
            None
        }
    };

    let dispatcher = Dispatcher::new(
        registry,
        PaymentReferenceFormatter::new(config.payment.clone()),
    );
    let app = build_router(dispatcher);

    let listener = tokio::net::TcpListener::bind(&config.server.addr).await?;
    info!(addr = %config.server.addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await?;

    info!("Server stopped");
    Ok(())
}
