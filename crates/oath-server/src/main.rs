//! OTP validation server binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use oath_core::{CredentialStore, Validator};
use oath_server::config::Config;
use oath_server::credentials::load_credentials;
use oath_server::server::{self, Services};
use oath_server::tls::load_acceptor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let store = match &config.credentials {
        Some(path) => load_credentials(path)?,
        None => {
            warn!("OATH_CREDENTIALS not set; no users are provisioned");
            CredentialStore::new()
        }
    };
    info!(users = store.len(), "credentials loaded");

    let tls = match &config.tls {
        Some(files) => Some(
            load_acceptor(&files.cert, &files.key).context("failed to set up dynalogin TLS")?,
        ),
        None => {
            warn!("no TLS certificate configured; serving dynalogin in plaintext");
            None
        }
    };

    let services = Services {
        validator: Arc::new(Validator::new(Arc::new(store))),
        tls,
        // No GSS mechanism is linked into this binary.
        contexts: None,
    };

    info!(
        max_clients = config.max_clients,
        shutdown_timeout = ?config.shutdown_timeout,
        "starting oath-server"
    );

    server::run(&config, services, async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => {
                error!(error = %e, "unable to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        }
    })
    .await
}
