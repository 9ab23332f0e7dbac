//! # profitboard-server
//!
//! HTTP API for the Profitboard seller leaderboard.
//!
//! This binary provides:
//! - **Submissions**: sellers report revenue and cost (optionally with a
//!   proof image); admins approve, reject or delete them
//! - **Leaderboard**: approved submissions ranked by profit, for the current
//!   month or all time
//! - **User administration**: profile listing and role changes
//! - **Per-IP rate limiting** on every state-changing route
//!
//! Identity is delegated to an external provider and proof images go to an
//! external object store; profiles and submissions live in SQLite.

mod api;
mod auth;
mod config;
mod error;
mod identity;
mod proof_store;
mod rate_limit;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use profitboard_shared::constants::APP_NAME;
use profitboard_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::identity::{DisabledIdentityProvider, HttpIdentityProvider, IdentityProvider};
use crate::proof_store::{DisabledObjectStore, HttpObjectStore, ObjectStore};
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,profitboard_server=debug")),
        )
        .init();

    info!("Starting {} server v{}", APP_NAME, env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.admin_passcode.is_some() {
        tracing::warn!("ADMIN_PASSCODE is set: the admin override header is enabled");
    }

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let identity: Arc<dyn IdentityProvider> = match &config.auth_url {
        Some(url) => Arc::new(HttpIdentityProvider::new(
            http.clone(),
            url,
            config.auth_api_key.clone(),
        )),
        None => {
            tracing::warn!("AUTH_URL not set: every request is anonymous");
            Arc::new(DisabledIdentityProvider)
        }
    };

    let proofs: Arc<dyn ObjectStore> = match &config.storage_url {
        Some(url) => Arc::new(HttpObjectStore::new(
            http.clone(),
            url,
            config.proof_bucket.clone(),
            config.storage_api_key.clone(),
        )),
        None => {
            tracing::warn!("STORAGE_URL not set: proof images will be dropped");
            Arc::new(DisabledObjectStore)
        }
    };

    let rate_limiter = RateLimiter::new(config.rate_limit_per_sec, config.rate_limit_burst);

    let app_state = AppState {
        db: Arc::new(Mutex::new(db)),
        identity,
        proofs,
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.purge_stale(600.0).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
