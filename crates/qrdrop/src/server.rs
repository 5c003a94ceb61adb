//! Service assembly and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use depot::{ArtifactStore, DepotConfig, FileStore, MemoryStore, StoreError};
use dropconf::{DropConfig, StorageKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::links;
use crate::share::ShareService;
use crate::sweeper;
use crate::web;

/// Open the configured artifact store.
pub fn open_store(config: &DropConfig) -> Result<Arc<dyn ArtifactStore>, StoreError> {
    let store: Arc<dyn ArtifactStore> = match config.uploads.storage {
        StorageKind::Disk => Arc::new(FileStore::new(DepotConfig::with_base_path(
            &config.paths.data_dir,
        ))?),
        StorageKind::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

/// Store, base URL and policy wired into a [`ShareService`].
pub fn build_share_service(config: &DropConfig, clock: Arc<dyn Clock>) -> Result<ShareService> {
    let store = open_store(config).context("Failed to open artifact store")?;
    let base_url = links::resolve_base_url(&config.bind).context("Invalid base URL")?;
    Ok(ShareService::from_config(store, clock, base_url, config))
}

/// Serve until `shutdown` is cancelled, then drain connections and stop the sweeper.
pub async fn run(config: DropConfig, clock: Arc<dyn Clock>, shutdown: CancellationToken) -> Result<()> {
    let share = Arc::new(build_share_service(&config, clock)?);

    info!("📦 Storage: {}", share.store().backend());
    if config.uploads.storage == StorageKind::Disk {
        info!("   Data dir: {}", config.paths.data_dir.display());
    }
    info!(
        "   {} artifacts ({} bytes) on hand",
        share.store().count(),
        share.store().total_bytes()
    );
    info!(
        "⏳ TTL {}s, sweeping every {}s",
        config.retention.ttl_secs, config.retention.sweep_interval_secs
    );

    let listener = bind(&config.bind.host, config.bind.port).await?;
    let bind_addr = listener.local_addr().context("Failed to read bound address")?;

    let sweep_cancel = shutdown.child_token();
    let sweeper = sweeper::spawn_sweeper(
        Arc::clone(&share),
        config.retention.sweep_interval(),
        sweep_cancel.clone(),
    );

    let base_url = share.base_url().to_string();
    let app = web::router(web::WebState::new(share, config.retention.sweep_interval()));

    info!("📱 qrdrop listening on http://{}", bind_addr);
    info!("   Share links: {}", base_url);
    info!("   Upload form: GET {}/", base_url);
    info!("   Upload API: POST {}/api/upload", base_url);
    info!("   Health: GET {}/health", base_url);

    let drain = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            drain.cancelled().await;
            info!("Server shutdown signal received");
        })
        .await;

    // The sweeper stops with the server, even when serving failed.
    sweep_cancel.cancel();
    if let Err(e) = sweeper.await {
        warn!(error = %e, "Expiry sweeper ended abnormally");
    }

    served.context("Server error")
}

/// Bind `host:port`, resolving `host` when it is a name rather than an address.
pub async fn bind(host: &str, port: u16) -> Result<tokio::net::TcpListener> {
    let host = host.trim().trim_start_matches('[').trim_end_matches(']');
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve bind host '{host}'"))?
        .collect();
    let Some(first) = addrs.first().copied() else {
        bail!("Bind host '{host}' resolved to no addresses");
    };

    tokio::net::TcpListener::bind(addrs.as_slice())
        .await
        .with_context(|| format!("Failed to bind {first}"))
}

/// Resolve on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to install SIGTERM handler");
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}
