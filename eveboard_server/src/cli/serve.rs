use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::Args;
use eveboard_app::{AppRuntime, SyncConfig};
use eveboard_server::http;
use log::{info, warn};
use tokio::sync::watch;

use crate::cli::common::{StorageArgs, build_esi_client, load_esi_config};

#[derive(Debug, Args)]
pub(crate) struct ServeCommand {
    #[command(flatten)]
    storage: StorageArgs,

    /// Address the HTTP API binds to.
    #[arg(long, env = "EVEBOARD_LISTEN", default_value = "127.0.0.1:8000")]
    listen: SocketAddr,

    /// Number of concurrent sync workers.
    #[arg(long, default_value_t = 4)]
    workers: usize,
}

impl ServeCommand {
    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        let esi_config = load_esi_config()?;
        let client = build_esi_client(&esi_config)?;
        let sde = Arc::new(self.storage.load_sde().await?);
        info!(
            "loaded SDE index with {} types and {} groups",
            sde.type_count(),
            sde.group_count()
        );

        let database = self.storage.open_database().await?;
        let token_cipher = self.storage.token_cipher()?;
        let sync_config = SyncConfig {
            workers: self.workers.max(1),
            ..SyncConfig::default()
        };
        let runtime = AppRuntime::from_database(
            &database,
            token_cipher,
            client.clone(),
            client,
            sde,
            esi_config.scopes.clone(),
            sync_config,
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let workers = tokio::spawn({
            let runtime = runtime.clone();
            async move { runtime.run_workers_until_shutdown(shutdown_rx).await }
        });

        let listener = tokio::net::TcpListener::bind(self.listen)
            .await
            .with_context(|| format!("failed to bind {}", self.listen))?;
        info!("listening on http://{}", self.listen);

        let served = axum::serve(listener, http::router(runtime))
            .with_graceful_shutdown(async move {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!("failed to listen for ctrl-c: {err}");
                }
                info!("shutdown requested; draining sync workers");
                let _ = shutdown_tx.send(true);
            })
            .await
            .context("http server failed");

        workers.await.context("sync worker pool panicked")?;
        served
    }
}
