use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod stores;
#[cfg(test)]
mod test_support;

use app_state::AppState;
use config::RunMode;
use stores::{
    local_blob_store::LocalBlobStore, metadata_store::MetadataStore,
    sqlite_metadata_store::SqliteMetadataStore, url_signer::UrlSigner,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting photo-gallery with config: {:?}", cfg);
    if cfg.signing_key_generated {
        tracing::warn!("No signing key configured; signed URLs will not survive a restart");
    }

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let connect_options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("parsing database url `{}`", db_url))?
        .create_if_missing(true);
    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?,
    );

    // --- Initialize stores ---
    let metadata = Arc::new(SqliteMetadataStore::new(db, &cfg.table)?);
    metadata.migrate().await?;

    // --- Handle migration mode ---
    if mode == RunMode::Migrate {
        tracing::info!("Database migration complete for table {}.", metadata.table());
        return Ok(()); // exit after migration
    }

    let signer = UrlSigner::new(cfg.signing_key.as_bytes(), cfg.public_base_url.clone())
        .map_err(|_| anyhow::anyhow!("signing key rejected by HMAC"))?;
    let blobs = Arc::new(LocalBlobStore::new(&cfg.storage_dir, &cfg.bucket, signer));
    tokio::fs::create_dir_all(blobs.bucket_root()).await?;
    tracing::info!("Blob bucket at {}", blobs.bucket_root().display());

    let state = AppState::new(&cfg, blobs, metadata);

    // --- Handle reconcile mode ---
    if mode == RunMode::Reconcile {
        let report = state.reconciler(&cfg).run().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    // --- Build router ---
    let app = routes::routes::app(state, &cfg);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
