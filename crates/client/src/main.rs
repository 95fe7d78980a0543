//! `swapdeck-client` -- headless batch run against a SwapDeck server.
//!
//! Signs in, loads a face reference and a directory of targets, runs every
//! target through the queue, then downloads the results. See
//! [`ClientConfig::from_env`] for the environment variables.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swapdeck_client::api::ApiClient;
use swapdeck_client::blob::{load_dir, ImageBlob};
use swapdeck_client::config::ClientConfig;
use swapdeck_client::download::Downloader;
use swapdeck_client::engine::{QueueEngine, QueueEvent};
use swapdeck_client::session::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swapdeck_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env()?;
    tracing::info!(
        server = %config.server_url,
        variations = config.variations,
        dimensions = %config.dimensions,
        "Starting swapdeck-client",
    );

    // --- Sign in ---
    let api = ApiClient::with_timeout(&config.server_url, config.timeout);
    let reply = api
        .login(&config.username, &config.password)
        .await
        .context("Login failed")?;
    let session = Arc::new(SessionStore::new());
    session.sign_in(reply.username, reply.api_key).await;

    // --- Workspace ---
    let engine = QueueEngine::new(Arc::clone(&session), Arc::new(api));
    engine
        .set_face_reference(ImageBlob::from_path(&config.face_reference).await?)
        .await?;
    engine.set_dimensions(config.dimensions).await;
    engine.add_targets(load_dir(&config.targets_dir).await?).await;
    engine.create_queue(config.variations).await?;

    // --- Progress log ---
    let mut events = engine.subscribe();
    let progress = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(QueueEvent::VariationRecorded {
                    id,
                    completed,
                    total,
                    success,
                }) => tracing::info!(%id, completed, total, success, "Variation recorded"),
                Ok(QueueEvent::ItemFinished {
                    id,
                    succeeded,
                    failed,
                }) => tracing::info!(%id, succeeded, failed, "Item finished"),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Progress log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // --- Run ---
    for handle in engine.process_all_remaining().await? {
        handle.await.context("Queue task panicked")?;
    }

    // --- Download ---
    let downloader = Downloader::new(reqwest::Client::new());
    for item in engine.items().await {
        let report = downloader.download_item(&item, &config.output_dir).await?;
        tracing::info!(
            item = %item.target.name,
            saved = report.saved.len(),
            failed = report.failed.len(),
            "Downloaded results",
        );
    }

    let stats = engine.stats().await;
    tracing::info!(
        total = stats.total,
        complete = stats.complete,
        failed_variations = stats.failed_variations,
        "Batch finished",
    );

    drop(engine);
    let _ = progress.await;
    Ok(())
}
