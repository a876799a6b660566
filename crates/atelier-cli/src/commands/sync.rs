//! Sync command handler

use anyhow::{Context, Result};

use atelier_core::SyncEngine;

use crate::output::Output;

/// Force a reconciliation with the server
pub async fn run(engine: &SyncEngine, output: &Output) -> Result<()> {
    output.message("Refreshing gallery from server...");

    engine
        .refresh(true)
        .await
        .context("Sync failed; the local gallery was left as-is")?;

    let count = engine.artwork_count().await;
    output.success(&format!("Sync complete - {} artworks", count));
    Ok(())
}
