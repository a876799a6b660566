//! List command handler

use anyhow::{Context, Result};

use atelier_core::SyncEngine;

use crate::output::Output;

/// List artworks, newest first
pub async fn run(
    engine: &SyncEngine,
    output: &Output,
    cached: bool,
    tag: Option<String>,
) -> Result<()> {
    if cached {
        // paint from the durable mirror without touching the network
        engine.hydrate().await;
    } else {
        engine
            .refresh(true)
            .await
            .context("Failed to refresh artworks from server")?;
    }

    let mut artworks = engine.artworks().await;
    if let Some(ref tag) = tag {
        artworks.retain(|r| r.tags.iter().any(|t| t == tag));
    }

    output.print_artwork_list(&artworks);
    Ok(())
}
