//! Quota command handler

use anyhow::{Context, Result};

use atelier_core::ArtworkApi;

use crate::output::Output;

/// Show the current upload quota
pub async fn run(api: &dyn ArtworkApi, output: &Output) -> Result<()> {
    let quota = api
        .check_upload_quota()
        .await
        .context("Failed to fetch upload quota")?;

    output.print_quota(&quota);
    Ok(())
}
