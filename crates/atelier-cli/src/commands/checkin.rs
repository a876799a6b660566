//! Check-in command handler

use anyhow::{Context, Result};
use chrono::Local;

use atelier_core::SyncEngine;

use crate::output::Output;

/// Record today's check-in
pub async fn run(engine: &SyncEngine, output: &Output) -> Result<()> {
    let today = Local::now().date_naive();

    if engine.last_checkin() == Some(today) {
        output.message("Already checked in today.");
        return Ok(());
    }

    engine
        .check_in(today)
        .await
        .context("Failed to record check-in")?;

    output.success(&format!("Checked in for {}", today));
    Ok(())
}
