//! Delete command handler

use anyhow::{bail, Context, Result};

use atelier_core::{SyncEngine, SyncError};

use crate::output::Output;

/// Delete an artwork
pub async fn run(engine: &SyncEngine, output: &Output, id: i64) -> Result<()> {
    match engine.delete(id).await {
        // a 404 is folded into success by the engine: the record is
        // gone either way
        Ok(()) => {
            output.success(&format!("Deleted artwork {}", id));
            Ok(())
        }
        Err(e) if e.is_auth() => {
            bail!("You are not allowed to delete artwork {}. The artwork is unchanged.", id);
        }
        Err(e) if e.is_transient() => {
            bail!(
                "Artwork {} was not deleted ({}). It is still on the server; try again.",
                id,
                e
            );
        }
        Err(e) => Err(e).with_context(|| format!("Failed to delete artwork {}", id)),
    }
}
