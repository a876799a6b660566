//! Edit command handler

use anyhow::{bail, Context, Result};

use atelier_core::{ArtworkPatch, SyncEngine};

use crate::output::Output;

/// Arguments collected from the command line
#[derive(Default)]
pub struct EditArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub mood: Option<String>,
    pub rating: Option<u8>,
    pub duration: Option<u32>,
}

/// Edit an existing artwork
pub async fn run(engine: &SyncEngine, output: &Output, id: i64, args: EditArgs) -> Result<()> {
    if let Some(rating) = args.rating {
        if !(1..=5).contains(&rating) {
            bail!("Rating must be between 1 and 5");
        }
    }

    let patch = ArtworkPatch {
        title: args.title,
        description: args.description,
        tags: args.tags,
        mood: args.mood,
        rating: args.rating,
        duration_minutes: args.duration,
        ..Default::default()
    };

    if patch.is_empty() {
        bail!("Nothing to change. Pass at least one of --title, --description, --tag, --mood, --rating, --duration.");
    }

    let record = engine
        .update(id, patch)
        .await
        .with_context(|| format!("Failed to update artwork {}", id))?;

    output.success(&format!("Updated artwork {}", record.id));
    if !output.is_quiet() {
        output.print_artwork(&record);
    }
    Ok(())
}
