//! Upload command handler

use std::io::Read;

use anyhow::{bail, Context, Result};

use atelier_core::{NewArtwork, SyncEngine, SyncError};

use crate::output::Output;

/// Arguments collected from the command line
pub struct UploadArgs {
    pub title: String,
    pub image: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub mood: Option<String>,
    pub rating: Option<u8>,
    pub duration: Option<u32>,
    pub series: Option<String>,
    pub series_id: Option<String>,
    pub part: Option<u32>,
}

/// Upload a new artwork
pub async fn run(engine: &SyncEngine, output: &Output, args: UploadArgs) -> Result<()> {
    if let Some(rating) = args.rating {
        if !(1..=5).contains(&rating) {
            bail!("Rating must be between 1 and 5");
        }
    }

    let mut payload = NewArtwork::new(&args.title, &args.image);
    payload.description = resolve_description(args.description)?;
    for tag in args.tags {
        payload.add_tag(tag);
    }
    payload.mood = args.mood;
    payload.rating = args.rating;
    payload.duration_minutes = args.duration;

    if let Some(series) = args.series {
        // parts of one series passed on later invocations should reuse
        // the printed series id via --series-id
        let id = args
            .series_id
            .unwrap_or_else(NewArtwork::new_collection_id);
        payload.set_collection(id, series, args.part.unwrap_or(0));
    } else if args.series_id.is_some() || args.part.is_some() {
        bail!("--series-id and --part require --series");
    }

    let record = match engine.create(payload).await {
        Ok(record) => record,
        Err(SyncError::QuotaExceeded { used, max }) => {
            bail!("Upload limit reached ({}/{}). Try again next month.", used, max);
        }
        Err(SyncError::UploadInProgress) => {
            bail!("Another upload is still in progress");
        }
        Err(e) => return Err(e).context("Upload failed"),
    };

    output.success(&format!("Uploaded artwork {}", record.id));
    if !output.is_quiet() {
        output.print_artwork(&record);
    }
    Ok(())
}

/// Use the --description flag, falling back to piped stdin
fn resolve_description(description: Option<String>) -> Result<Option<String>> {
    if description.is_some() {
        return Ok(description);
    }
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read description from stdin")?;
    let trimmed = buffer.trim();
    Ok(if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    })
}
