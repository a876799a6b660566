//! Artwork mirror persistence
//!
//! Stores the last reconciled artwork list between sessions so the UI
//! can paint immediately while the first refresh is in flight.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::models::ArtworkRecord;

/// Durable side-store for client-side state
///
/// One file per key: `artworks.json` for the mirror, `last_checkin`
/// for the check-in date. Missing files read as empty state.
#[derive(Debug, Clone)]
pub struct SideStore {
    dir: PathBuf,
}

impl SideStore {
    /// Create a side-store rooted at `dir`
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn artworks_path(&self) -> PathBuf {
        self.dir.join("artworks.json")
    }

    fn checkin_path(&self) -> PathBuf {
        self.dir.join("last_checkin")
    }

    /// Replace the mirrored artwork list
    pub fn save_artworks(&self, records: &[ArtworkRecord]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory: {:?}", self.dir))?;

        let json = serde_json::to_string(records).context("Failed to serialize artwork mirror")?;
        fs::write(self.artworks_path(), json).context("Failed to write artwork mirror")?;
        Ok(())
    }

    /// Load the mirrored artwork list (empty if never written)
    pub fn load_artworks(&self) -> Result<Vec<ArtworkRecord>> {
        let path = self.artworks_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let json = fs::read_to_string(&path).context("Failed to read artwork mirror")?;
        serde_json::from_str(&json).context("Failed to parse artwork mirror")
    }

    /// Record the last check-in date
    pub fn set_last_checkin(&self, date: NaiveDate) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data directory: {:?}", self.dir))?;
        fs::write(self.checkin_path(), date.to_string()).context("Failed to write check-in date")?;
        Ok(())
    }

    /// Read the last check-in date, if any was recorded
    pub fn last_checkin(&self) -> Option<NaiveDate> {
        let content = fs::read_to_string(self.checkin_path()).ok()?;
        content.trim().parse().ok()
    }

    /// Remove all durable state (forced logout teardown)
    pub fn clear(&self) -> Result<()> {
        for path in [self.artworks_path(), self.checkin_path()] {
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {:?}", path))?;
            }
        }
        Ok(())
    }
}
