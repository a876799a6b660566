//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use atelier_core::{ArtworkRecord, UploadQuota};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print an informational message (suppressed in quiet/JSON mode)
    pub fn message(&self, text: &str) {
        if matches!(self.format, OutputFormat::Human) {
            println!("{}", text);
        }
    }

    /// Print a success message
    pub fn success(&self, text: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", text),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "ok": true, "message": text }));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a single artwork in full
    pub fn print_artwork(&self, record: &ArtworkRecord) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", record.id);
                println!("Title:     {}", record.title);
                if let Some(ref desc) = record.description {
                    println!("About:     {}", desc);
                }
                println!("Image:     {}", record.image_src);
                println!("Uploaded:  {}", record.uploaded_at.format("%Y-%m-%d %H:%M"));
                if !record.tags.is_empty() {
                    println!("Tags:      {}", record.tags.join(", "));
                }
                if let Some(ref mood) = record.mood {
                    println!("Mood:      {}", mood);
                }
                if let Some(rating) = record.rating {
                    println!("Rating:    {}/5", rating);
                }
                if let Some(minutes) = record.duration_minutes {
                    println!("Duration:  {} min", minutes);
                }
                if let Some(ref name) = record.collection_name {
                    let index = record
                        .collection_index
                        .map(|i| format!(" (part {})", i + 1))
                        .unwrap_or_default();
                    println!("Series:    {}{}", name, index);
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(record).unwrap_or_default());
            }
            OutputFormat::Quiet => {
                println!("{}", record.id);
            }
        }
    }

    /// Print one line per artwork
    pub fn print_artwork_list(&self, records: &[ArtworkRecord]) {
        match self.format {
            OutputFormat::Human => {
                if records.is_empty() {
                    println!("No artworks yet.");
                    return;
                }
                for record in records {
                    let tags = if record.tags.is_empty() {
                        String::new()
                    } else {
                        format!("  [{}]", record.tags.join(", "))
                    };
                    println!(
                        "{:>6}  {}  {}{}",
                        record.id,
                        record.uploaded_at.format("%Y-%m-%d"),
                        record.title,
                        tags
                    );
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(records).unwrap_or_default()
                );
            }
            OutputFormat::Quiet => {
                for record in records {
                    println!("{}", record.id);
                }
            }
        }
    }

    /// Print the upload quota summary
    pub fn print_quota(&self, quota: &UploadQuota) {
        match self.format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "canUpload": quota.can_upload,
                        "used": quota.used,
                        "max": quota.max
                    })
                );
            }
            OutputFormat::Quiet => {
                println!("{}/{}", quota.used, quota.max);
            }
            OutputFormat::Human => {
                println!("Uploads used: {}/{}", quota.used, quota.max);
                if quota.can_upload {
                    println!("You can upload.");
                } else {
                    println!("Upload limit reached.");
                }
            }
        }
    }
}
