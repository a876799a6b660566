//! Status command handler

use anyhow::Result;

use atelier_core::{Config, SyncEngine};

use crate::output::{Output, OutputFormat};

/// Show status information
pub async fn run(config: &Config, engine: &SyncEngine, output: &Output) -> Result<()> {
    // count what is durably mirrored without touching the network
    engine.hydrate().await;
    let cached = engine.artwork_count().await;
    let last_checkin = engine.last_checkin();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "api_url": config.api_url,
                    "data_dir": config.data_dir,
                    "signed_in": config.token.is_some(),
                    "cached_artworks": cached,
                    "last_checkin": last_checkin.map(|d| d.to_string()),
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", cached);
        }
        OutputFormat::Human => {
            println!("Atelier Status");
            println!("==============");
            println!();
            println!("Server:");
            println!("  URL:       {}", config.api_url);
            println!(
                "  Signed in: {}",
                if config.token.is_some() { "yes" } else { "no (set ATELIER_TOKEN)" }
            );
            println!();
            println!("Local:");
            println!("  Data dir:         {}", config.data_dir.display());
            println!("  Mirrored records: {}", cached);
            match last_checkin {
                Some(date) => println!("  Last check-in:    {}", date),
                None => println!("  Last check-in:    never"),
            }
        }
    }

    Ok(())
}
