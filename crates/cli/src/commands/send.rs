//! `notebridge send`: save one note through the local source.

use std::sync::Arc;

use notebridge_channels::LocalSource;
use notebridge_config::AppConfig;
use notebridge_router::select_targets;

use super::bootstrap::start_router;

pub async fn run(config: AppConfig, text: String) -> Result<(), Box<dyn std::error::Error>> {
    let source = Arc::new(LocalSource::new());
    let router = start_router(&config, source.clone())?;

    let targets: Vec<&str> = select_targets(&text, router.registrations())
        .iter()
        .map(|r| r.backend.name())
        .collect();
    if targets.is_empty() {
        println!("No backend matched, note not saved");
        return Ok(());
    }

    source.submit(text).await?;
    println!("Saved to: {}", targets.join(", "));
    Ok(())
}
