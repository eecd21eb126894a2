//! `notebridge notes`: print pending notes of every backend.

use std::sync::Arc;

use notebridge_channels::LocalSource;
use notebridge_config::AppConfig;

use super::bootstrap::start_router;

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let source = Arc::new(LocalSource::new());
    let _router = start_router(&config, source.clone())?;

    let report = source.request_list().await?;
    if report.is_empty() {
        println!("No backends configured");
    } else {
        println!("{report}");
    }
    Ok(())
}
