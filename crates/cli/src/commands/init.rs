//! `notebridge init`: write a default config file.

use std::path::Path;

use notebridge_config::AppConfig;

pub async fn run(config_path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if config_path.exists() && !force {
        return Err(format!(
            "{} already exists, pass --force to overwrite",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(config_path, AppConfig::default_toml()).await?;

    println!("Wrote {}", config_path.display());
    println!("Add a [telegram] token and at least one [[backends]] entry, then run `notebridge doctor`.");
    Ok(())
}
