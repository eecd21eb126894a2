//! `notebridge doctor`: diagnose configuration problems.

use std::path::Path;

use notebridge_config::{AppConfig, BackendConfig, ConfigError};

pub async fn run(
    config_path: &Path,
    loaded: Result<AppConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("notebridge doctor");
    println!("=================\n");

    if !config_path.exists() {
        println!("  ⚠️  No config file at {}, run `notebridge init`", config_path.display());
    }

    let config = match loaded {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    let findings = diagnose(&config);
    for finding in &findings {
        println!("  {finding}");
    }

    let issues = findings.iter().filter(|f| !f.starts_with('✅')).count();
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }
    Ok(())
}

/// One line per check; passing checks start with ✅.
pub fn diagnose(config: &AppConfig) -> Vec<String> {
    let mut out = Vec::new();

    if config.has_telegram() {
        out.push("✅ Telegram token configured".to_string());
        if config.telegram.allowed_users.is_empty() {
            out.push("⚠️  telegram.allowed_users is empty, every user will be rejected".to_string());
        } else {
            out.push("✅ Telegram allowlist set".to_string());
        }
    } else if !config.gateway.enabled {
        out.push("❌ Neither telegram.token nor the gateway is configured".to_string());
    }

    if config.gateway.enabled && config.alice.user_id.is_none() {
        out.push("⚠️  Gateway enabled but alice.user_id is unset, Alice requests will be rejected".to_string());
    }

    if config.backends.is_empty() {
        out.push("❌ No backends configured".to_string());
    } else {
        out.push(format!("✅ {} backend(s) configured", config.backends.len()));
    }

    for backend in &config.backends {
        let no_delete = matches!(backend, BackendConfig::Teamly(_) | BackendConfig::Yonote(_));
        if no_delete && backend.delete_done_notes() {
            out.push(format!(
                "⚠️  {}: delete_done_notes is set but {} cannot delete notes",
                backend.label(),
                backend.app()
            ));
        }
    }

    if config.data_dir.exists() {
        out.push("✅ Data directory exists".to_string());
    } else {
        out.push(format!(
            "⚠️  Data directory {} does not exist yet",
            config.data_dir.display()
        ));
    }

    out
}
