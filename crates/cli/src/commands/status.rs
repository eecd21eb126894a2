//! `notebridge status`: show the configuration summary.

use std::path::Path;

use notebridge_config::AppConfig;

pub async fn run(config_path: &Path, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("notebridge status");
    println!("=================");
    println!("  Config file:  {}", config_path.display());
    println!("  Data dir:     {}", config.data_dir.display());
    println!("  Log level:    {}", config.log_level);
    println!(
        "  Telegram:     {}",
        if config.has_telegram() { "configured" } else { "not configured" }
    );
    println!("  Allowed:      {}", allowed_summary(&config.telegram.allowed_users));
    println!(
        "  Gateway:      {}",
        if config.gateway.enabled {
            format!("{}:{}", config.gateway.host, config.gateway.port)
        } else {
            "disabled".to_string()
        }
    );
    println!(
        "  Transcribe:   {}",
        config
            .transcription
            .as_ref()
            .map(|t| t.model.as_str())
            .unwrap_or("disabled")
    );
    println!("  Cleanup:      every {}s", config.cleanup.interval_secs);

    println!("\n  Backends ({}):", config.backends.len());
    for backend in &config.backends {
        let words = backend.start_words();
        println!(
            "    - {} [{}] cleanup={} start_words={}",
            backend.label(),
            backend.app(),
            backend.delete_done_notes(),
            if words.is_empty() { "*".to_string() } else { words.join(",") }
        );
    }

    if !config_path.exists() {
        println!("\n  No config file, run `notebridge init` first");
    }

    Ok(())
}

fn allowed_summary(users: &[String]) -> String {
    if users.iter().any(|u| u == "*") {
        "everyone".to_string()
    } else if users.is_empty() {
        "nobody".to_string()
    } else {
        format!("{} user(s)", users.len())
    }
}
