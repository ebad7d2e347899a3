//! `ankigen config`: show the effective configuration.

use ankigen_config::AppConfig;

const REDACTED: &str = "***";

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&redacted(config))?;
    println!("# {}", AppConfig::config_path().display());
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

/// Replace every configured secret with a placeholder.
fn redacted(mut config: AppConfig) -> AppConfig {
    for secret in [
        &mut config.provider.api_key,
        &mut config.search.exa_api_key,
        &mut config.search.google_api_key,
        &mut config.embedding.api_key,
    ] {
        if secret.is_some() {
            *secret = Some(REDACTED.to_string());
        }
    }
    config
}
