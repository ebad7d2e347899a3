//! `ankigen init`: write a default config file.

use std::path::Path;

use ankigen_config::AppConfig;

pub async fn run(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_path();
    let written = write_default(&config_path, force)?;

    if written {
        println!("Created config at: {}", config_path.display());
        println!("\nNext steps:");
        println!("   1. Set provider.api_url and provider.api_key (or ANKIGEN_API_KEY)");
        println!("   2. Set EXA_API_KEY, or switch search.backend to \"google\"");
        println!("   3. Run: ankigen generate \"What is Docker?\"\n");
    } else {
        println!("Config already exists at: {}", config_path.display());
        println!("   Edit it manually or re-run with --force.");
    }
    Ok(())
}

/// Write the default config to `path`. Returns `false` when a file is
/// already there and `force` is off.
pub fn write_default(path: &Path, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}
