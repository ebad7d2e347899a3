//! `ankigen doctor`: check that the configured services answer.

use ankigen_config::{AppConfig, SearchBackend};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("ankigen doctor");
    println!("==============\n");

    let mut issues = 0;

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ok    config loaded ({})", AppConfig::config_path().display());
            config
        }
        Err(e) => {
            println!("  FAIL  config: {e}");
            return Err(e.into());
        }
    };

    let collaborators = ankigen_providers::build_from_config(&config);

    match collaborators.provider.list_models().await {
        Ok(models) if models.is_empty() => {
            println!("  warn  {} reachable but lists no models", config.provider.api_url);
            issues += 1;
        }
        Ok(models) => {
            println!("  ok    {} serves {} model(s)", config.provider.api_url, models.len());
            match ankigen_providers::resolve_model(collaborators.provider.as_ref(), &config.provider.model).await {
                Ok(model) => println!("  ok    primary model: {model}"),
                Err(e) => {
                    println!("  FAIL  primary model: {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  FAIL  model server {}: {e}", config.provider.api_url);
            issues += 1;
        }
    }

    let search_ready = match config.search.backend {
        SearchBackend::Exa => config.search.exa_api_key.is_some(),
        SearchBackend::Google => {
            config.search.google_api_key.is_some() && config.search.google_cx.is_some()
        }
    };
    if search_ready {
        println!("  ok    search backend {:?} configured", config.search.backend);
    } else {
        println!(
            "  warn  search backend {:?} has no credentials (use --no-web)",
            config.search.backend
        );
        issues += 1;
    }

    match &collaborators.embedder {
        Some(embedder) if embedder.is_available().await => {
            println!("  ok    embedding server {} is live", config.embedding_url());
        }
        Some(_) => {
            println!(
                "  warn  embedding server {} unreachable (semantic filtering off)",
                config.embedding_url()
            );
            issues += 1;
        }
        None => println!("  --    embeddings disabled"),
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
