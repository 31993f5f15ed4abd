//! `scholarag doctor` — Diagnose configuration and backend health.

use scholarag_config::{AppConfig, RetrievalBackend};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 ScholaRAG Doctor — System Diagnostics");
    println!("========================================\n");

    let mut issues = 0;

    // Check config
    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ℹ️  No config file at {} (using defaults)", config_path.display());
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    // Check retrieval
    match scholarag_retrieval::build_from_config(&config.retrieval) {
        Ok(retriever) => match config.retrieval.backend {
            RetrievalBackend::None => {
                println!("  ⚠️  Retrieval disabled — answers will not be grounded in the docs");
            }
            _ => println!("  ✅ Retriever ready ({})", retriever.name()),
        },
        Err(e) => {
            println!("  ❌ Retriever unavailable: {e}");
            issues += 1;
        }
    }

    // Check API key and backend
    if config.has_api_key() {
        println!("  ✅ API key configured");

        let provider = scholarag_providers::build_from_config(&config);
        match provider.health_check().await {
            Ok(_) => println!("  ✅ {} reachable", provider.name()),
            Err(e) => {
                println!("  ❌ {} check failed: {e}", provider.name());
                issues += 1;
            }
        }
    } else {
        println!("  ❌ No API key — set ANTHROPIC_API_KEY or api_key in config.toml");
        issues += 1;
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
