//! `maitred doctor`: diagnose configuration and upstream connectivity.

use maitred_config::AppConfig;
use maitred_core::data::DataSource;
use maitred_core::provider::Provider;
use maitred_database::PostgresDataSource;
use maitred_providers::OpenAiCompatProvider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Maitred Doctor");
    println!("=================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ⚠️  No config file at {}, using defaults and environment", config_path.display());
    }

    let config = match AppConfig::load_unchecked() {
        Ok(config) => config,
        Err(e) => {
            println!("  ❌ Config could not be loaded: {e}");
            println!("\n  ⚠️  1 issue found. Fix the config before continuing.");
            return Ok(());
        }
    };

    let valid = match config.validate() {
        Ok(()) => {
            println!("  ✅ Config valid");
            true
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            issues += 1;
            false
        }
    };

    if valid {
        match PostgresDataSource::from_config(&config) {
            Ok(db) => match db.health_check().await {
                Ok(true) => println!("  ✅ Database reachable"),
                Ok(false) => {
                    println!("  ❌ Database answered but health check failed");
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Database unreachable: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Database settings unusable: {e}");
                issues += 1;
            }
        }

        match OpenAiCompatProvider::from_config(&config) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => println!("  ✅ Completion provider reachable ({})", config.provider.model),
                Ok(false) => {
                    println!("  ⚠️  Completion provider rejected the health check");
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Completion provider unreachable: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Completion provider misconfigured: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ⏭️  Skipping database and provider checks");
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
