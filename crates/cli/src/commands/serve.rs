//! `maitred serve`: start the HTTP API server.

use maitred_config::AppConfig;

pub async fn run(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(p) = port {
        config.gateway.port = p;
    }

    println!("🍽️  Maitred listening on http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Mode:   {}", config.gateway.chat_mode);
    println!("   Model:  {}", config.provider.model);
    println!("   Memory: {}", config.memory.backend);
    println!("   Press Ctrl+C to stop.\n");

    maitred_gateway::start(config).await
}
