//! `maitred status`: show the effective configuration.

use maitred_config::AppConfig;

pub fn run(sample: bool) -> Result<(), Box<dyn std::error::Error>> {
    if sample {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = AppConfig::load_unchecked().map_err(|e| format!("Failed to load config: {e}"))?;
    let db = &config.database;

    println!("🍽️  Maitred Status");
    println!("=================");
    println!("  Config file:  {}", AppConfig::config_path().display());
    println!("  Mode:         {}", config.gateway.chat_mode);
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!("  Provider:     {}", config.provider.api_url);
    println!("  Model:        {}", config.provider.model);
    println!("  API key:      {}", redact(config.api_key.as_deref()));
    println!(
        "  Database:     {}@{}:{}/{}",
        db.user.as_deref().unwrap_or("-"),
        db.host.as_deref().unwrap_or("-"),
        db.port,
        db.name.as_deref().unwrap_or("-")
    );
    println!("  DB password:  {}", redact(db.password.as_deref()));
    println!("  Memory:       {}", config.memory.backend);
    println!("  Orders shown: {}", config.context.recent_orders_limit);
    println!("  Narration:    {}", if config.query.narrate { "enabled" } else { "disabled" });
    println!("  Tables:       {}", config.query.allowed_tables.join(", "));

    match config.validate() {
        Ok(()) => println!("\n  ✅ Configuration valid"),
        Err(e) => println!("\n  ❌ {e}"),
    }

    Ok(())
}

fn redact(secret: Option<&str>) -> &'static str {
    match secret {
        Some(s) if !s.trim().is_empty() => "set (hidden)",
        _ => "not set",
    }
}
