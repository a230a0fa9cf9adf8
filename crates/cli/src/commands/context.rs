//! `maitred context`: print the prompt the assistant would send.

use maitred_assistant::{ContextBuilder, PromptStyle};
use maitred_config::AppConfig;
use maitred_core::data::DataSource;
use maitred_database::PostgresDataSource;

pub async fn run(one_shot: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let data = PostgresDataSource::from_config(&config)?;

    let rows = data.snapshot(config.context.recent_orders_limit).await?;
    let style = if one_shot {
        PromptStyle::OneShot
    } else {
        PromptStyle::Conversational
    };

    println!("{}", ContextBuilder::render(&rows, style));
    Ok(())
}
