use std::sync::Arc;

use anyhow::Context;

use quest_bot::channels::TelegramChannel;
use quest_bot::config::QuestConfig;
use quest_bot::dispatch::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenvy::dotenv().is_err() {
        eprintln!("No .env file found");
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = QuestConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
    let config = Arc::new(config);

    let telegram = Arc::new(TelegramChannel::new(config.telegram_token.clone()));

    let dispatcher = Dispatcher::from_config(Arc::clone(&config), telegram.clone())
        .await
        .context("failed to prepare the quest")?;

    eprintln!("🧭 Quest bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Stages: {}", dispatcher.engine().script().stages.len());
    eprintln!("   Storage: {}", config.storage_path.display());
    eprintln!("   Group chat: {}", config.group_chat);
    eprintln!("   Admin: {}", config.admin_identifier);
    eprintln!(
        "   Audio asset: {}",
        if config.audio_asset.is_some() { "configured" } else { "none" }
    );

    let dispatcher = Arc::new(dispatcher);

    tokio::select! {
        result = Arc::clone(&dispatcher).serve(telegram.as_ref()) => {
            result.context("Telegram channel failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupt received, shutting down");
        }
    }

    Ok(())
}
