use clap::Parser;
use textsim_core::TextsimConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use textsim_server::http::{self, HttpState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "textsim.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

/// The configured key wins; otherwise `OPENAI_API_KEY` from the environment.
fn resolve_api_key(configured: Option<&str>) -> String {
    configured
        .filter(|k| !k.trim().is_empty())
        .map(str::to_string)
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience - production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match TextsimConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging (RUST_LOG overrides the configured level)
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .init();

    // Connect to DB
    let pool = match textsim_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match textsim_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }
        println!("✅ textsim DB health check passed");
        return Ok(());
    }

    textsim_core::db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    let api_key = resolve_api_key(config.openai.api_key.as_deref());

    let (embedder, chat) = http::model_backends(&config.openai, &api_key);
    tracing::info!(
        embedder = embedder.name(),
        chat = chat.name(),
        embedding_model = %config.openai.embedding_model,
        chat_model = %config.openai.chat_model,
        "Hosted model clients ready"
    );

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let state = HttpState::new(pool, embedder, chat);
    http::start_http_server(state, &config, tx.subscribe()).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_key_wins() {
        assert_eq!(resolve_api_key(Some("sk-config")), "sk-config");
    }

    #[test]
    fn test_blank_configured_key_is_ignored() {
        let resolved = resolve_api_key(Some("   "));
        assert_eq!(resolved, std::env::var("OPENAI_API_KEY").unwrap_or_default());
    }
}
