//! Memonote - flashcard study and word-list marketplace

use memonote::{cli, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default filter comes from config (warn unless changed), RUST_LOG adds to it
    let level = Config::load()
        .map(|c| c.log_level)
        .unwrap_or_else(|_| "warn".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(level.parse::<tracing_subscriber::filter::Directive>()?)
        )
        .init();

    cli::run().await
}
