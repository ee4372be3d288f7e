use std::sync::Arc;

use anyhow::Context;
use mailgate::{router, AppState, Config, SmtpRelay};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(Config::load().context("Failed to initialize")?);
    tracing::debug!("Loaded {:?}", config);

    let relay = Arc::new(SmtpRelay::new(config.clone()));
    let app = router(AppState::new(config.clone(), relay));

    mailgate::serve(config.bind_addr(), app).await?;
    Ok(())
}
