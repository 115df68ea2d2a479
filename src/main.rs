use std::sync::Arc;

use anyhow::Context;
use preisdetektiv::{router, AppState, Config, OpenAiAnalyzer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.model.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; every analysis will fail");
    }

    let analyzer = OpenAiAnalyzer::new(&config.model);
    tracing::info!("Using model {}", analyzer.model_name());

    let state = AppState::new(Arc::new(analyzer));
    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("🚀 Server running on http://{}", listener.local_addr()?);
    tracing::info!("📸 Open in your browser to check a product price");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
