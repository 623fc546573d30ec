//! Tandem Gateway - 双智能体对话的 WebSocket 服务器
//!
//! 运行方式：
//! ```bash
//! cargo run --bin tandem
//! ```
//!
//! WebSocket 对话在 gateway.bind_addr，FAQ HTTP 接口（web feature）在 gateway.http_addr。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tandem::agent::{create_faq_store, create_orchestrator_with_faq};
use tandem::config::load_config;
use tandem::gateway::{AnonymousResolver, Hub, HubConfig, IdentityResolver, JwtIdentityResolver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tandem::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        Default::default()
    });

    let faq = create_faq_store(&cfg);
    let orchestrator = Arc::new(
        create_orchestrator_with_faq(&cfg, Arc::clone(&faq)).context("Failed to build orchestrator")?,
    );

    let resolver: Arc<dyn IdentityResolver> = match &cfg.auth.jwt_secret {
        Some(secret) => Arc::new(JwtIdentityResolver::new(secret)),
        None => {
            tracing::warn!("No auth.jwt_secret configured, all sessions are anonymous");
            Arc::new(AnonymousResolver)
        }
    };

    let hub = Hub::new(HubConfig::from(&cfg), orchestrator, resolver);
    let addr = hub.start().await.context("Failed to start gateway")?;

    #[cfg(feature = "web")]
    let web_shutdown = tokio_util::sync::CancellationToken::new();
    #[cfg(feature = "web")]
    tandem::gateway::web::serve(&cfg.gateway.http_addr, faq, web_shutdown.clone())
        .await
        .context("Failed to start FAQ API")?;
    #[cfg(not(feature = "web"))]
    drop(faq);

    tracing::info!(
        "{} ready on ws://{}, press Ctrl+C to stop",
        cfg.app.name.as_deref().unwrap_or("tandem"),
        addr
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down gateway...");
    hub.stop().await;
    #[cfg(feature = "web")]
    web_shutdown.cancel();

    Ok(())
}
