use anyhow::Context;
use clap::Parser;
use component_forge::config::{EnvConfig, ProviderKind};
use component_forge::logging;
use forge_server::{providers, serve, AppState};
use tokio::net::TcpListener;

/// Serve streaming React component generation over HTTP.
#[derive(Debug, Parser)]
#[command(name = "forge-server", version)]
struct Cli {
    /// Listen address; overrides FORGE_BIND_ADDR.
    #[arg(long)]
    bind: Option<String>,
    /// `mock` or `completion-api`; overrides FORGE_PROVIDER.
    #[arg(long, value_parser = parse_provider)]
    provider: Option<ProviderKind>,
    /// Model id; overrides FORGE_MODEL.
    #[arg(long)]
    model: Option<String>,
    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn apply(self, config: &mut EnvConfig) {
        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(provider) = self.provider {
            config.provider = provider;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        config.log.json |= self.log_json;
    }
}

fn parse_provider(value: &str) -> Result<ProviderKind, String> {
    ProviderKind::parse(value)
        .ok_or_else(|| format!("unsupported provider '{value}' (expected mock or completion-api)"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut config = EnvConfig::from_env();
    Cli::parse().apply(&mut config);
    logging::init(&config.log);

    let provider = providers::provider_for_config(&config)
        .context("failed to initialize the generation provider")?;
    let profile = provider.profile();
    if let Err(error) = provider.preflight() {
        tracing::warn!(%error, "provider is not ready; generation requests will be rejected");
    }

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        provider = %profile.provider_id,
        model = %profile.model_id,
        "forge server listening"
    );

    serve(listener, AppState::new(provider), shutdown_signal())
        .await
        .context("server terminated")?;
    tracing::info!("forge server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
