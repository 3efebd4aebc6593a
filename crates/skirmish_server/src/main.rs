//! Skirmish lockstep authority.
//!
//! `SKIRMISH_BIND` and `SKIRMISH_HOST_TEAM` configure the listener;
//! `SKIRMISH_MATCH` names a JSON match config, defaults otherwise.

use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skirmish_core::config::MatchConfig;
use skirmish_server::network::AuthorityServer;
use skirmish_server::{NetError, ServerConfig};

fn load_match() -> skirmish_server::Result<MatchConfig> {
    let Ok(path) = std::env::var("SKIRMISH_MATCH") else {
        return Ok(MatchConfig::default());
    };
    let text = std::fs::read_to_string(&path)?;
    let config = MatchConfig::from_json(&text)?;
    tracing::info!(%path, "Loaded match config");
    Ok(config)
}

async fn serve() -> skirmish_server::Result<()> {
    let config = ServerConfig::from_env()?;
    let match_config = load_match()?;
    let server = AuthorityServer::bind(&config, match_config).await?;
    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting skirmish authority");

    match serve().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(NetError::Config(msg)) => {
            tracing::error!(%msg, "Bad configuration");
            ExitCode::from(2)
        }
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}
