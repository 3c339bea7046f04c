use std::process::ExitCode;
use std::sync::Arc;

use archgen_rs::api::ArchgenServer;
use archgen_rs::helpers::build_agent;
use archgen_rs::ServiceConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "archgen_rs=debug,archgen=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let agent = match build_agent(&config.agent, config.agent_timeout) {
        Ok(agent) => agent,
        Err(err) => {
            tracing::error!(error = %err, "architecture agent unavailable");
            return ExitCode::FAILURE;
        }
    };

    let server = match ArchgenServer::new(config, Arc::new(agent)).await {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(error = %err, "failed to initialise server");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    if let Err(err) = server.start(shutdown).await {
        tracing::error!(error = %err, "server error");
        return ExitCode::FAILURE;
    }
    tracing::info!("archgen stopped");
    ExitCode::SUCCESS
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                let _ = ctrl_c.await;
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("received Ctrl+C, shutting down");
    }

    shutdown.cancel();
}
