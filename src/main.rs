use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ideas_relay::app::{self, AppState};
use ideas_relay::config::Config;
use ideas_relay::server::Server;

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::parse();
    init_logging(&config);

    info!(
        upstream = %config.upstream_origin,
        cache_ttl_secs = config.cache_ttl_secs,
        static_dir = %config.static_dir.display(),
        "starting ideas-relay"
    );

    let state = Arc::new(AppState::from_config(&config)?);
    let handler = app::stack(&config, &state).into_handler();

    let server = Server::bind(config.listen_addr()).await?;
    server.run_until(handler, shutdown_signal()).await?;

    state.ideas.clear_cache();
    info!("cache cleared, exiting");
    Ok(())
}
