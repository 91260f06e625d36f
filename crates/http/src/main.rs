use std::net::SocketAddr;
use std::process::ExitCode;

use duet_http::config::ServerConfig;
use duet_http::cors::Cors;
use duet_http::dispatch::Dispatcher;
use duet_http::server::{Server, shutdown_signal};
use duet_http::{health, logging};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let (config, warnings) = match ServerConfig::load() {
        Ok(loaded) => loaded,
        Err(duet_http::config::ConfigError::Args(e)) => {
            // --help and --version land here too
            e.exit();
        }
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.log_level) {
        eprintln!("failed to install the log subscriber: {e}");
        return ExitCode::FAILURE;
    }
    for warning in &warnings {
        warn!(%warning, "configuration warning");
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(cause = %e, "server stopped with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    health::mark_started();
    let handler = Cors::new(Dispatcher::new(&config), &config.cors_origin)?;

    let server = Server::bind(SocketAddr::from(([0, 0, 0, 0], config.port)))
        .await?
        .shutdown_timeout(config.shutdown_timeout());
    let addr = server.local_addr()?;
    info!(%addr, environment = %config.environment, "built-in HTTP server running on http://localhost:{}", addr.port());
    info!("health check: http://localhost:{}/health", addr.port());

    server.serve(handler, shutdown_signal()).await?;
    Ok(())
}
