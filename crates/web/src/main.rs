use std::net::SocketAddr;
use std::process::ExitCode;

use duet_http::config::ServerConfig;
use duet_http::server::shutdown_signal;
use duet_http::{health, logging};
use duet_web::Server;
use duet_web::interceptor::{
    AccessLogInterceptor, CorsInterceptor, EncodeInterceptor, Interceptors, RequestIdInterceptor,
    SecurityHeadersInterceptor,
};
use duet_web::routes::{self, Fallback};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let (config, warnings) = match ServerConfig::load() {
        Ok(loaded) => loaded,
        Err(duet_http::config::ConfigError::Args(e)) => {
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

    // request id first so every later hook can log it; access log last to see the final body
    let interceptors = Interceptors::builder()
        .add_last(RequestIdInterceptor)
        .add_last(SecurityHeadersInterceptor)
        .add_last(CorsInterceptor::new(&config.cors_origin)?)
        .add_last(EncodeInterceptor::default())
        .add_last(AccessLogInterceptor)
        .build();

    let server = Server::builder()
        .router(routes::router(&config.environment)?)
        .default_handler(Fallback)
        .interceptors(interceptors)
        .body_limit(config.max_body_size)
        .build()?;

    let listener = duet_http::server::Server::bind(SocketAddr::from(([0, 0, 0, 0], config.port)))
        .await?
        .shutdown_timeout(config.shutdown_timeout());
    let addr = listener.local_addr()?;
    info!(%addr, environment = %config.environment, "express server running on http://localhost:{}", addr.port());
    info!("health check: http://localhost:{}/health", addr.port());

    listener.serve(server, shutdown_signal()).await?;
    Ok(())
}
