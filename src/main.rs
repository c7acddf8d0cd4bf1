use std::process::ExitCode;
use std::sync::Arc;

use agps_relay::cache::GeoCache;
use agps_relay::config::Config;
use agps_relay::server::Server;
use agps_relay::upstream::TcpUpstream;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agps_relay=info".into()),
        )
        .with_target(true)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), std::io::Error> {
    let upstream = TcpUpstream::new(config.upstream_host.clone(), config.upstream_port);
    info!(
        upstream = %upstream.addr(),
        slots = config.cache_list.len(),
        cache_time_ms = u64::try_from(config.cache_time.as_millis()).unwrap_or(u64::MAX),
        "starting AGPS relay"
    );

    let cache = Arc::new(GeoCache::new(
        config.cache_list.iter().copied(),
        upstream,
        config.cache_time,
    ));

    let listener = TcpListener::bind(config.listen_addr()).await?;
    let server = Server::new(listener, cache)
        .with_idle_timeout(config.idle_timeout)
        .with_max_request_size(config.max_request_size);

    info!("u-blox agps proxy listening on {}", server.local_addr()?);
    server.serve().await
}
