//! iplb — SDN OpenFlow load balancer control-plane.
//!
//! Binds the switch-facing OpenFlow listener and spawns one Balancer per
//! accepted switch connection.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use iplb::balancer::BalancerConfig;
use iplb::config::Config;
use iplb::openflow::server;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_args()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting iplb");
    info!(
        service_ip = %config.service_ip,
        servers = ?config.servers,
        listen = %config.listen,
        "configuration loaded"
    );

    let balancer_config = BalancerConfig::new(config.service_ip, config.servers);
    server::run(config.listen, balancer_config).await
}
