//! Switch-facing TCP listener: accepts connections, completes the OpenFlow
//! handshake, and spawns one Balancer actor per switch (the Rust realization
//! of a one-shot `ConnectionUp` listener).

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::balancer::{self, BalancerConfig};
use crate::openflow::connection;

/// Bind `listen_addr` and run forever, spawning one Balancer per accepted
/// switch connection.
pub async fn run(listen_addr: SocketAddr, config: BalancerConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    info!(addr = %listen_addr, "listening for switch connections");

    loop {
        let (stream, peer) = listener.accept().await?;
        let config = config.clone();
        tokio::spawn(async move {
            info!(%peer, "switch connected, starting handshake");
            match connection::handshake(stream).await {
                Ok((dpid, sender, events)) => {
                    info!(%peer, dpid = format!("{:#018x}", dpid), "handshake complete");
                    balancer::run(dpid, sender, events, config).await;
                    info!(%peer, "switch disconnected, balancer shut down");
                }
                Err(e) => {
                    warn!(%peer, error = %e, "openflow handshake failed");
                }
            }
        });
    }
}
