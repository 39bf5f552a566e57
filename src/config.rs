//! Launch configuration (§6): the service IP and backend pool, plus the
//! ambient operational parameters (switch listener, log level) this
//! standalone binary needs that the original's embedding controller used to
//! supply.

use std::net::{Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "iplb", about = "SDN OpenFlow load balancer control-plane")]
struct Cli {
    /// Virtual service IP that clients target.
    #[arg(long, env = "IPLB_IP")]
    ip: Ipv4Addr,

    /// Comma- or whitespace-separated list of backend IPv4 addresses.
    #[arg(long, env = "IPLB_SERVERS")]
    servers: String,

    /// Switch-facing TCP bind address.
    #[arg(long, env = "IPLB_LISTEN", default_value = "0.0.0.0:6633")]
    listen: SocketAddr,

    /// Log level fallback when `RUST_LOG` is unset.
    #[arg(long, env = "IPLB_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub service_ip: Ipv4Addr,
    pub servers: Vec<Ipv4Addr>,
    pub listen: SocketAddr,
    pub log_level: String,
}

impl Config {
    pub fn from_args() -> Result<Self> {
        let cli = Cli::parse();
        let servers = parse_servers(&cli.servers)?;
        Ok(Config {
            service_ip: cli.ip,
            servers,
            listen: cli.listen,
            log_level: cli.log_level,
        })
    }
}

/// Accepts either comma- or whitespace-separated IPv4 lists, mirroring the
/// original launcher's `servers.replace(",", " ").split()` contract.
fn parse_servers(raw: &str) -> Result<Vec<Ipv4Addr>> {
    let normalized = raw.replace(',', " ");
    let servers: Result<Vec<Ipv4Addr>> = normalized
        .split_whitespace()
        .map(|s| s.parse::<Ipv4Addr>().with_context(|| format!("invalid server address: {s}")))
        .collect();
    let servers = servers?;
    if servers.is_empty() {
        anyhow::bail!("--servers must name at least one backend IPv4 address");
    }
    Ok(servers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated() {
        let servers = parse_servers("10.0.0.1,10.0.0.2").unwrap();
        assert_eq!(servers, vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]);
    }

    #[test]
    fn parses_whitespace_separated() {
        let servers = parse_servers("10.0.0.1 10.0.0.2").unwrap();
        assert_eq!(servers.len(), 2);
    }

    #[test]
    fn rejects_empty_list() {
        assert!(parse_servers("").is_err());
    }

    #[test]
    fn rejects_garbage_entry() {
        assert!(parse_servers("not-an-ip").is_err());
    }
}
