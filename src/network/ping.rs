//! Ping sweeps over an IPv4 network.
//!
//! Pinging every host makes devices talk, which puts their addresses on the
//! wire where the capture can see them. Individual results do not matter; a
//! sweep only reports how many hosts answered.

use futures::future::join_all;
use ipnetwork::Ipv4Network;
use log::{debug, info};
use serde::Serialize;
use std::future::Future;
use std::net::Ipv4Addr;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::configuration::PingSettings;
use crate::error_handling::types::PingError;

/// Outcome of one sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub network: String,
    pub hosts: usize,
    pub reachable: usize,
}

/// Parses a CIDR such as `192.168.1.0/24`. A bare address is a /32.
///
/// Host bits must be clear: `192.168.1.7/24` names an address, not a network,
/// and is rejected. The address must be written with all four octets.
pub fn parse_network(spec: &str) -> Result<Ipv4Network, PingError> {
    let spec = spec.trim();
    let invalid = |reason: String| PingError::InvalidNetworkSpec(format!("{}: {}", spec, reason));

    let address = spec.split('/').next().unwrap_or_default();
    if address.split('.').count() != 4 {
        return Err(invalid("expected a dotted-quad address".to_string()));
    }
    let network: Ipv4Network = spec.parse().map_err(|e| invalid(format!("{}", e)))?;
    if network.ip() != network.network() {
        return Err(invalid("has host bits set".to_string()));
    }
    Ok(network)
}

/// Number of addresses [`usable_hosts`] would return, without enumerating them.
pub fn usable_host_count(network: &Ipv4Network) -> u64 {
    match network.prefix() {
        32 => 1,
        31 => 2,
        prefix => (1u64 << (32 - u32::from(prefix))) - 2,
    }
}

/// Host addresses of `network`: a /32 is its own address, both addresses of a
/// /31 are hosts, otherwise the network and broadcast addresses are excluded.
pub fn usable_hosts(network: &Ipv4Network) -> Vec<Ipv4Addr> {
    if network.prefix() >= 31 {
        return network.iter().collect();
    }
    let (first, last) = (network.network(), network.broadcast());
    network
        .iter()
        .filter(|ip| *ip != first && *ip != last)
        .collect()
}

/// Runs the system `ping` against every host of a network.
#[derive(Debug, Clone)]
pub struct PingSweeper {
    settings: PingSettings,
}

impl PingSweeper {
    pub fn new(settings: PingSettings) -> Self {
        Self { settings }
    }

    /// Pings every usable host of `spec` and returns once all probes finished.
    pub async fn sweep(&self, spec: &str) -> Result<SweepSummary, PingError> {
        self.sweep_with(spec, |ip| self.ping(ip)).await
    }

    /// Sweep with a caller-supplied probe, which reports whether the host answered.
    pub async fn sweep_with<F, Fut>(&self, spec: &str, probe: F) -> Result<SweepSummary, PingError>
    where
        F: Fn(Ipv4Addr) -> Fut,
        Fut: Future<Output = bool>,
    {
        let network = parse_network(spec)?;
        let count = usable_host_count(&network);
        if count > self.settings.max_hosts as u64 {
            return Err(PingError::TooManyHosts {
                network: network.to_string(),
                hosts: usize::try_from(count).unwrap_or(usize::MAX),
                limit: self.settings.max_hosts,
            });
        }

        let hosts = usable_hosts(&network);
        info!("Pinging {} hosts on {}", hosts.len(), network);

        let semaphore = Semaphore::new(self.settings.concurrency.max(1));
        let probes = hosts.iter().map(|ip| {
            let semaphore = &semaphore;
            let probe = &probe;
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                Some(probe(*ip).await)
            }
        });
        let reachable = join_all(probes)
            .await
            .into_iter()
            .filter(|answered| *answered == Some(true))
            .count();

        info!(
            "Ping sweep of {} done: {}/{} hosts answered",
            network,
            reachable,
            hosts.len()
        );
        Ok(SweepSummary {
            network: network.to_string(),
            hosts: hosts.len(),
            reachable,
        })
    }

    async fn ping(&self, ip: Ipv4Addr) -> bool {
        let status = Command::new(&self.settings.program)
            .arg("-c")
            .arg(self.settings.count.to_string())
            .arg("-W")
            .arg(self.settings.timeout_secs.to_string())
            .arg(ip.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await;
        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                debug!("No answer from {} ({})", ip, status);
                false
            }
            Err(e) => {
                debug!("Could not ping {}: {}", ip, e);
                false
            }
        }
    }
}
