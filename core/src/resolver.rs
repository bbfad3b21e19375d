//! Target resolution: host string to ordered IPv4 candidates
//!
//! An IPv4 literal input is always the first candidate. Forward resolution
//! then appends every other IPv4 address, first-seen wins. For literal
//! inputs a reverse lookup is attempted purely for the log.

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::probe::ProbeError;

/// Name service used by the [`Resolver`]
#[async_trait]
pub trait Lookup: Send + Sync {
    /// Forward resolution of `host` to all of its addresses
    async fn forward(&self, host: &str) -> io::Result<Vec<IpAddr>>;

    /// Reverse (PTR) lookup of an IPv4 address
    async fn reverse(&self, ip: Ipv4Addr) -> Result<Vec<String>, String>;
}

/// Lookup through the operating system resolver
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

#[async_trait]
impl Lookup for SystemLookup {
    async fn forward(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|sa| sa.ip()).collect())
    }

    async fn reverse(&self, ip: Ipv4Addr) -> Result<Vec<String>, String> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().map_err(|e| e.to_string())?;
        let names = resolver
            .reverse_lookup(IpAddr::V4(ip))
            .await
            .map_err(|e| e.to_string())?;
        Ok(names.iter().map(|ptr| ptr.to_string()).collect())
    }
}

/// Expands a host into candidate IPv4 addresses
#[derive(Debug, Clone)]
pub struct Resolver<L = SystemLookup> {
    lookup: L,
    timeout: Duration,
}

impl Resolver<SystemLookup> {
    /// Resolver backed by the system name service
    pub fn system(timeout: Duration) -> Self {
        Self::new(SystemLookup, timeout)
    }
}

impl<L: Lookup> Resolver<L> {
    /// Resolver with a custom lookup; each DNS step is bounded by `timeout`
    pub fn new(lookup: L, timeout: Duration) -> Self {
        Self { lookup, timeout }
    }

    /// Resolve `host` to an ordered, de-duplicated list of IPv4 literals
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Resolve`] when the host is empty, forward
    /// resolution fails or times out, or no IPv4 address remains.
    pub async fn resolve(&self, host: &str) -> Result<Vec<String>, ProbeError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ProbeError::Resolve("lookup: empty host".to_string()));
        }

        let literal = host.parse::<Ipv4Addr>().ok();
        if let Some(ip) = literal {
            self.log_reverse(ip).await;
        }

        let forward = match timeout(self.timeout, self.lookup.forward(host)).await {
            Ok(Ok(addrs)) => addrs,
            Ok(Err(e)) => {
                warn!("forward lookup of {} failed: {}", host, e);
                return Err(ProbeError::Resolve(format!("lookup {host}: {e}")));
            }
            Err(_elapsed) => {
                warn!("forward lookup of {} timed out", host);
                return Err(ProbeError::Resolve(format!(
                    "lookup {host}: timed out after {}",
                    humantime::format_duration(self.timeout)
                )));
            }
        };
        info!("ip address = {:?}", forward);

        let mut candidates: Vec<String> = Vec::new();
        if literal.is_some() {
            candidates.push(host.to_string());
        }
        for ip in forward {
            let IpAddr::V4(v4) = ip else { continue };
            let text = v4.to_string();
            if !candidates.contains(&text) {
                candidates.push(text);
            }
        }

        if candidates.is_empty() {
            return Err(ProbeError::Resolve(format!(
                "lookup {host}: no IPv4 address found"
            )));
        }
        debug!("candidates for {}: {}", host, candidates.join(","));
        Ok(candidates)
    }

    async fn log_reverse(&self, ip: Ipv4Addr) {
        match timeout(self.timeout, self.lookup.reverse(ip)).await {
            Ok(Ok(names)) => info!("DNS name = {:?}", names),
            Ok(Err(e)) => warn!("reverse lookup of {} failed: {}", ip, e),
            Err(_elapsed) => warn!("reverse lookup of {} timed out", ip),
        }
    }
}

/// Resolve with the system name service
pub async fn resolve(host: &str, timeout: Duration) -> Result<Vec<String>, ProbeError> {
    Resolver::system(timeout).resolve(host).await
}
