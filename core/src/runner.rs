//! Multi-target socket probing
//!
//! Resolves a host into IPv4 candidates and dials each one. Candidates are
//! probed one at a time unless a concurrency above one is configured; in
//! either case the report lists outcomes in resolver order.

use futures::stream::{self, StreamExt};
use schema::{ProbeReport, ProbeResult, ProbeTarget};
use std::time::Duration;
use tracing::info;

use crate::probe::{Probe, SocketProbe};
use crate::resolver::{Lookup, Resolver, SystemLookup};

/// Drives a [`SocketProbe`] over every resolved candidate
#[derive(Debug, Clone)]
pub struct Runner<L = SystemLookup> {
    lookup: L,
    concurrency: usize,
}

impl Default for Runner<SystemLookup> {
    fn default() -> Self {
        Self::new(SystemLookup)
    }
}

impl<L: Lookup + Clone> Runner<L> {
    /// Sequential runner using `lookup` for resolution
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` dials in flight (minimum one)
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Probe `host` on `port` over `protocol`, bounding each step by `timeout`
    ///
    /// Never fails: a resolution error yields a single-entry report carrying
    /// that error, and per-candidate failures are recorded as entries.
    pub async fn run(&self, host: &str, port: &str, protocol: &str, timeout: Duration) -> ProbeReport {
        let requested = ProbeTarget::new(host.trim(), port.trim(), protocol);
        info!(
            "[NETWORK] Parameters: host={}, port={}, protocol={}, timeout={}",
            requested.address,
            requested.port,
            requested.protocol,
            humantime::format_duration(timeout)
        );

        let resolver = Resolver::new(self.lookup.clone(), timeout);
        let candidates = match resolver.resolve(&requested.address).await {
            Ok(candidates) => candidates,
            Err(err) => {
                let message = format!("{} : {}", requested, err);
                return ProbeReport::single(ProbeResult::failed(requested, err.kind(), message));
            }
        };
        info!("[NETWORK] Checking : {}", candidates.join(","));

        let probes: Vec<SocketProbe> = candidates
            .into_iter()
            .map(|address| {
                let target = ProbeTarget::new(address, requested.port.clone(), requested.protocol.clone());
                SocketProbe::new(target, timeout)
            })
            .collect();

        let mut report = ProbeReport::titled(format!("Checking {}", requested));
        if self.concurrency <= 1 {
            for probe in &probes {
                report.push(probe.probe().await);
            }
        } else {
            // `buffered` yields in input order regardless of completion order
            let pending: Vec<_> = probes.iter().map(|probe| probe.probe()).collect();
            let results: Vec<ProbeResult> = stream::iter(pending)
                .buffered(self.concurrency)
                .collect()
                .await;
            report.extend(results);
        }
        report
    }
}

/// Sequentially probe every candidate of `host` using the system resolver
pub async fn run(host: &str, port: &str, protocol: &str, timeout: Duration) -> ProbeReport {
    Runner::default().run(host, port, protocol, timeout).await
}
