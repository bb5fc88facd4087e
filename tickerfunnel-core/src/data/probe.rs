//! TCP reachability probes for pre-flight status reporting.
//!
//! Probes only report; they never gate stage execution.

use super::request_metrics::RequestMetrics;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// A host:port pair checked before a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub service: String,
    pub host: String,
    pub port: u16,
}

impl ProbeTarget {
    pub fn new(service: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            service: service.into(),
            host: host.into(),
            port,
        }
    }
}

/// Try a plain TCP connect to any resolved address of the target.
///
/// The attempt is counted as a `healthcheck` request for the target's service.
pub fn probe(target: &ProbeTarget, timeout: Duration, metrics: &RequestMetrics) -> bool {
    metrics.record_request(&target.service, "healthcheck");

    let addrs = match (target.host.as_str(), target.port).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            tracing::debug!(host = %target.host, error = %e, "probe: name resolution failed");
            metrics.record_failure(&target.service, "healthcheck");
            return false;
        }
    };

    for addr in addrs {
        if TcpStream::connect_timeout(&addr, timeout).is_ok() {
            return true;
        }
    }

    tracing::debug!(host = %target.host, port = target.port, "probe: unreachable");
    metrics.record_failure(&target.service, "healthcheck");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn reachable_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let metrics = RequestMetrics::new();
        let target = ProbeTarget::new("local", "127.0.0.1", port);
        assert!(probe(&target, Duration::from_secs(1), &metrics));
        assert_eq!(metrics.service_totals("local").requests, 1);
        assert_eq!(metrics.service_totals("local").failures, 0);
    }

    #[test]
    fn closed_port_is_unreachable() {
        // Bind then drop to find a port nothing is listening on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let metrics = RequestMetrics::new();
        let target = ProbeTarget::new("local", "127.0.0.1", port);
        assert!(!probe(&target, Duration::from_millis(200), &metrics));
        assert_eq!(metrics.service_totals("local").failures, 1);
    }
}
