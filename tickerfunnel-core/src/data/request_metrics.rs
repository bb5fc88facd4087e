//! Outbound request accounting, keyed by (service, operation).
//!
//! Pure counters for run reporting. Providers record into a shared
//! `Arc<RequestMetrics>` from whichever thread makes the call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, Default)]
struct Counter {
    requests: u64,
    failures: u64,
    bytes: u64,
}

/// Counts for one (service, operation) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCount {
    pub service: String,
    pub operation: String,
    pub requests: u64,
    pub failures: u64,
    pub bytes: u64,
}

/// Aggregate counts across a set of operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTotals {
    pub requests: u64,
    pub failures: u64,
    pub bytes: u64,
}

#[derive(Debug, Default)]
pub struct RequestMetrics {
    counters: Mutex<BTreeMap<(String, String), Counter>>,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, service: &str, operation: &str, f: impl FnOnce(&mut Counter)) {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        f(counters
            .entry((service.to_string(), operation.to_string()))
            .or_default());
    }

    /// Count one outbound call.
    pub fn record_request(&self, service: &str, operation: &str) {
        self.update(service, operation, |c| c.requests += 1);
    }

    /// Count one failed outbound call. The call itself is counted separately.
    pub fn record_failure(&self, service: &str, operation: &str) {
        self.update(service, operation, |c| c.failures += 1);
    }

    /// Add received payload bytes.
    pub fn record_bytes(&self, service: &str, operation: &str, bytes: u64) {
        self.update(service, operation, |c| c.bytes += bytes);
    }

    /// Per-operation counts, ordered by service then operation.
    pub fn snapshot(&self) -> Vec<RequestCount> {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters
            .iter()
            .map(|((service, operation), c)| RequestCount {
                service: service.clone(),
                operation: operation.clone(),
                requests: c.requests,
                failures: c.failures,
                bytes: c.bytes,
            })
            .collect()
    }

    pub fn service_totals(&self, service: &str) -> RequestTotals {
        self.sum(|s| s == service)
    }

    pub fn totals(&self) -> RequestTotals {
        self.sum(|_| true)
    }

    fn sum(&self, include: impl Fn(&str) -> bool) -> RequestTotals {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters
            .iter()
            .filter(|((service, _), _)| include(service))
            .fold(RequestTotals::default(), |mut acc, (_, c)| {
                acc.requests += c.requests;
                acc.failures += c.failures;
                acc.bytes += c.bytes;
                acc
            })
    }

    pub fn reset(&self) {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Multi-line human-readable report.
    pub fn summary(&self) -> String {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return "no outbound requests".to_string();
        }
        let totals = self.totals();
        let mut out = format!(
            "{} requests, {} failed, {} bytes",
            totals.requests, totals.failures, totals.bytes
        );
        for c in snapshot {
            let _ = write!(
                out,
                "\n  {}/{}: {} requests, {} failed, {} bytes",
                c.service, c.operation, c.requests, c.failures, c.bytes
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counts_by_service_and_operation() {
        let m = RequestMetrics::new();
        m.record_request("yahoo", "chart");
        m.record_request("yahoo", "chart");
        m.record_request("yahoo", "summary");
        m.record_failure("yahoo", "summary");
        m.record_bytes("yahoo", "chart", 1200);
        m.record_request("nasdaq", "listing");

        let snap = m.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].service, "nasdaq");
        assert_eq!(snap[1].operation, "chart");
        assert_eq!(snap[1].requests, 2);
        assert_eq!(snap[1].bytes, 1200);

        let yahoo = m.service_totals("yahoo");
        assert_eq!(yahoo.requests, 3);
        assert_eq!(yahoo.failures, 1);
        assert_eq!(m.totals().requests, 4);
    }

    #[test]
    fn reset_clears_everything() {
        let m = RequestMetrics::new();
        m.record_request("yahoo", "chart");
        m.reset();
        assert_eq!(m.totals(), RequestTotals::default());
        assert_eq!(m.summary(), "no outbound requests");
    }

    #[test]
    fn summary_lists_operations() {
        let m = RequestMetrics::new();
        m.record_request("yahoo", "chart");
        let s = m.summary();
        assert!(s.starts_with("1 requests, 0 failed, 0 bytes"));
        assert!(s.contains("yahoo/chart"));
    }

    #[test]
    fn concurrent_recording() {
        let m = Arc::new(RequestMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        m.record_request("yahoo", "chart");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.totals().requests, 800);
    }
}
