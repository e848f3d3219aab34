//! Prometheus metrics for the escrow API
//!
//! Endpoints:
//!   GET /metrics: Prometheus text format
//!   GET /healthz: liveness probe

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use kesc_core::EscrowError;
use prometheus_client::encoding::{text::encode, EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::{counter::Counter, family::Family, gauge::Gauge};
use prometheus_client::registry::Registry;

use crate::server::AppState;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Operation {
    Add,
    Fetch,
    Remove,
    Info,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Ok,
    Invalid,
    Conflict,
    NotFound,
    Unauthorized,
    Evicted,
    Error,
}

impl Outcome {
    pub fn of<T>(result: &Result<T, EscrowError>) -> Self {
        match result {
            Ok(_) => Outcome::Ok,
            Err(EscrowError::Validation(_) | EscrowError::KeyLength(_)) => Outcome::Invalid,
            Err(EscrowError::Conflict) => Outcome::Conflict,
            Err(EscrowError::NotFound) => Outcome::NotFound,
            Err(EscrowError::Authentication) => Outcome::Unauthorized,
            Err(EscrowError::AuthEvicted) => Outcome::Evicted,
            Err(_) => Outcome::Error,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub op: Operation,
    pub outcome: Outcome,
}

/// Escrow API counters and gauges
#[derive(Clone, Default)]
pub struct Metrics {
    requests: Family<RequestLabels, Counter>,
    evictions: Counter,
    entries: Gauge,
}

impl Metrics {
    /// Create the metric set and register it under the `kesc` prefix.
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        let sub = registry.sub_registry_with_prefix("kesc");
        sub.register(
            "requests",
            "Escrow API requests by operation and outcome",
            metrics.requests.clone(),
        );
        sub.register(
            "evictions",
            "Entries evicted after reaching their failed-attempt limit",
            metrics.evictions.clone(),
        );
        sub.register(
            "entries",
            "Live escrow entries",
            metrics.entries.clone(),
        );
        metrics
    }

    pub fn observe<T>(&self, op: Operation, result: &Result<T, EscrowError>, live_entries: usize) {
        let outcome = Outcome::of(result);
        self.requests
            .get_or_create(&RequestLabels { op, outcome })
            .inc();
        if outcome == Outcome::Evicted {
            self.evictions.inc();
        }
        self.entries.set(live_entries as i64);
    }

    pub fn request_count(&self, op: Operation, outcome: Outcome) -> u64 {
        self.requests
            .get_or_create(&RequestLabels { op, outcome })
            .get()
    }
}

/// Shared registry handle for the /metrics endpoint
pub type SharedRegistry = Arc<Registry>;

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut body = String::new();
    match encode(&mut body, &state.registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Liveness probe: returns 200 if the process is running.
pub async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_counts_by_outcome() {
        let mut registry = Registry::default();
        let metrics = Metrics::register(&mut registry);

        metrics.observe(Operation::Fetch, &Ok::<(), EscrowError>(()), 1);
        metrics.observe::<()>(Operation::Fetch, &Err(EscrowError::Authentication), 1);
        metrics.observe::<()>(Operation::Fetch, &Err(EscrowError::AuthEvicted), 0);

        assert_eq!(metrics.request_count(Operation::Fetch, Outcome::Ok), 1);
        assert_eq!(metrics.request_count(Operation::Fetch, Outcome::Unauthorized), 1);
        assert_eq!(metrics.request_count(Operation::Fetch, Outcome::Evicted), 1);
        assert_eq!(metrics.evictions.get(), 1);
        assert_eq!(metrics.entries.get(), 0);
    }

    #[test]
    fn test_encoded_output_has_prefix() {
        let mut registry = Registry::default();
        let metrics = Metrics::register(&mut registry);
        metrics.observe::<()>(Operation::Add, &Err(EscrowError::Conflict), 3);

        let mut body = String::new();
        encode(&mut body, &registry).unwrap();
        assert!(body.contains("kesc_requests_total"));
        assert!(body.contains("outcome=\"Conflict\""));
        assert!(body.contains("kesc_entries 3"));
    }
}
