//! Prometheus counters and the /metrics + /healthz endpoints
//!
//! Endpoints:
//!   GET /metrics  - Prometheus text format
//!   GET /healthz  - Liveness probe (always 200 if process is running)

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::Registry,
};
use std::time::Duration;

use eitxt_core::{EitxtResult, ErrorKind};

use crate::server::AppState;

type Labels = Vec<(String, String)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Decrypt,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Operation::Encrypt => "encrypt",
            Operation::Decrypt => "decrypt",
        }
    }
}

/// Outcome label for a finished request
pub fn outcome<T>(result: &EitxtResult<T>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => match e.kind() {
            ErrorKind::MalformedEnvelope => "malformed",
            ErrorKind::Integrity => "integrity",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::ResourceLimit => "too_large",
            ErrorKind::Internal => "internal",
        },
    }
}

#[derive(Clone)]
pub struct Metrics {
    requests: Family<Labels, Counter>,
    bytes_processed: Family<Labels, Counter>,
    duration: Family<Labels, Histogram>,
}

impl Metrics {
    pub fn new(registry: &mut Registry) -> Self {
        let requests = Family::default();
        let bytes_processed = Family::default();
        let duration = Family::<Labels, Histogram>::new_with_constructor(|| {
            Histogram::new([0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
        });

        // Counters gain the `_total` suffix when encoded.
        registry.register(
            "eitxt_requests",
            "Encrypt/decrypt requests by outcome",
            requests.clone(),
        );
        registry.register(
            "eitxt_bytes_processed",
            "Plaintext bytes sealed or recovered",
            bytes_processed.clone(),
        );
        registry.register(
            "eitxt_request_duration_seconds",
            "Encrypt/decrypt request duration in seconds",
            duration.clone(),
        );

        Metrics {
            requests,
            bytes_processed,
            duration,
        }
    }

    pub fn record(&self, op: Operation, outcome: &'static str, elapsed: Duration) {
        let labels = vec![
            ("operation".to_string(), op.as_str().to_string()),
            ("outcome".to_string(), outcome.to_string()),
        ];
        self.requests.get_or_create(&labels).inc();
        self.duration
            .get_or_create(&Self::op_labels(op))
            .observe(elapsed.as_secs_f64());
    }

    pub fn add_bytes(&self, op: Operation, bytes: usize) {
        self.bytes_processed
            .get_or_create(&Self::op_labels(op))
            .inc_by(bytes as u64);
    }

    fn op_labels(op: Operation) -> Labels {
        vec![("operation".to_string(), op.as_str().to_string())]
    }
}

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
