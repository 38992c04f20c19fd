//! Request/reply boundary.
//!
//! Decodes request payloads, hands them to the router on the blocking pool and
//! decides the wire representation of every outcome. Transport-independent:
//! the NATS loop in `main` only moves bytes.

use crate::domain::DomainKind;
use crate::error::ScoringError;
use crate::metrics::ServiceMetrics;
use crate::router::{RouteResponse, Router};
use crate::types::RawAttributes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// What a request subject asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Score a RawAttributes object with one domain's predictor
    Predict(DomainKind),
    /// `{"module": .., "data": {..}}`
    Route,
    /// `{"query": ".."}`
    Query,
}

impl RequestKind {
    /// Parse `{prefix}.{suffix}` subjects
    pub fn from_subject(prefix: &str, subject: &str) -> Option<Self> {
        let suffix = subject.strip_prefix(prefix)?.strip_prefix('.')?;
        match suffix {
            "route" => Some(RequestKind::Route),
            "query" => Some(RequestKind::Query),
            other => DomainKind::from_module_name(other).map(RequestKind::Predict),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RouteRequest {
    #[serde(default)]
    module: String,
    #[serde(default)]
    data: RawAttributes,
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: String,
}

/// Reply body plus its HTTP-equivalent status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub request_id: Uuid,
    pub status: u16,
    pub body: Value,
    pub processed_at: DateTime<Utc>,
}

impl ReplyEnvelope {
    fn new(status: u16, body: Value) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            status,
            body,
            processed_at: Utc::now(),
        }
    }

    fn failure(status: u16, kind: &str, message: impl Into<String>) -> Self {
        Self::new(status, json!({ "error": message.into(), "kind": kind }))
    }
}

/// HTTP-equivalent status for a scoring failure
pub fn status_for(err: &ScoringError) -> u16 {
    match err {
        // The router answers unknown modules with an ErrorResult; only direct
        // callers of a predictor lookup can surface this variant.
        ScoringError::Validation(_) | ScoringError::UnknownModule(_) => 400,
        ScoringError::SchemaMismatch(_) | ScoringError::Inference(_) => 500,
    }
}

/// A request that could not be answered normally
struct Failure {
    kind: &'static str,
    envelope: ReplyEnvelope,
}

impl From<ScoringError> for Failure {
    fn from(err: ScoringError) -> Self {
        if err.is_client_error() {
            debug!(error = %err, "Rejected request");
        } else {
            error!(error = %err, kind = err.kind(), "Scoring failed");
        }
        Self {
            kind: err.kind(),
            envelope: ReplyEnvelope::failure(status_for(&err), err.kind(), err.to_string()),
        }
    }
}

/// Shared request handler
pub struct ScoringService {
    router: Arc<Router>,
    metrics: Arc<ServiceMetrics>,
    timeout: Duration,
}

impl ScoringService {
    pub fn new(router: Arc<Router>, metrics: Arc<ServiceMetrics>, timeout: Duration) -> Self {
        Self {
            router,
            metrics,
            timeout,
        }
    }

    /// Handle one request synchronously
    pub fn handle(&self, kind: RequestKind, payload: &[u8]) -> ReplyEnvelope {
        let start = Instant::now();
        let outcome = self.process(kind, payload);
        self.record(&outcome, start.elapsed());
        outcome.envelope
    }

    /// Handle one request on the blocking pool under the configured deadline.
    ///
    /// `permit` is held until the blocking work finishes, even when the
    /// deadline fires first. Metrics are recorded once, for the reply sent.
    pub async fn handle_async(
        self: Arc<Self>,
        kind: RequestKind,
        payload: Vec<u8>,
        permit: OwnedSemaphorePermit,
    ) -> ReplyEnvelope {
        let start = Instant::now();
        let service = self.clone();
        let task = tokio::task::spawn_blocking(move || {
            let outcome = service.process(kind, &payload);
            drop(permit);
            outcome
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(outcome)) => {
                self.record(&outcome, start.elapsed());
                outcome.envelope
            }
            Ok(Err(e)) => {
                error!(error = %e, "Request handler panicked");
                self.metrics.record_error("internal", start.elapsed());
                ReplyEnvelope::failure(500, "internal", "request handler failed")
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Request timed out");
                self.metrics.record_error("timeout", start.elapsed());
                ReplyEnvelope::failure(504, "timeout", "inference deadline exceeded")
            }
        }
    }

    /// Compute the reply without touching metrics
    fn process(&self, kind: RequestKind, payload: &[u8]) -> Outcome {
        match self.respond(kind, payload) {
            Ok(Reply::Route(RouteResponse::Prediction(result))) => Outcome {
                envelope: ReplyEnvelope::new(200, to_body(&result)),
                record: Record::Prediction {
                    domain: result.domain.module_name(),
                    verdict: result.verdict.label(),
                    probability: result.probability,
                },
            },
            Ok(Reply::Route(unplaced @ RouteResponse::Error(_))) => Outcome {
                envelope: ReplyEnvelope::new(200, to_body(&unplaced)),
                record: Record::Error("unknown_module"),
            },
            Ok(Reply::Query(answer)) => Outcome {
                envelope: ReplyEnvelope::new(200, answer),
                record: Record::Nothing,
            },
            Err(failure) => Outcome {
                envelope: failure.envelope,
                record: Record::Error(failure.kind),
            },
        }
    }

    fn record(&self, outcome: &Outcome, elapsed: Duration) {
        match &outcome.record {
            Record::Prediction {
                domain,
                verdict,
                probability,
            } => self
                .metrics
                .record_prediction(domain, verdict, *probability, elapsed),
            Record::Error(kind) => self.metrics.record_error(kind, elapsed),
            Record::Nothing => {}
        }

        debug!(
            status = outcome.envelope.status,
            elapsed_us = elapsed.as_micros() as u64,
            "Request handled"
        );
    }

    fn respond(&self, kind: RequestKind, payload: &[u8]) -> Result<Reply, Failure> {
        let response = match kind {
            RequestKind::Predict(domain) => {
                let raw: RawAttributes = decode(payload)?;
                self.router.dispatch(domain.module_name(), &raw)?
            }
            RequestKind::Route => {
                let request: RouteRequest = decode(payload)?;
                self.router.dispatch(&request.module, &request.data)?
            }
            RequestKind::Query => {
                let request: QueryRequest = decode(payload)?;
                let answer = self.router.answer_query(&request.query);
                return Ok(Reply::Query(to_body(&answer)));
            }
        };
        Ok(Reply::Route(response))
    }
}

enum Reply {
    Route(RouteResponse),
    Query(Value),
}

/// A reply plus what it contributes to the metrics
struct Outcome {
    envelope: ReplyEnvelope,
    record: Record,
}

enum Record {
    Prediction {
        domain: &'static str,
        verdict: &'static str,
        probability: f64,
    },
    Error(&'static str),
    Nothing,
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, Failure> {
    serde_json::from_slice(payload).map_err(|e| {
        debug!(error = %e, "Malformed request payload");
        Failure {
            kind: "bad_request",
            envelope: ReplyEnvelope::failure(
                400,
                "bad_request",
                format!("Malformed request: {}", e),
            ),
        }
    })
}

fn to_body<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| json!({ "error": e.to_string(), "kind": "internal" }))
}
