//! BFSI Scoring Library
//!
//! Serves trained credit risk, fraud and churn classifiers: aligns loosely
//! typed request payloads to each model's training schema, scores them and
//! turns the probability into an actionable verdict.

pub mod config;
pub mod consumer;
pub mod domain;
pub mod error;
pub mod feature_encoder;
pub mod metrics;
pub mod models;
pub mod predictor;
pub mod producer;
pub mod router;
pub mod service;
pub mod types;
pub mod verdict;

pub use config::AppConfig;
pub use domain::{DomainKind, DomainSpec, FraudSchemaVariant};
pub use error::{ScoringError, ValidationError};
pub use feature_encoder::{AlignedVector, FeatureEncoder, ModelSchema};
pub use predictor::{Predict, Predictor};
pub use router::{RouteResponse, Router};
pub use service::{ReplyEnvelope, RequestKind, ScoringService};
pub use types::{AttributeValue, PredictionResult, RawAttributes, Verdict};
