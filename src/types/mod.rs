//! Type definitions for the scoring engine

pub mod attributes;
pub mod prediction;

pub use attributes::{AttributeValue, RawAttributes};
pub use prediction::{ErrorResult, FraudVerdict, PredictionResult, RiskCategory, Verdict};
