//! Chatbot dispatch: module name or free-form query to a predictor

use crate::domain::DomainKind;
use crate::error::{Result, ScoringError};
use crate::predictor::Predict;
use crate::types::{ErrorResult, PredictionResult, RawAttributes};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Keywords that map a free-form query onto a module
const INTENT_KEYWORDS: &[(DomainKind, &[&str])] = &[
    (
        DomainKind::FraudDetection,
        &["fraud", "fraudulent", "suspicious", "transaction", "scam"],
    ),
    (
        DomainKind::CreditRisk,
        &["credit", "loan", "default", "borrower", "lend"],
    ),
    (
        DomainKind::ChurnPrediction,
        &["churn", "retention", "retain", "cancel", "leave", "leaving"],
    ),
];

/// Outcome of a routed request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RouteResponse {
    Prediction(PredictionResult),
    Error(ErrorResult),
}

/// Structured reply to a free-form query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnswer {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<DomainKind>,
}

/// Forwards requests to the predictor registered for a module
pub struct Router {
    predictors: BTreeMap<DomainKind, Arc<dyn Predict>>,
}

impl Router {
    pub fn new(predictors: impl IntoIterator<Item = Arc<dyn Predict>>) -> Self {
        let predictors = predictors
            .into_iter()
            .map(|predictor| (predictor.domain(), predictor))
            .collect();
        Self { predictors }
    }

    pub fn modules(&self) -> Vec<&'static str> {
        self.predictors.keys().map(|kind| kind.module_name()).collect()
    }

    pub fn predictor(&self, kind: DomainKind) -> Option<&Arc<dyn Predict>> {
        self.predictors.get(&kind)
    }

    /// Dispatch a payload to the named module.
    ///
    /// An unknown module is answered with an [`ErrorResult`], not an error;
    /// predictor failures propagate unchanged.
    pub fn dispatch(&self, module_name: &str, payload: &RawAttributes) -> Result<RouteResponse> {
        match self.lookup(module_name) {
            Ok(predictor) => predictor.predict(payload).map(RouteResponse::Prediction),
            Err(err @ ScoringError::UnknownModule(_)) => {
                info!(module = %module_name, "Route request for unknown module");
                Ok(RouteResponse::Error(ErrorResult {
                    error: err.to_string(),
                    module: module_name.to_string(),
                    available_modules: self.modules().into_iter().map(String::from).collect(),
                }))
            }
            Err(err) => Err(err),
        }
    }

    /// Resolve a free-form query to a module by keyword
    pub fn answer_query(&self, query: &str) -> QueryAnswer {
        let lowered = query.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let matched = INTENT_KEYWORDS
            .iter()
            .map(|(kind, keywords)| {
                let hits = words.iter().filter(|w| keywords.contains(*w)).count();
                (*kind, hits)
            })
            .filter(|(kind, hits)| *hits > 0 && self.predictors.contains_key(kind))
            .max_by_key(|(_, hits)| *hits)
            .map(|(kind, _)| kind);

        debug!(query = %query, module = ?matched, "Resolved query intent");

        match matched {
            Some(kind) => QueryAnswer {
                response: format!(
                    "Send the {} attributes to the '{}' module for a prediction.",
                    kind.module_name().replace('_', " "),
                    kind.module_name()
                ),
                module: Some(kind),
            },
            None => QueryAnswer {
                response: format!(
                    "I can help with: {}. Ask about one of these or route data to a module.",
                    self.modules().join(", ")
                ),
                module: None,
            },
        }
    }

    fn lookup(&self, module_name: &str) -> Result<&Arc<dyn Predict>> {
        DomainKind::from_module_name(module_name)
            .and_then(|kind| self.predictors.get(&kind))
            .ok_or_else(|| ScoringError::UnknownModule(module_name.to_string()))
    }
}
