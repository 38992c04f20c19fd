//! Per-domain prediction pipeline: validate, encode, score, classify

use crate::domain::{DomainKind, DomainSpec};
use crate::error::Result;
use crate::feature_encoder::{AlignedVector, FeatureEncoder};
use crate::models::artifact::ModelArtifact;
use crate::models::scorer;
use crate::types::{PredictionResult, RawAttributes};
use crate::verdict;
use std::sync::Arc;
use tracing::{debug, warn};

/// Anything that turns raw attributes into a prediction
pub trait Predict: Send + Sync {
    fn domain(&self) -> DomainKind;

    fn predict(&self, raw: &RawAttributes) -> Result<PredictionResult>;
}

/// Generic predictor, parameterized by a domain contract and a shared artifact
pub struct Predictor {
    spec: DomainSpec,
    encoder: FeatureEncoder,
    artifact: Arc<dyn ModelArtifact>,
}

impl Predictor {
    pub fn new(spec: DomainSpec, artifact: Arc<dyn ModelArtifact>) -> Self {
        let encoder = FeatureEncoder::from_spec(&spec);

        match artifact.schema() {
            Some(schema) => {
                for gap in encoder.schema_gaps(schema) {
                    warn!(
                        domain = %spec.kind,
                        model = %artifact.name(),
                        gap = %gap,
                        "Model schema does not cover a declared field"
                    );
                }
            }
            None => {
                warn!(
                    domain = %spec.kind,
                    model = %artifact.name(),
                    "Predictor running without a model schema"
                );
            }
        }

        Self {
            spec,
            encoder,
            artifact,
        }
    }

    pub fn spec(&self) -> &DomainSpec {
        &self.spec
    }

    /// Validate and encode without scoring
    pub fn encode(&self, raw: &RawAttributes) -> Result<AlignedVector> {
        self.spec.validate(raw)?;
        self.encoder.encode(raw, self.artifact.schema())
    }
}

impl Predict for Predictor {
    fn domain(&self) -> DomainKind {
        self.spec.kind
    }

    fn predict(&self, raw: &RawAttributes) -> Result<PredictionResult> {
        let vector = self.encode(raw)?;
        let probability = scorer::score(&vector, self.artifact.as_ref())?;
        let verdict = verdict::classify(probability, self.spec.kind);

        debug!(
            domain = %self.spec.kind,
            probability = probability,
            verdict = verdict.label(),
            degraded = vector.is_degraded(),
            "Prediction complete"
        );

        Ok(PredictionResult {
            domain: self.spec.kind,
            probability,
            verdict,
            recommended_action: verdict::recommended_action(&verdict),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FraudSchemaVariant;
    use crate::error::{ScoringError, ValidationError};
    use crate::feature_encoder::ModelSchema;
    use crate::models::artifact::stub::StubArtifact;
    use crate::types::{RiskCategory, Verdict};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn attrs(value: serde_json::Value) -> RawAttributes {
        serde_json::from_value(value).unwrap()
    }

    fn credit_schema() -> ModelSchema {
        let mut columns: Vec<String> = [
            "person_age",
            "person_income",
            "person_emp_length",
            "loan_percent_income",
            "cb_person_cred_hist_length",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        for home in ["MORTGAGE", "OTHER", "OWN", "RENT"] {
            columns.push(format!("person_home_ownership_{}", home));
        }
        let intents = [
            "DEBTCONSOLIDATION",
            "EDUCATION",
            "HOMEIMPROVEMENT",
            "MEDICAL",
            "PERSONAL",
            "VENTURE",
        ];
        for intent in intents {
            columns.push(format!("loan_intent_{}", intent));
        }
        for grade in ["A", "B", "C", "D", "E", "F", "G"] {
            columns.push(format!("loan_grade_{}", grade));
        }
        columns.push("cb_person_default_on_file_N".into());
        columns.push("cb_person_default_on_file_Y".into());
        ModelSchema::new(columns).unwrap()
    }

    /// Logistic score driven by loan_percent_income (column 3)
    fn credit_predictor() -> Predictor {
        let artifact = StubArtifact::new(Some(credit_schema()), |row| {
            let z = 8.0 * (row[3] as f64 - 0.3);
            let p = 1.0 / (1.0 + (-z).exp());
            vec![1.0 - p, p]
        });
        Predictor::new(DomainSpec::credit_risk(), Arc::new(artifact))
    }

    fn credit_payload() -> RawAttributes {
        attrs(json!({
            "person_age": 30,
            "person_income": 50000,
            "person_emp_length": 5,
            "loan_percent_income": 0.2,
            "cb_person_cred_hist_length": 4,
            "person_home_ownership": "RENT",
            "loan_intent": "EDUCATION",
            "loan_grade": "B",
            "cb_person_default_on_file": "N"
        }))
    }

    #[test]
    fn test_credit_scenario() {
        let result = credit_predictor().predict(&credit_payload()).unwrap();

        assert!((0.0..=1.0).contains(&result.probability));
        let expected = if result.probability > 0.7 {
            RiskCategory::High
        } else if result.probability > 0.4 {
            RiskCategory::Medium
        } else {
            RiskCategory::Low
        };
        assert_eq!(result.verdict, Verdict::CreditRisk(expected));
        assert_eq!(result.recommended_action, verdict::recommended_action(&result.verdict));
    }

    #[test]
    fn test_credit_vector_matches_schema() {
        let predictor = credit_predictor();
        let vector = predictor.encode(&credit_payload()).unwrap();

        assert_eq!(vector.columns(), credit_schema().columns());
        assert_eq!(vector.get("person_home_ownership_RENT"), Some(1.0));
        assert_eq!(vector.get("loan_intent_EDUCATION"), Some(1.0));
        assert_eq!(vector.get("loan_grade_B"), Some(1.0));
        assert_eq!(vector.get("loan_grade_A"), Some(0.0));
        assert_eq!(vector.values().iter().filter(|v| **v == 1.0).count(), 4);
    }

    #[test]
    fn test_form_strings_coerced() {
        let mut raw = credit_payload();
        raw.insert("person_income".into(), "50000".into());
        raw.insert("loan_percent_income".into(), " 0.2".into());

        let predictor = credit_predictor();
        assert_eq!(
            predictor.predict(&raw).unwrap(),
            predictor.predict(&credit_payload()).unwrap()
        );
    }

    #[test]
    fn test_bad_numeric_string_is_client_error() {
        let mut raw = credit_payload();
        raw.insert("person_age".into(), "thirty".into());

        let err = credit_predictor().predict(&raw).unwrap_err();
        assert!(err.is_client_error());
        assert!(matches!(
            err,
            ScoringError::Validation(ValidationError::TypeConversion { .. })
        ));
    }

    #[test]
    fn test_predict_is_idempotent() {
        let predictor = credit_predictor();
        let raw = credit_payload();
        let first = predictor.predict(&raw).unwrap();
        for _ in 0..5 {
            assert_eq!(predictor.predict(&raw).unwrap(), first);
        }
    }

    #[test]
    fn test_fraud_missing_amount_never_scored() {
        let artifact = Arc::new(StubArtifact::constant(None, 0.9));
        let predictor = Predictor::new(
            DomainSpec::fraud_detection(FraudSchemaVariant::Transactional),
            artifact.clone(),
        );

        let err = predictor
            .predict(&attrs(json!({
                "account_age": 3,
                "transaction_type": "transfer",
                "location": "NY"
            })))
            .unwrap_err();

        assert!(matches!(
            err,
            ScoringError::Validation(ValidationError::MissingField { .. })
        ));
        assert_eq!(artifact.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_inference_failure_propagates_unchanged() {
        let predictor = Predictor::new(
            DomainSpec::churn_prediction(),
            Arc::new(StubArtifact::failing(None)),
        );
        let err = predictor
            .predict(&attrs(json!({
                "tenure": 12,
                "MonthlyCharges": 70.5,
                "TotalCharges": 846.0,
                "SeniorCitizen": 0
            })))
            .unwrap_err();
        assert_eq!(err, ScoringError::Inference("stub failure".into()));
    }

    #[test]
    fn test_churn_degraded_mode() {
        let predictor = Predictor::new(
            DomainSpec::churn_prediction(),
            Arc::new(StubArtifact::constant(None, 0.8)),
        );
        let raw = attrs(json!({
            "tenure": "12",
            "MonthlyCharges": 70.5,
            "TotalCharges": 846.0,
            "SeniorCitizen": 1
        }));

        let vector = predictor.encode(&raw).unwrap();
        assert!(vector.is_degraded());
        assert_eq!(
            vector.columns(),
            &["tenure", "MonthlyCharges", "TotalCharges", "SeniorCitizen"]
        );

        let result = predictor.predict(&raw).unwrap();
        assert_eq!(result.recommended_action, "Send personalized offer");
    }
}
