//! Per-domain input contracts
//!
//! Each predictor validates its payload against a [`DomainSpec`] before the
//! encoder runs: required fields must be present and non-null, and a fraud
//! payload shaped for the other schema variant is rejected outright.

use crate::error::{Result, ScoringError, ValidationError};
use crate::types::RawAttributes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three scoring domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    CreditRisk,
    FraudDetection,
    ChurnPrediction,
}

impl DomainKind {
    pub const ALL: [DomainKind; 3] = [
        DomainKind::CreditRisk,
        DomainKind::FraudDetection,
        DomainKind::ChurnPrediction,
    ];

    /// Module name used by the router and the request subjects
    pub fn module_name(&self) -> &'static str {
        match self {
            DomainKind::CreditRisk => "credit_risk",
            DomainKind::FraudDetection => "fraud_detection",
            DomainKind::ChurnPrediction => "churn_prediction",
        }
    }

    pub fn from_module_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.module_name() == name)
    }
}

impl fmt::Display for DomainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.module_name())
    }
}

/// Which fraud training data the deployed fraud model was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FraudSchemaVariant {
    /// transaction_amount, account_age, transaction_type, location
    #[default]
    Transactional,
    /// Time, V1..V28, Amount (PCA-anonymized card data)
    Anonymized,
}

impl FraudSchemaVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            FraudSchemaVariant::Transactional => "transactional",
            FraudSchemaVariant::Anonymized => "anonymized",
        }
    }

    fn other(&self) -> Self {
        match self {
            FraudSchemaVariant::Transactional => FraudSchemaVariant::Anonymized,
            FraudSchemaVariant::Anonymized => FraudSchemaVariant::Transactional,
        }
    }

    fn numeric_fields(&self) -> Vec<String> {
        match self {
            FraudSchemaVariant::Transactional => names(&["transaction_amount", "account_age"]),
            FraudSchemaVariant::Anonymized => {
                let mut fields = vec!["Time".to_string()];
                fields.extend((1..=28).map(|i| format!("V{}", i)));
                fields.push("Amount".to_string());
                fields
            }
        }
    }

    fn categorical_fields(&self) -> Vec<String> {
        match self {
            FraudSchemaVariant::Transactional => names(&["transaction_type", "location"]),
            FraudSchemaVariant::Anonymized => Vec::new(),
        }
    }
}

/// Required-field contract for one domain
#[derive(Debug, Clone, PartialEq)]
pub struct DomainSpec {
    pub kind: DomainKind,
    /// Declared-numeric fields, coerced to f64 before encoding
    pub numeric_fields: Vec<String>,
    /// Fields expanded into `{field}_{value}` indicator columns
    pub categorical_fields: Vec<String>,
    /// Fields whose presence signals a payload built for another schema
    conflicting_fields: Vec<String>,
    variant: Option<FraudSchemaVariant>,
}

impl DomainSpec {
    /// Contract for a domain, using `fraud_variant` for the fraud model
    pub fn for_domain(kind: DomainKind, fraud_variant: FraudSchemaVariant) -> Self {
        match kind {
            DomainKind::CreditRisk => Self::credit_risk(),
            DomainKind::FraudDetection => Self::fraud_detection(fraud_variant),
            DomainKind::ChurnPrediction => Self::churn_prediction(),
        }
    }

    pub fn credit_risk() -> Self {
        Self {
            kind: DomainKind::CreditRisk,
            numeric_fields: names(&[
                "person_age",
                "person_income",
                "person_emp_length",
                "loan_percent_income",
                "cb_person_cred_hist_length",
            ]),
            categorical_fields: names(&[
                "person_home_ownership",
                "loan_intent",
                "loan_grade",
                "cb_person_default_on_file",
            ]),
            conflicting_fields: Vec::new(),
            variant: None,
        }
    }

    pub fn fraud_detection(variant: FraudSchemaVariant) -> Self {
        let other = variant.other();
        let own: Vec<String> = variant
            .numeric_fields()
            .into_iter()
            .chain(variant.categorical_fields())
            .collect();
        let conflicting_fields = other
            .numeric_fields()
            .into_iter()
            .chain(other.categorical_fields())
            .filter(|field| !own.contains(field))
            .collect();

        Self {
            kind: DomainKind::FraudDetection,
            numeric_fields: variant.numeric_fields(),
            categorical_fields: variant.categorical_fields(),
            conflicting_fields,
            variant: Some(variant),
        }
    }

    pub fn churn_prediction() -> Self {
        Self {
            kind: DomainKind::ChurnPrediction,
            numeric_fields: names(&["tenure", "MonthlyCharges", "TotalCharges", "SeniorCitizen"]),
            categorical_fields: Vec::new(),
            conflicting_fields: Vec::new(),
            variant: None,
        }
    }

    /// Pre-validation run before any encoding
    pub fn validate(&self, raw: &RawAttributes) -> Result<()> {
        if let Some(variant) = self.variant {
            if self.conflicting_fields.iter().any(|f| raw.contains_key(f)) {
                return Err(ValidationError::SchemaVariantMismatch {
                    expected: variant.as_str(),
                    found: variant.other().as_str(),
                }
                .into());
            }
        }

        for field in self.required_fields() {
            match raw.get(field) {
                Some(value) if !value.is_null() => {}
                _ => return Err(ScoringError::missing_field(field)),
            }
        }
        Ok(())
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.numeric_fields
            .iter()
            .chain(self.categorical_fields.iter())
            .map(String::as_str)
    }
}

fn names(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}
