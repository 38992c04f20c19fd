//! Prediction results and verdicts returned to callers

use crate::domain::DomainKind;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Credit risk category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "Low",
            RiskCategory::Medium => "Medium",
            RiskCategory::High => "High",
        }
    }
}

/// Fraud decision.
///
/// The alert flag and the dashboard status string are both views of this one
/// value, so they cannot disagree at the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FraudVerdict {
    pub alert: bool,
}

impl FraudVerdict {
    pub fn status(&self) -> &'static str {
        if self.alert {
            "Fraud"
        } else {
            "Not Fraud"
        }
    }
}

/// Churn decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChurnVerdict {
    pub at_risk: bool,
}

/// Discrete decision derived from a probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    CreditRisk(RiskCategory),
    Fraud(FraudVerdict),
    Churn(ChurnVerdict),
}

impl Verdict {
    /// Ordinal severity, higher means riskier
    pub fn severity(&self) -> u8 {
        match self {
            Verdict::CreditRisk(category) => *category as u8,
            Verdict::Fraud(fraud) => fraud.alert as u8,
            Verdict::Churn(churn) => churn.at_risk as u8,
        }
    }

    /// Short label used for logging and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::CreditRisk(category) => category.as_str(),
            Verdict::Fraud(fraud) => fraud.status(),
            Verdict::Churn(churn) => {
                if churn.at_risk {
                    "At Risk"
                } else {
                    "Retained"
                }
            }
        }
    }
}

/// Unit returned by every predictor
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub domain: DomainKind,
    /// Positive-class probability (0.0 - 1.0)
    pub probability: f64,
    pub verdict: Verdict,
    pub recommended_action: &'static str,
}

impl PredictionResult {
    /// Flat field mapping in the shape callers and dashboards expect
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        match self.verdict {
            Verdict::CreditRisk(category) => {
                fields.insert("risk_score".into(), self.probability.into());
                fields.insert("risk_category".into(), category.as_str().into());
                fields.insert("recommended_action".into(), self.recommended_action.into());
            }
            Verdict::Fraud(fraud) => {
                fields.insert("fraud_probability".into(), self.probability.into());
                fields.insert("fraud_status".into(), fraud.status().into());
                fields.insert("fraud_alert".into(), fraud.alert.into());
                fields.insert("recommended_action".into(), self.recommended_action.into());
            }
            Verdict::Churn(churn) => {
                fields.insert("churn_probability".into(), self.probability.into());
                fields.insert("retention_strategy".into(), self.recommended_action.into());
                fields.insert("churn_risk".into(), churn.at_risk.into());
            }
        }
        fields
    }
}

impl Serialize for PredictionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_fields().serialize(serializer)
    }
}

/// Structured answer for a request the router could not place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub error: String,
    pub module: String,
    pub available_modules: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_fields() {
        let result = PredictionResult {
            domain: DomainKind::CreditRisk,
            probability: 0.82,
            verdict: Verdict::CreditRisk(RiskCategory::High),
            recommended_action: "Decline or refer for manual underwriting",
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["risk_score"], 0.82);
        assert_eq!(json["risk_category"], "High");
        assert!(json.get("fraud_status").is_none());
    }

    #[test]
    fn test_fraud_fields_share_one_decision() {
        for alert in [true, false] {
            let result = PredictionResult {
                domain: DomainKind::FraudDetection,
                probability: if alert { 0.9 } else { 0.1 },
                verdict: Verdict::Fraud(FraudVerdict { alert }),
                recommended_action: "n/a",
            };
            let fields = result.to_fields();
            assert_eq!(fields["fraud_alert"], alert);
            assert_eq!(fields["fraud_status"] == "Fraud", alert);
        }
    }

    #[test]
    fn test_output_is_flat() {
        let result = PredictionResult {
            domain: DomainKind::ChurnPrediction,
            probability: 0.3,
            verdict: Verdict::Churn(ChurnVerdict { at_risk: false }),
            recommended_action: "Maintain engagement",
        };
        assert!(result
            .to_fields()
            .values()
            .all(|v| !v.is_object() && !v.is_array()));
    }

    #[test]
    fn test_risk_category_ordering() {
        assert!(RiskCategory::Low < RiskCategory::Medium);
        assert!(RiskCategory::Medium < RiskCategory::High);
    }
}
