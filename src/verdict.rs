//! Verdict policy: probability to discrete decision.
//!
//! Every rule is a monotone step function of the probability. Comparisons are
//! strict, so a probability exactly on a threshold takes the lower-risk branch.

use crate::domain::DomainKind;
use crate::types::prediction::{ChurnVerdict, FraudVerdict, RiskCategory, Verdict};

/// Credit risk above this is `High`
pub const CREDIT_HIGH_THRESHOLD: f64 = 0.7;
/// Credit risk above this (and not High) is `Medium`
pub const CREDIT_MEDIUM_THRESHOLD: f64 = 0.4;
/// Fraud probability above this raises an alert
pub const FRAUD_ALERT_THRESHOLD: f64 = 0.5;
/// Churn probability above this triggers a retention offer
pub const CHURN_OFFER_THRESHOLD: f64 = 0.5;

pub const CREDIT_HIGH_ACTION: &str = "Decline or refer for manual underwriting";
pub const CREDIT_MEDIUM_ACTION: &str = "Approve with additional verification";
pub const CREDIT_LOW_ACTION: &str = "Approve";
pub const FRAUD_ALERT_ACTION: &str = "Review transaction";
pub const FRAUD_CLEAR_ACTION: &str = "No action needed";
pub const CHURN_OFFER_ACTION: &str = "Send personalized offer";
pub const CHURN_RETAIN_ACTION: &str = "Maintain engagement";

pub fn classify(p: f64, domain: DomainKind) -> Verdict {
    match domain {
        DomainKind::CreditRisk => Verdict::CreditRisk(credit_category(p)),
        DomainKind::FraudDetection => Verdict::Fraud(FraudVerdict {
            alert: p > FRAUD_ALERT_THRESHOLD,
        }),
        DomainKind::ChurnPrediction => Verdict::Churn(ChurnVerdict {
            at_risk: p > CHURN_OFFER_THRESHOLD,
        }),
    }
}

fn credit_category(p: f64) -> RiskCategory {
    if p > CREDIT_HIGH_THRESHOLD {
        RiskCategory::High
    } else if p > CREDIT_MEDIUM_THRESHOLD {
        RiskCategory::Medium
    } else {
        RiskCategory::Low
    }
}

/// Human-readable next step for a verdict
pub fn recommended_action(verdict: &Verdict) -> &'static str {
    match verdict {
        Verdict::CreditRisk(RiskCategory::High) => CREDIT_HIGH_ACTION,
        Verdict::CreditRisk(RiskCategory::Medium) => CREDIT_MEDIUM_ACTION,
        Verdict::CreditRisk(RiskCategory::Low) => CREDIT_LOW_ACTION,
        Verdict::Fraud(FraudVerdict { alert: true }) => FRAUD_ALERT_ACTION,
        Verdict::Fraud(FraudVerdict { alert: false }) => FRAUD_CLEAR_ACTION,
        Verdict::Churn(ChurnVerdict { at_risk: true }) => CHURN_OFFER_ACTION,
        Verdict::Churn(ChurnVerdict { at_risk: false }) => CHURN_RETAIN_ACTION,
    }
}
