//! Test Scoring Client
//!
//! Generates random credit, fraud and churn payloads and sends them to the
//! scoring service over NATS request/reply, logging each reply.

use rand::Rng;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

/// Payload generator for all three scoring subjects
struct PayloadGenerator {
    rng: rand::rngs::ThreadRng,
    anonymized_fraud: bool,
}

impl PayloadGenerator {
    fn new(anonymized_fraud: bool) -> Self {
        Self {
            rng: rand::thread_rng(),
            anonymized_fraud,
        }
    }

    /// Pick a subject suffix and build a matching payload
    fn next(&mut self) -> (&'static str, Value) {
        match self.rng.gen_range(0..4) {
            0 => ("credit_risk", self.credit_applicant()),
            1 => ("fraud_detection", self.fraud_transaction()),
            2 => ("churn_prediction", self.churn_customer()),
            _ => ("route", self.routed()),
        }
    }

    fn credit_applicant(&mut self) -> Value {
        let income: u32 = self.rng.gen_range(12_000..200_000);
        let loan: u32 = self.rng.gen_range(1_000..35_000);
        json!({
            "person_age": self.rng.gen_range(20..70),
            "person_income": income,
            "person_emp_length": self.rng.gen_range(0..30),
            "loan_percent_income": ((loan as f64 / income as f64) * 100.0).round() / 100.0,
            "cb_person_cred_hist_length": self.rng.gen_range(2..30),
            "person_home_ownership": self.random_choice(&["RENT", "OWN", "MORTGAGE", "OTHER"]),
            "loan_intent": self.random_choice(&[
                "EDUCATION",
                "MEDICAL",
                "VENTURE",
                "PERSONAL",
                "DEBTCONSOLIDATION",
                "HOMEIMPROVEMENT",
            ]),
            "loan_grade": self.random_choice(&["A", "B", "C", "D", "E", "F", "G"]),
            "cb_person_default_on_file": self.random_choice(&["Y", "N"]),
        })
    }

    fn fraud_transaction(&mut self) -> Value {
        if self.anonymized_fraud {
            let mut payload = serde_json::Map::new();
            payload.insert("Time".into(), json!(self.rng.gen_range(0.0..172_800.0f64).round()));
            for i in 1..=28 {
                payload.insert(format!("V{}", i), json!(self.rng.gen_range(-3.0..3.0f64)));
            }
            payload.insert("Amount".into(), json!(self.rng.gen_range(0.5..2_500.0f64)));
            return Value::Object(payload);
        }

        // Form-style strings for some numeric fields
        let amount = self.rng.gen_range(1.0..5_000.0f64);
        json!({
            "transaction_amount": format!("{:.2}", amount),
            "account_age": self.rng.gen_range(1..3_650),
            "transaction_type": self
                .random_choice(&["purchase", "transfer", "withdrawal", "payment"]),
            "location": self.random_choice(&["NY", "CA", "TX", "FL", "WA"]),
        })
    }

    fn churn_customer(&mut self) -> Value {
        let tenure: u32 = self.rng.gen_range(0..72);
        let monthly = self.rng.gen_range(18.0..120.0f64);
        json!({
            "tenure": tenure,
            "MonthlyCharges": (monthly * 100.0).round() / 100.0,
            "TotalCharges": ((monthly * tenure as f64) * 100.0).round() / 100.0,
            "SeniorCitizen": if self.rng.gen_bool(0.16) { 1 } else { 0 },
        })
    }

    /// Routed request, occasionally to a module that does not exist
    fn routed(&mut self) -> Value {
        if self.rng.gen_bool(0.1) {
            return json!({ "module": "mortgage_pricing", "data": {} });
        }
        json!({ "module": "churn_prediction", "data": self.churn_customer() })
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_client=info".parse()?),
        )
        .init();

    info!("Starting Test Scoring Client");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let prefix = args.get(2).map(|s| s.as_str()).unwrap_or("scoring");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let delay_ms: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(100);
    let anonymized_fraud = args.get(5).map(|s| s == "anonymized").unwrap_or(false);

    info!(
        nats_url = %nats_url,
        prefix = %prefix,
        count = count,
        delay_ms = delay_ms,
        anonymized_fraud = anonymized_fraud,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, delay_ms, anonymized_fraud).await;
        }
    };

    let mut generator = PayloadGenerator::new(anonymized_fraud);
    let mut ok_count = 0;
    let mut failed_count = 0;

    info!("Starting to send {} requests...", count);

    for i in 0..count {
        let (suffix, payload) = generator.next();
        let subject = format!("{}.{}", prefix, suffix);
        let body = serde_json::to_vec(&payload)?;

        match client.request(subject.clone(), body.into()).await {
            Ok(reply) => {
                let envelope: Value = serde_json::from_slice(&reply.payload)?;
                let status = envelope["status"].as_u64().unwrap_or_default();
                if status == 200 {
                    ok_count += 1;
                } else {
                    failed_count += 1;
                }
                info!(
                    subject = %subject,
                    status = status,
                    body = %envelope["body"],
                    "Reply received"
                );
            }
            Err(e) => {
                failed_count += 1;
                warn!(subject = %subject, error = %e, "Request failed");
            }
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} requests ({} ok, {} failed)",
                i + 1,
                count,
                ok_count,
                failed_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} requests ({} ok, {} failed)",
        count, ok_count, failed_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, delay_ms: u64, anonymized_fraud: bool) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = PayloadGenerator::new(anonymized_fraud);

    for i in 0..count {
        let (suffix, payload) = generator.next();
        let json = serde_json::to_string_pretty(&payload)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample {} request {}:\n{}", suffix, i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
