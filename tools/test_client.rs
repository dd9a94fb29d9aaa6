//! Test Prediction Client
//!
//! Sends random form submissions to the prediction service over NATS
//! request-reply and tallies the replies.

use heart_risk_serving::schema::fields::{
    CHEST_PAIN, EXERCISE_ANGINA, FASTING_BLOOD_SUGAR, RESTING_ECG, SEX, ST_SLOPE, THALASSEMIA,
};
use heart_risk_serving::schema::form::example_records;
use heart_risk_serving::types::{PredictionResponse, RawRecord, ResponseStatus};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Random submission generator
struct SubmissionGenerator {
    rng: rand::rngs::ThreadRng,
}

impl SubmissionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// A submission that passes every schema check
    fn generate_valid(&mut self) -> RawRecord {
        // oldpeak moves in steps of 0.1
        let oldpeak = self.rng.gen_range(0..=62) as f64 / 10.0;

        RawRecord::new()
            .with("age", self.rng.gen_range(29..=80))
            .with("sex", self.random_choice(SEX))
            .with("cp", self.random_choice(CHEST_PAIN))
            .with("trestbps", self.rng.gen_range(90..=200))
            .with("chol", self.rng.gen_range(100..=600))
            .with("fbs", self.random_choice(FASTING_BLOOD_SUGAR))
            .with("restecg", self.random_choice(RESTING_ECG))
            .with("thalach", self.rng.gen_range(60..=220))
            .with("exang", self.random_choice(EXERCISE_ANGINA))
            .with("oldpeak", oldpeak)
            .with("slope", self.random_choice(ST_SLOPE))
            .with("ca", self.rng.gen_range(0..=3))
            .with("thal", self.random_choice(THALASSEMIA))
    }

    /// A submission the service must reject
    fn generate_invalid(&mut self) -> RawRecord {
        let record = self.generate_valid();
        match self.rng.gen_range(0..4) {
            0 => record.with("sex", "Other"),
            1 => record.with("age", self.rng.gen_range(81..120)),
            2 => record.with("ca", 1.5),
            _ => {
                let mut record = record;
                record.remove("thal");
                record
            }
        }
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

    info!("Starting Test Prediction Client");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("heart.predict");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let invalid_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        invalid_rate = invalid_rate,
        delay_ms = delay_ms,
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
            return run_dry_mode(count, invalid_rate, delay_ms).await;
        }
    };

    let mut generator = SubmissionGenerator::new();
    let mut rng = rand::thread_rng();

    // The shipped examples go first so their verdicts can be eyeballed
    let mut submissions: Vec<RawRecord> = example_records();

    info!("Starting to send {} submissions...", count);

    let mut ok_count = 0;
    let mut rejected_count = 0;
    let mut failed_count = 0;

    for i in 0..count {
        let record = if let Some(example) = submissions.pop() {
            example
        } else if rng.gen_bool(invalid_rate) {
            generator.generate_invalid()
        } else {
            generator.generate_valid()
        };

        let payload = serde_json::to_vec(&record)?;
        let reply = client.request(subject.to_string(), payload.into()).await?;
        let response: PredictionResponse = serde_json::from_slice(&reply.payload)?;

        match response.status {
            ResponseStatus::Ok => {
                ok_count += 1;
                info!(
                    message = ?response.message,
                    confidence = ?response.confidence,
                    "Prediction"
                );
            }
            ResponseStatus::Rejected => {
                rejected_count += 1;
                info!(
                    kind = ?response.error_kind,
                    error = ?response.error,
                    "Rejected"
                );
            }
            ResponseStatus::Failed => {
                failed_count += 1;
                warn!(error = ?response.error, "Service failed");
            }
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} submissions ({} ok, {} rejected, {} failed)",
                i + 1,
                count,
                ok_count,
                rejected_count,
                failed_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} submissions ({} ok, {} rejected, {} failed)",
        count, ok_count, rejected_count, failed_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, invalid_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = SubmissionGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let record = if rng.gen_bool(invalid_rate) {
            generator.generate_invalid()
        } else {
            generator.generate_valid()
        };

        let json = serde_json::to_string_pretty(&record)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample submission {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
