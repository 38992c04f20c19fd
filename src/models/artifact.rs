//! Trained classifier seam

use crate::error::Result;
use crate::feature_encoder::ModelSchema;

/// Per-class probabilities for one row, indexed by class id
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDistribution {
    probabilities: Vec<f64>,
}

impl ClassDistribution {
    pub fn new(probabilities: Vec<f64>) -> Self {
        Self { probabilities }
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn num_classes(&self) -> usize {
        self.probabilities.len()
    }
}

/// A read-only trained binary classifier plus its declared input columns.
///
/// Implementations are shared across concurrent requests and must not expose
/// any way to change the schema after construction.
pub trait ModelArtifact: Send + Sync {
    /// Artifact name for logs
    fn name(&self) -> &str;

    /// Declared input columns, if the artifact carries them
    fn schema(&self) -> Option<&ModelSchema>;

    /// Run inference on a single-row batch
    fn predict_proba(&self, row: &[f32]) -> Result<ClassDistribution>;
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use crate::error::ScoringError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type ProbaFn = Box<dyn Fn(&[f32]) -> Vec<f64> + Send + Sync>;

    /// Deterministic in-memory artifact for tests
    pub struct StubArtifact {
        name: String,
        schema: Option<ModelSchema>,
        proba: ProbaFn,
        fail: bool,
        pub calls: AtomicUsize,
    }

    impl StubArtifact {
        pub fn new(
            schema: Option<ModelSchema>,
            proba: impl Fn(&[f32]) -> Vec<f64> + Send + Sync + 'static,
        ) -> Self {
            Self {
                name: "stub".to_string(),
                schema,
                proba: Box::new(proba),
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        /// Artifact that always returns `[1 - p, p]`
        pub fn constant(schema: Option<ModelSchema>, p: f64) -> Self {
            Self::new(schema, move |_| vec![1.0 - p, p])
        }

        pub fn failing(schema: Option<ModelSchema>) -> Self {
            let mut stub = Self::constant(schema, 0.5);
            stub.fail = true;
            stub
        }
    }

    impl ModelArtifact for StubArtifact {
        fn name(&self) -> &str {
            &self.name
        }

        fn schema(&self) -> Option<&ModelSchema> {
            self.schema.as_ref()
        }

        fn predict_proba(&self, row: &[f32]) -> Result<ClassDistribution> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(ScoringError::Inference("stub failure".to_string()));
            }
            Ok(ClassDistribution::new((self.proba)(row)))
        }
    }
}
