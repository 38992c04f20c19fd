//! Positive-class probability extraction

use crate::error::{Result, ScoringError};
use crate::feature_encoder::AlignedVector;
use crate::models::artifact::ModelArtifact;
use tracing::{debug, error};

/// Probabilities may drift this far outside [0, 1] from float rounding
const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Index of the positive class in a binary distribution
pub const POSITIVE_CLASS: usize = 1;

/// Score an aligned row, returning the positive-class probability.
///
/// The artifact must return exactly two finite class probabilities; any
/// other shape is an inference error, never a default score.
pub fn score(vector: &AlignedVector, artifact: &dyn ModelArtifact) -> Result<f64> {
    let distribution = artifact.predict_proba(vector.values()).map_err(|e| {
        error!(model = %artifact.name(), error = %e, "Model inference failed");
        e
    })?;

    if distribution.num_classes() != 2 {
        let err = ScoringError::Inference(format!(
            "{} returned {} class probabilities, expected a binary distribution",
            artifact.name(),
            distribution.num_classes()
        ));
        error!(model = %artifact.name(), error = %err, "Unexpected model output shape");
        return Err(err);
    }

    let p = distribution.probabilities()[POSITIVE_CLASS];
    if !p.is_finite() || p < -PROBABILITY_TOLERANCE || p > 1.0 + PROBABILITY_TOLERANCE {
        let err = ScoringError::Inference(format!(
            "{} returned probability {} outside [0, 1]",
            artifact.name(),
            p
        ));
        error!(model = %artifact.name(), error = %err, "Invalid model probability");
        return Err(err);
    }

    let p = p.clamp(0.0, 1.0);
    debug!(model = %artifact.name(), probability = p, "Scored row");
    Ok(p)
}
