//! ONNX Runtime backed model artifact

use crate::error::{Result, ScoringError};
use crate::feature_encoder::ModelSchema;
use crate::models::artifact::{ClassDistribution, ModelArtifact};
use crate::models::loader::LoadedModel;
use ort::memory::Allocator;
use ort::session::{Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::fmt::Display;
use std::sync::Mutex;
use tracing::debug;

/// Trained classifier served through ONNX Runtime.
///
/// `Session::run` needs exclusive access, so each artifact serializes its own
/// inference calls. The schema sits outside the lock and is never mutated.
pub struct OnnxArtifact {
    name: String,
    input_name: String,
    output_name: String,
    schema: Option<ModelSchema>,
    session: Mutex<Session>,
}

impl OnnxArtifact {
    pub fn new(model: LoadedModel, schema: Option<ModelSchema>) -> Self {
        Self {
            name: model.name,
            input_name: model.input_name,
            output_name: model.output_name,
            schema,
            session: Mutex::new(model.session),
        }
    }

    /// Extract class probabilities from the model outputs.
    ///
    /// Handles tensor outputs (XGBoost, Random Forest) and seq(map) outputs
    /// (sklearn converters, CatBoost, LightGBM).
    fn extract_distribution(&self, outputs: &SessionOutputs) -> Result<ClassDistribution> {
        if let Some(output) = outputs.get(self.output_name.as_str()) {
            return self.decode_output(output);
        }

        if let Some((name, output)) = outputs.iter().find(|(name, _)| !name.contains("label")) {
            debug!(
                model = %self.name,
                output = %name,
                "Probability output not found by name, trying fallback"
            );
            return self.decode_output(&output);
        }

        Err(ScoringError::Inference(format!(
            "{} produced no probability output",
            self.name
        )))
    }

    fn decode_output(&self, output: &DynValue) -> Result<ClassDistribution> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            return distribution_from_tensor(&dims, data);
        }

        let dtype = output.dtype();
        if DynSequenceValueType::can_downcast(&dtype) {
            return self.extract_from_sequence_map(output);
        }

        Err(ScoringError::Inference(format!(
            "{} output has unsupported type {:?}",
            self.name, dtype
        )))
    }

    /// Extract probabilities from seq(map(int64, float)) format
    fn extract_from_sequence_map(&self, output: &DynValue) -> Result<ClassDistribution> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(inference_error)?;
        let maps = sequence
            .try_extract_sequence::<DynMapValueType>(&allocator)
            .map_err(inference_error)?;

        // Single-row batch: exactly one map
        if maps.len() != 1 {
            return Err(ScoringError::Inference(format!(
                "{} returned {} rows for a single-row batch",
                self.name,
                maps.len()
            )));
        }

        let pairs = maps[0]
            .try_extract_key_values::<i64, f32>()
            .map_err(inference_error)?;
        distribution_from_class_map(&pairs)
    }
}

impl ModelArtifact for OnnxArtifact {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> Option<&ModelSchema> {
        self.schema.as_ref()
    }

    fn predict_proba(&self, row: &[f32]) -> Result<ClassDistribution> {
        let shape = vec![1_i64, row.len() as i64];
        let input = Tensor::from_array((shape, row.to_vec())).map_err(inference_error)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ScoringError::Inference(format!("{} session lock poisoned", self.name)))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(inference_error)?;

        self.extract_distribution(&outputs)
    }
}

fn inference_error(e: impl Display) -> ScoringError {
    ScoringError::Inference(e.to_string())
}

/// Class probabilities from a `[1, n]` or `[n]` tensor
pub fn distribution_from_tensor(dims: &[i64], data: &[f32]) -> Result<ClassDistribution> {
    let num_classes = match dims {
        [1, n] | [n] if *n > 0 => *n as usize,
        _ => {
            return Err(ScoringError::Inference(format!(
                "unexpected probability tensor shape {:?}",
                dims
            )))
        }
    };

    if data.len() != num_classes {
        return Err(ScoringError::Inference(format!(
            "probability tensor holds {} values for {} classes",
            data.len(),
            num_classes
        )));
    }

    Ok(ClassDistribution::new(data.iter().map(|&p| p as f64).collect()))
}

/// Class probabilities from `(class_id, probability)` pairs with ids `0..n`
pub fn distribution_from_class_map(pairs: &[(i64, f32)]) -> Result<ClassDistribution> {
    let mut probabilities = vec![f64::NAN; pairs.len()];
    for &(class_id, p) in pairs {
        let slot = usize::try_from(class_id)
            .ok()
            .and_then(|i| probabilities.get_mut(i))
            .ok_or_else(|| {
                ScoringError::Inference(format!("unexpected class id {} in model output", class_id))
            })?;
        *slot = p as f64;
    }

    if probabilities.iter().any(|p| p.is_nan()) {
        return Err(ScoringError::Inference(
            "model output is missing a class probability".to_string(),
        ));
    }
    Ok(ClassDistribution::new(probabilities))
}
