//! ONNX artifact and schema sidecar loader

use crate::config::ModelsConfig;
use crate::domain::DomainKind;
use crate::error::ScoringError;
use crate::feature_encoder::ModelSchema;
use crate::models::onnx::OnnxArtifact;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::ValueType;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Loaded ONNX session with its tensor names
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the model
    pub input_name: String,
    /// Output name for probabilities
    pub output_name: String,
    /// Static feature dimension of the input, when the graph declares one
    pub input_width: Option<usize>,
}

/// Sidecar layouts accepted for the training column list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SchemaFile {
    Described { feature_names: Vec<String> },
    Bare(Vec<String>),
}

/// Loader for ONNX models and their declared schemas
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Result<Self> {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load a single ONNX model from file
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<LoadedModel> {
        let path = path.as_ref();

        info!(
            model = %name,
            path = %path.display(),
            threads = self.onnx_threads,
            "Loading ONNX model"
        );

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input = session
            .inputs
            .first()
            .with_context(|| format!("Model {} declares no inputs", name))?;
        let input_name = input.name.clone();
        let input_width = match &input.input_type {
            ValueType::Tensor { shape, .. } => shape
                .last()
                .copied()
                .filter(|dim| *dim > 0)
                .map(|dim| dim as usize),
            _ => None,
        };

        // Prefer the probability output; the label output is never scored.
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.iter().find(|o| !o.name.contains("label")))
            .map(|o| o.name.clone())
            .with_context(|| format!("Model {} declares no probability output", name))?;

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            input_width = ?input_width,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            input_name,
            output_name,
            input_width,
        })
    }

    /// Load the model and schema configured for one domain
    pub fn load_artifact(&self, config: &ModelsConfig, kind: DomainKind) -> Result<OnnxArtifact> {
        let model = self.load_model(config.model_path(kind), kind.module_name())?;

        let schema = load_schema(config.schema_path(kind))?;
        let schema = resolve_schema(schema, kind.module_name(), config.allow_schema_fallback)?;
        if let Some(schema) = &schema {
            check_input_width(schema, model.input_width, kind.module_name())?;
            info!(model = %kind, columns = schema.len(), "Model schema loaded");
        }

        Ok(OnnxArtifact::new(model, schema))
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}

/// Read a schema sidecar; `Ok(None)` when the file does not exist
pub fn load_schema<P: AsRef<Path>>(path: P) -> Result<Option<ModelSchema>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {}", path.display()))?;
    let columns = match serde_json::from_str::<SchemaFile>(&raw)
        .with_context(|| format!("Failed to parse schema file {}", path.display()))?
    {
        SchemaFile::Described { feature_names } => feature_names,
        SchemaFile::Bare(columns) => columns,
    };

    Ok(Some(ModelSchema::new(columns)?))
}

/// Apply the schema-fallback policy to a possibly missing schema
pub fn resolve_schema(
    schema: Option<ModelSchema>,
    model: &str,
    allow_fallback: bool,
) -> std::result::Result<Option<ModelSchema>, ScoringError> {
    match schema {
        Some(schema) => Ok(Some(schema)),
        None if allow_fallback => {
            warn!(
                model = %model,
                "No declared schema, serving in degraded pass-through mode"
            );
            Ok(None)
        }
        None => Err(ScoringError::SchemaMismatch(format!(
            "model {} has no declared schema",
            model
        ))),
    }
}

/// Reject schemas whose width disagrees with the model's input dimension
pub fn check_input_width(
    schema: &ModelSchema,
    input_width: Option<usize>,
    model: &str,
) -> std::result::Result<(), ScoringError> {
    match input_width {
        Some(width) if width != schema.len() => Err(ScoringError::SchemaMismatch(format!(
            "model {} expects {} input features but its schema lists {} columns",
            model,
            width,
            schema.len()
        ))),
        _ => Ok(()),
    }
}
