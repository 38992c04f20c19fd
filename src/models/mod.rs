//! Model artifacts, loading and scoring

pub mod artifact;
pub mod loader;
pub mod onnx;
pub mod scorer;

pub use artifact::{ClassDistribution, ModelArtifact};
pub use loader::ModelLoader;
pub use onnx::OnnxArtifact;
pub use scorer::score;
