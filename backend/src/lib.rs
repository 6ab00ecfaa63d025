pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod ranking;
pub mod routes;

pub use config::ServerConfig;
pub use error::{ApiError, InferenceError, ModelLoadError, SchemaValidationError};
pub use inference::{Classifier, ModelHost, ModelSource, OnnxClassifier};
pub use models::{CropRecommendation, FeatureVector, PredictionResponse};
