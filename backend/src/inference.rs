use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use tract_onnx::prelude::*;

use crate::error::{InferenceError, ModelLoadError};
use crate::models::{FeatureVector, ModelInfo, FEATURE_NAMES};
use crate::ranking::ClassProbability;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A multi-class probabilistic classifier over the seven crop features.
pub trait Classifier: Send + Sync {
    /// Class labels, in the column order of `predict_proba`'s output.
    fn classes(&self) -> &[String];

    /// One probability per class for a single feature row.
    fn predict_proba(&self, features: &[f32; 7]) -> Result<Vec<f32>, InferenceError>;
}

/// Where the model artifact lives and how to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSource {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    /// Graph node holding the class probabilities. `None` keeps the graph's own outputs.
    pub output: Option<String>,
}

/// An ONNX classifier run through tract, with labels from a sidecar JSON file.
pub struct OnnxClassifier {
    plan: OnnxPlan,
    classes: Vec<String>,
}

impl OnnxClassifier {
    pub fn load(source: &ModelSource) -> Result<Self, ModelLoadError> {
        if !source.model_path.is_file() {
            return Err(ModelLoadError::Missing {
                path: source.model_path.clone(),
            });
        }

        let classes = load_labels(&source.labels_path)?;
        let plan = build_plan(&source.model_path, source.output.as_deref()).map_err(|e| {
            ModelLoadError::Corrupt {
                path: source.model_path.clone(),
                reason: format!("{e:#}"),
            }
        })?;

        let classifier = Self { plan, classes };

        let row = classifier
            .predict_proba(&[0.0; 7])
            .map_err(ModelLoadError::WarmUp)?;
        if row.len() != classifier.classes.len() {
            return Err(ModelLoadError::LabelMismatch {
                labels: classifier.classes.len(),
                outputs: row.len(),
            });
        }

        Ok(classifier)
    }
}

fn build_plan(path: &Path, output: Option<&str>) -> TractResult<OnnxPlan> {
    let mut model = tract_onnx::onnx()
        .model_for_path(path)?
        .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 7)))?;

    if let Some(name) = output {
        model.set_output_names([name])?;
    }

    model.into_optimized()?.into_runnable()
}

fn load_labels(path: &Path) -> Result<Vec<String>, ModelLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| ModelLoadError::LabelsIo {
        path: path.to_path_buf(),
        source,
    })?;

    let labels: Vec<String> =
        serde_json::from_str(&raw).map_err(|source| ModelLoadError::LabelsFormat {
            path: path.to_path_buf(),
            source,
        })?;

    if labels.is_empty() {
        return Err(ModelLoadError::NoClasses {
            path: path.to_path_buf(),
        });
    }

    Ok(labels)
}

impl Classifier for OnnxClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f32; 7]) -> Result<Vec<f32>, InferenceError> {
        let input = Tensor::from_shape(&[1, 7], &features[..])
            .map_err(|e| InferenceError::Model(format!("{e:#}")))?;
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Model(format!("{e:#}")))?;

        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::Model("model produced no outputs".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Model(format!("{e:#}")))?;

        // Accept a single row, either batched [1, C] or flat [C].
        match view.shape() {
            [1, _] | [_] => Ok(view.iter().copied().collect()),
            shape => Err(InferenceError::OutputShape {
                shape: shape.to_vec(),
                expected: self.classes.len(),
            }),
        }
    }
}

/// Process-wide owner of the loaded classifier.
pub struct ModelHost {
    classifier: Box<dyn Classifier>,
    loaded_at: DateTime<Utc>,
}

impl ModelHost {
    pub fn new(classifier: impl Classifier + 'static) -> Self {
        Self {
            classifier: Box::new(classifier),
            loaded_at: Utc::now(),
        }
    }

    pub fn load(source: &ModelSource) -> Result<Self, ModelLoadError> {
        let classifier = OnnxClassifier::load(source)?;
        info!(
            "Model loaded from {} with {} classes",
            source.model_path.display(),
            classifier.classes().len()
        );
        Ok(Self::new(classifier))
    }

    pub fn classes(&self) -> &[String] {
        self.classifier.classes()
    }

    /// Scores one feature vector, pairing every known class with its probability.
    pub fn predict_proba(
        &self,
        features: &FeatureVector,
    ) -> Result<Vec<ClassProbability<'_>>, InferenceError> {
        if let Some(field) = features.first_non_finite() {
            return Err(InferenceError::NonFiniteFeature { field });
        }

        let classes = self.classifier.classes();
        let probabilities = self.classifier.predict_proba(&features.to_array())?;
        if probabilities.len() != classes.len() {
            return Err(InferenceError::OutputShape {
                shape: vec![probabilities.len()],
                expected: classes.len(),
            });
        }

        let scored = classes
            .iter()
            .zip(probabilities)
            .map(|(label, probability)| {
                if probability.is_finite() {
                    Ok(ClassProbability { label, probability })
                } else {
                    Err(InferenceError::NonFiniteProbability {
                        label: label.clone(),
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Scored {} classes for {:?}", scored.len(), features);
        Ok(scored)
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            input_shape: vec![1, FEATURE_NAMES.len()],
            features: FEATURE_NAMES.to_vec(),
            classes: self.classes().to_vec(),
            loaded_at: self.loaded_at.to_rfc3339(),
        }
    }
}
