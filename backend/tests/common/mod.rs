use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crop_recommender::{Classifier, InferenceError};

/// Softmax over logits that grow with rainfall, one step per class index.
pub struct RainfallModel {
    classes: Vec<String>,
    calls: Arc<AtomicUsize>,
}

impl RainfallModel {
    pub fn new(classes: &[&str]) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = Self {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            calls: calls.clone(),
        };
        (model, calls)
    }

    pub fn crops() -> (Self, Arc<AtomicUsize>) {
        Self::new(&["banana", "coffee", "jute", "maize", "rice"])
    }
}

impl Classifier for RainfallModel {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f32; 7]) -> Result<Vec<f32>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let rainfall = features[6];
        let logits: Vec<f32> = (0..self.classes.len())
            .map(|i| i as f32 * rainfall / 200.0)
            .collect();
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exp: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f32 = exp.iter().sum();
        Ok(exp.into_iter().map(|e| e / total).collect())
    }
}
