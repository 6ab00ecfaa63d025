use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{FieldError, SchemaValidationError};
use crate::ranking::ClassProbability;

/// Feature names in the column order the model was trained on.
pub const FEATURE_NAMES: [&str; 7] = ["N", "P", "K", "temperature", "humidity", "ph", "rainfall"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub n: i64,
    pub p: i64,
    pub k: i64,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub rainfall: f64,
}

impl FeatureVector {
    /// Coerces an untyped request body into a feature vector.
    ///
    /// Every field is checked and all failures are reported together. Unknown
    /// keys are ignored.
    pub fn from_json(value: &Value) -> Result<Self, SchemaValidationError> {
        let Some(body) = value.as_object() else {
            return Err(SchemaValidationError::single(FieldError::body(
                "object_type",
                "input should be a JSON object",
            )));
        };

        let mut errors = Vec::new();
        let n = int_field(body, "N", &mut errors);
        let p = int_field(body, "P", &mut errors);
        let k = int_field(body, "K", &mut errors);
        let temperature = float_field(body, "temperature", &mut errors);
        let humidity = float_field(body, "humidity", &mut errors);
        let ph = float_field(body, "ph", &mut errors);
        let rainfall = float_field(body, "rainfall", &mut errors);

        match (n, p, k, temperature, humidity, ph, rainfall) {
            (Some(n), Some(p), Some(k), Some(temperature), Some(humidity), Some(ph), Some(rainfall)) => {
                Ok(Self {
                    n,
                    p,
                    k,
                    temperature,
                    humidity,
                    ph,
                    rainfall,
                })
            }
            _ => Err(SchemaValidationError { errors }),
        }
    }

    pub fn to_array(&self) -> [f32; 7] {
        [
            self.n as f32,
            self.p as f32,
            self.k as f32,
            self.temperature as f32,
            self.humidity as f32,
            self.ph as f32,
            self.rainfall as f32,
        ]
    }

    /// First feature that is NaN or infinite once narrowed to the model's `f32` row.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        FEATURE_NAMES
            .into_iter()
            .zip(self.to_array())
            .find(|(_, value)| !value.is_finite())
            .map(|(name, _)| name)
    }
}

fn int_field(body: &Map<String, Value>, name: &str, errors: &mut Vec<FieldError>) -> Option<i64> {
    let Some(value) = body.get(name) else {
        errors.push(FieldError::field(name, "missing", "field required"));
        return None;
    };

    let coerced = match value {
        Value::Number(number) => match number.as_i64() {
            Some(int) => Ok(int),
            None => match number.as_f64() {
                Some(float) if float.fract() != 0.0 => Err(FieldError::field(
                    name,
                    "int_from_float",
                    "input should be a valid integer, got a number with a fractional part",
                )),
                // i64::MAX as f64 rounds up to 2^63, which is already out of range.
                Some(float) if float >= i64::MIN as f64 && float < i64::MAX as f64 => {
                    Ok(float as i64)
                }
                _ => Err(FieldError::field(
                    name,
                    "int_range",
                    "input should be a 64-bit signed integer",
                )),
            },
        },
        Value::String(text) => text.trim().parse::<i64>().map_err(|_| {
            FieldError::field(
                name,
                "int_parsing",
                "input should be a valid integer, unable to parse string as an integer",
            )
        }),
        _ => Err(FieldError::field(name, "int_type", "input should be a valid integer")),
    };

    coerced.map_err(|e| errors.push(e)).ok()
}

fn float_field(body: &Map<String, Value>, name: &str, errors: &mut Vec<FieldError>) -> Option<f64> {
    let Some(value) = body.get(name) else {
        errors.push(FieldError::field(name, "missing", "field required"));
        return None;
    };

    let coerced = match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| FieldError::field(name, "float_type", "input should be a valid number")),
        Value::String(text) => text.trim().parse::<f64>().map_err(|_| {
            FieldError::field(
                name,
                "float_parsing",
                "input should be a valid number, unable to parse string as a number",
            )
        }),
        _ => Err(FieldError::field(name, "float_type", "input should be a valid number")),
    };

    coerced.map_err(|e| errors.push(e)).ok()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropRecommendation {
    pub crop: String,
    pub confidence: String,
}

impl From<ClassProbability<'_>> for CropRecommendation {
    fn from(class: ClassProbability<'_>) -> Self {
        CropRecommendation {
            crop: class.label.to_string(),
            confidence: crate::ranking::format_confidence(class.probability),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub top_3_recommended_crops: Vec<CropRecommendation>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub input_shape: Vec<usize>,
    pub features: Vec<&'static str>,
    pub classes: Vec<String>,
    pub loaded_at: String,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub classes: usize,
}
