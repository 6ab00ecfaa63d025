use std::path::PathBuf;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Startup failure while bringing the model up. Always fatal.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model artifact not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("model artifact {} could not be loaded: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("label file {} could not be read", path.display())]
    LabelsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("label file {} is not a JSON array of strings", path.display())]
    LabelsFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("label file {} lists no classes", path.display())]
    NoClasses { path: PathBuf },

    #[error("model emits {outputs} probabilities but {labels} labels are configured")]
    LabelMismatch { labels: usize, outputs: usize },

    #[error("warm-up inference failed: {0}")]
    WarmUp(#[source] InferenceError),
}

/// The model could not score a well-typed input.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("feature `{field}` is not a finite number")]
    NonFiniteFeature { field: &'static str },

    #[error("model evaluation failed: {0}")]
    Model(String),

    #[error("unexpected model output shape {shape:?}, expected {expected} class probabilities")]
    OutputShape { shape: Vec<usize>, expected: usize },

    #[error("model produced a non-finite probability for `{label}`")]
    NonFiniteProbability { label: String },
}

/// One rejected field of a request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl FieldError {
    pub fn field(name: &str, kind: &'static str, msg: impl Into<String>) -> Self {
        Self {
            loc: vec!["body".to_string(), name.to_string()],
            msg: msg.into(),
            kind,
        }
    }

    pub fn body(kind: &'static str, msg: impl Into<String>) -> Self {
        Self {
            loc: vec!["body".to_string()],
            msg: msg.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} validation error(s) in request body", errors.len())]
pub struct SchemaValidationError {
    pub errors: Vec<FieldError>,
}

impl SchemaValidationError {
    pub fn single(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors
            .iter()
            .filter_map(|e| e.loc.get(1).map(String::as_str))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got `{value}`")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("CORS_ALLOWED_ORIGINS lists no origins")]
    NoOrigins,
}

/// Everything a request handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] SchemaValidationError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("inference worker pool is unavailable")]
    Blocking,

    #[error("endpoint not found")]
    NotFound,

    #[error("the crop assistant is not available on this server")]
    AssistantUnavailable,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Fields(Vec<FieldError>),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: ErrorDetail,
    pub timestamp: String,
}

impl ErrorBody {
    pub fn new(detail: ErrorDetail) -> Self {
        Self {
            detail,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AssistantUnavailable => StatusCode::NOT_IMPLEMENTED,
            Self::Inference(_) | Self::Blocking => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let detail = match self {
            Self::Validation(e) => ErrorDetail::Fields(e.errors.clone()),
            other => ErrorDetail::Message(other.to_string()),
        };
        HttpResponse::build(self.status_code()).json(ErrorBody::new(detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_class() {
        let validation = ApiError::from(SchemaValidationError::single(FieldError::field(
            "rainfall",
            "missing",
            "field required",
        )));
        assert_eq!(validation.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let inference = ApiError::from(InferenceError::NonFiniteFeature { field: "ph" });
        assert_eq!(inference.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(
            ApiError::PayloadTooLarge { limit: 10 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(ApiError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::AssistantUnavailable.status_code(),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[test]
    fn field_error_serializes_with_type_key() {
        let err = FieldError::field("N", "int_parsing", "unable to parse string as an integer");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["loc"], serde_json::json!(["body", "N"]));
        assert_eq!(json["type"], "int_parsing");
    }

    #[test]
    fn fields_lists_rejected_names() {
        let err = SchemaValidationError {
            errors: vec![
                FieldError::field("N", "missing", "field required"),
                FieldError::body("object_type", "input should be an object"),
                FieldError::field("ph", "float_type", "input should be a valid number"),
            ],
        };
        assert_eq!(err.fields().collect::<Vec<_>>(), vec!["N", "ph"]);
    }
}
