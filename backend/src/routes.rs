use std::time::Instant;

use actix_cors::Cors;
use actix_web::error::JsonPayloadError;
use actix_web::{web, HttpRequest, HttpResponse};
use log::{error, info, warn};
use serde_json::Value;

use crate::error::{ApiError, FieldError, InferenceError, SchemaValidationError};
use crate::inference::ModelHost;
use crate::models::{CropRecommendation, FeatureVector, HealthStatus, PredictionResponse};
use crate::ranking::{self, TOP_K};

pub async fn predict(
    host: web::Data<ModelHost>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let start_time = Instant::now();

    let features = FeatureVector::from_json(&body).map_err(|e| {
        warn!("Rejected prediction request: {:?}", e.fields().collect::<Vec<_>>());
        e
    })?;

    let host = host.into_inner();
    let recommendations = web::block(move || -> Result<Vec<CropRecommendation>, InferenceError> {
        let scored = host.predict_proba(&features)?;
        Ok(ranking::top_k(scored, TOP_K)
            .into_iter()
            .map(CropRecommendation::from)
            .collect())
    })
    .await
    .map_err(|e| {
        error!("Inference worker failed: {}", e);
        ApiError::Blocking
    })?
    .map_err(|e| {
        error!("Prediction failed: {}", e);
        e
    })?;

    info!(
        "Prediction served in {}ms, top crop: {}",
        start_time.elapsed().as_millis(),
        recommendations
            .first()
            .map(|r| r.crop.as_str())
            .unwrap_or("-")
    );

    Ok(HttpResponse::Ok().json(PredictionResponse {
        top_3_recommended_crops: recommendations,
    }))
}

pub async fn health(host: web::Data<ModelHost>) -> HttpResponse {
    HttpResponse::Ok().json(HealthStatus {
        status: "ok",
        classes: host.classes().len(),
    })
}

pub async fn model_info(host: web::Data<ModelHost>) -> HttpResponse {
    HttpResponse::Ok().json(host.info())
}

/// The front end's assistant panel posts here; no language model is wired in.
pub async fn chat() -> Result<HttpResponse, ApiError> {
    Err(ApiError::AssistantUnavailable)
}

async fn not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound)
}

/// Maps body extraction failures onto the same error envelope as field validation.
fn json_error(err: JsonPayloadError, limit: usize) -> ApiError {
    match err {
        JsonPayloadError::Overflow { .. } | JsonPayloadError::OverflowKnownLength { .. } => {
            ApiError::PayloadTooLarge { limit }
        }
        JsonPayloadError::ContentType => SchemaValidationError::single(FieldError::body(
            "json_invalid",
            "request body must be sent as application/json",
        ))
        .into(),
        other => {
            SchemaValidationError::single(FieldError::body("json_invalid", other.to_string())).into()
        }
    }
}

/// Registers the prediction routes and body limits.
pub fn configure(cfg: &mut web::ServiceConfig, json_limit: usize) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(json_limit)
            .error_handler(move |err, _req: &HttpRequest| json_error(err, json_limit).into()),
    )
    .route("/predict", web::post().to(predict))
    .route("/health", web::get().to(health))
    .route("/model-info", web::get().to(model_info))
    .route("/chat", web::post().to(chat))
    .default_service(web::to(not_found));
}

/// Trusted front-end origins with any method and header, credentials included.
pub fn cors(allowed_origins: &[String]) -> Cors {
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600)
}
