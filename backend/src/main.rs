use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use log::{error, info};

use crop_recommender::{routes, ModelHost, ServerConfig};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    info!("Starting crop recommendation service");

    let config = ServerConfig::from_env().context("invalid configuration")?;

    let host = match ModelHost::load(&config.model) {
        Ok(host) => web::Data::new(host),
        Err(e) => {
            error!("{}", e);
            return Err(e).context("cannot serve without a model");
        }
    };

    let bind_address = config.bind_address();
    info!("Listening on http://{}", bind_address);
    info!("Workers: {}", config.workers);
    info!("Allowed origins: {}", config.allowed_origins.join(", "));
    info!("Endpoints:");
    info!("   POST /predict     - top 3 crop recommendations");
    info!("   GET  /health      - liveness");
    info!("   GET  /model-info  - model features and classes");
    info!("   POST /chat        - assistant (not available, 501)");

    let origins = config.allowed_origins.clone();
    let json_limit = config.json_limit;

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(routes::cors(&origins))
            .app_data(host.clone())
            .configure(|cfg| routes::configure(cfg, json_limit))
    })
    .workers(config.workers)
    .bind(&bind_address)
    .with_context(|| format!("cannot bind {bind_address}"))?
    .run()
    .await?;

    Ok(())
}
