//! GlucoTrack Time-in-Range service
//!
//! Backend for continuous glucose monitor data: stores readings per user and
//! reports Time-in-Range statistics, trends and clinical target checks.
//!
//! ⚠️ DISCLAIMER:
//! This system is NOT a medical diagnostic tool.

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cgm_simulator;
mod config;
mod error;
mod handlers;
mod models;
mod ranges;
mod state;
mod tir;
mod trends;
mod validation;

use crate::cgm_simulator::CgmSimulator;
use crate::config::Settings;
use crate::state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env
    dotenv::dotenv().ok();

    // Logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,glucotrack=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();

    // Load configuration
    let settings = Settings::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;
    let bind_address = format!("{}:{}", settings.server.host, settings.server.port);

    info!("Starting GlucoTrack backend");
    info!(
        min_readings = settings.analytics.targets.min_readings,
        default_days = settings.analytics.default_days,
        "Time-in-range analytics configured"
    );
    info!("Binding server to {}", bind_address);

    // Shared application state
    let app_state = Arc::new(RwLock::new(AppState::new()));
    let analytics = web::Data::new(settings.analytics.clone());

    // ---------------------------------------------------------------------
    // Simulated CGM background task
    // IMPORTANT: use actix_rt::spawn (NOT tokio::spawn)
    // ---------------------------------------------------------------------
    if settings.simulator.enabled {
        let simulator_state = app_state.clone();
        let simulator = CgmSimulator::new(&settings.simulator, settings.analytics.ranges);

        actix_rt::spawn(async move {
            simulator.run(simulator_state).await;
        });
    }

    // ---------------------------------------------------------------------
    // HTTP server
    // ---------------------------------------------------------------------
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(analytics.clone())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
